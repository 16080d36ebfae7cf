// ==========================================
// 生产执行日志 - 引擎层
// ==========================================
// 职责: 工序分类、完工校验、状态迁移、质检前置检查
// 红线: Engine 不拼 SQL, 数据访问全部经由 repository
// ==========================================

pub mod activity_classifier;
pub mod catalog_reader;
pub mod due_date;
pub mod ordering;
pub mod payload_validator;
pub mod qa_gate;
pub mod state_machine;

// 重导出核心引擎
pub use activity_classifier::{normalize_activity_name, ActivityClassifier};
pub use catalog_reader::{BatchStockReader, BulkStockReader, CatalogResult, SkuCatalogReader};
pub use due_date::{add_working_days, derive_due_date};
pub use ordering::{natural_cmp, sort_pending};
pub use payload_validator::{
    CompletionPayloadValidator, ConfirmationRequired, PayloadRejection, ValidationContext,
    ValidationError,
};
pub use qa_gate::QaPrecedenceGate;
pub use state_machine::{
    PlanSubject, PlannedCompletion, TransitionError, TransitionPlan, TransitionResult,
    WorkLogStateMachine,
};
