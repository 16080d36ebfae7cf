// ==========================================
// 生产执行日志 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod catalog;
pub mod completion;
pub mod packaging;
pub mod types;
pub mod work_log;

// 重导出核心类型
pub use catalog::{BulkStock, OnHandStock, SkuInfo};
pub use completion::{
    format_sku_breakdown, CompletionData, CompletionPayload, NormalizedPayload, SkuCount,
    ValidatedSkuLine,
};
pub use packaging::{EventSkuLine, PackagingAllocation, PackagingEvent};
pub use types::{ActivityKind, CompletionGroup, WorkLogStatus};
pub use work_log::{
    CompletionFields, LocationRef, NewWorkLogEntry, PendingFilter, WorkLogDetails, WorkLogEntry,
};
