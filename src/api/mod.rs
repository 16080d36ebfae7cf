// ==========================================
// 生产执行日志 - API 层
// ==========================================
// 职责: 录入 / 状态编辑 / 全字段编辑 三个入口的统一业务接口
// ==========================================

pub mod error;
pub mod work_log_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult, Precondition};
pub use work_log_api::WorkLogApi;
