// ==========================================
// 生产执行日志 - 应用层
// ==========================================
// 职责: 组装应用级共享状态
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
