// ==========================================
// 生产执行日志 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod activity_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use activity_config_trait::{ActivityConfigReader, ConfigResult};
pub use config_manager::{config_defaults, config_keys, ConfigManager};
