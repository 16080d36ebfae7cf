// ==========================================
// 生产执行日志 - 工序日志数据仓储
// ==========================================
// 对齐: scripts/schema.sql daily_work_log 表
// 红线: Repository 不做业务逻辑,只做数据映射
// ==========================================

mod core;
mod queries;


pub use self::core::WorkLogRepository;
