// ==========================================
// 生产执行日志 - 仓储层错误类型
// ==========================================
// SQLite 失败按扩展错误码归类; 业务拒绝 (已完工身份锁定、计划过期) 单列
// ==========================================

use rusqlite::ffi;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 工序日志 =====
    /// 事务内重读的行与迁移计划不一致
    #[error("版本冲突: {message}")]
    VersionConflict { message: String },

    /// 已完工记录不能改物料、批号或工序
    #[error("已完工记录身份字段锁定 (id={id})")]
    IdentityLocked { id: String },

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    // ===== 数据库 =====
    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    /// busy_timeout 到期仍未拿到写锁
    #[error("数据库繁忙: {0}")]
    DatabaseBusy(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    /// 库内存量值无法解析 (状态串、日期等)
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg) => {
                let msg = msg.unwrap_or_else(|| code.to_string());
                match code.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        RepositoryError::UniqueConstraintViolation(msg)
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => RepositoryError::ForeignKeyViolation(msg),
                    _ if matches!(code.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                        RepositoryError::DatabaseBusy(msg)
                    }
                    _ => RepositoryError::DatabaseQueryError(msg),
                }
            }
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                RepositoryError::FieldValueError {
                    field: format!("column#{}", column),
                    message: source.to_string(),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "daily_work_log".to_string(),
                id: "-".to_string(),
            },
            other => RepositoryError::DatabaseQueryError(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
