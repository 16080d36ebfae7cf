// ==========================================
// 生产执行日志 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/Engine错误为用户可理解的错误消息
// ==========================================

use crate::engine::payload_validator::{ConfirmationRequired, ValidationError};
use crate::engine::state_machine::TransitionError;
use crate::i18n::{t, t_with_args};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 前置条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// 同批次成品质检未完工
    QaNotDone { item: String, batch_number: String },
}

impl Precondition {
    /// 本地化提示
    pub fn message(&self) -> String {
        match self {
            Precondition::QaNotDone { item, batch_number } => t_with_args(
                "worklog.qa_not_done",
                &[("item", item.as_str()), ("batch", batch_number.as_str())],
            ),
        }
    }
}

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("完工数据校验失败: {0}")]
    Validation(ValidationError),

    /// 需要操作员确认后重试
    #[error("需要确认: {prompt}")]
    NeedsConfirmation {
        confirmation: ConfirmationRequired,
        prompt: String,
    },

    #[error("前置条件不满足: {message}")]
    PreconditionFailed {
        precondition: Precondition,
        message: String,
    },

    #[error("重复记录: {0}")]
    DuplicateEntry(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("版本冲突: {0}")]
    VersionConflict(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    /// 写锁等待超时或连接锁被毒化,可稍后重试
    #[error("数据库繁忙: {0}")]
    DatabaseBusy(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn qa_not_done(item: &str, batch_number: &str) -> Self {
        let precondition = Precondition::QaNotDone {
            item: item.to_string(),
            batch_number: batch_number.to_string(),
        };
        ApiError::PreconditionFailed {
            message: precondition.message(),
            precondition,
        }
    }

    pub fn needs_confirmation(confirmation: ConfirmationRequired) -> Self {
        let prompt = match confirmation {
            ConfirmationRequired::ProceedWithoutQty => t("worklog.confirm_without_qty"),
        };
        ApiError::NeedsConfirmation {
            confirmation,
            prompt,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::VersionConflict { message } => ApiError::VersionConflict(message),

            RepositoryError::IdentityLocked { .. } => {
                ApiError::BusinessRuleViolation(t("worklog.done_identity_locked"))
            }

            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseBusy(msg) => ApiError::DatabaseBusy(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseBusy(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::DuplicateEntry(msg),
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("字段{}无法解析: {}", field, message))
            }

            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 TransitionError 转换
// ==========================================
impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Validation(e) => ApiError::Validation(e),
            TransitionError::NeedsConfirmation(c) => ApiError::needs_confirmation(c),
            TransitionError::Storage(e) => ApiError::from(e),
            TransitionError::Config(msg) => ApiError::ConfigError(msg),
            TransitionError::Lookup(msg) => ApiError::DatabaseError(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
