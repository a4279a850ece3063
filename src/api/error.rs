// ==========================================
// 临床轮转排班系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换 Repository/引擎错误为用户可读的错误消息
// 红线: 所有错误信息必须包含显式原因 (可解释性)
// ==========================================

use crate::engine::RegenError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 校验错误 (ValidationError): 求解开始前拒绝
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 冲突错误 (ConflictError): 操作中止,无部分状态变更
    // ==========================================
    /// 同周期已有在途重排运行
    #[error("并发运行冲突: {0}")]
    ConcurrentRun(String),

    /// 与锁定排班冲突等业务冲突
    #[error("操作冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 取消
    // ==========================================
    #[error("运行已取消: {0}")]
    Cancelled(String),

    // ==========================================
    // 资源错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 致命错误 (FatalError): 运行标记 Failed,排班保持原状
    // ==========================================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// API Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// Repository错误转换为API错误
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("{}: {}", field, message))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::Conflict(msg),
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::Conflict(msg),
            RepositoryError::RunConflict { message } => ApiError::ConcurrentRun(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// 引擎错误转换为API错误
impl From<RegenError> for ApiError {
    fn from(err: RegenError) -> Self {
        match err {
            RegenError::Validation(msg) => ApiError::InvalidInput(msg),
            RegenError::Conflict(msg) => ApiError::ConcurrentRun(msg),
            RegenError::Cancelled(msg) => ApiError::Cancelled(msg),
            RegenError::Config(msg) => ApiError::Internal(msg),
            RegenError::Repository(repo_err) => repo_err.into(),
        }
    }
}
