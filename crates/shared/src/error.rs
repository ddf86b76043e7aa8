//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum MallError {
    // ==================== 存储错误 ====================
    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== Redis / 序列化错误 ====================
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    // ==================== 并发控制错误 ====================
    #[error("资源被占用: {resource}")]
    LockConflict { resource: String },

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 外部服务错误 ====================
    #[error("外部服务错误: {service} - {message}")]
    ExternalService { service: String, message: String },
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, MallError>;

impl MallError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::LockConflict { .. } => "LOCK_CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 网络、锁竞争、下游服务故障属于瞬时故障；数据本身有问题的错误重试无意义。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Redis(_) | Self::LockConflict { .. } | Self::ExternalService { .. }
        )
    }

    /// 便捷构造外部服务错误
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = MallError::NotFound {
            entity: "User".to_string(),
            id: "42".to_string(),
        };
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.to_string(), "记录未找到: User id=42");
    }

    #[test]
    fn test_is_retryable() {
        let conflict = MallError::LockConflict {
            resource: "settlement:distribution:42".to_string(),
        };
        assert!(conflict.is_retryable());

        let external = MallError::external("bill-payments", "连接被拒绝");
        assert!(external.is_retryable());
        assert_eq!(external.to_string(), "外部服务错误: bill-payments - 连接被拒绝");

        let not_found = MallError::NotFound {
            entity: "User".to_string(),
            id: "42".to_string(),
        };
        assert!(!not_found.is_retryable());

        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!MallError::Serialization(bad_json).is_retryable());
    }
}
