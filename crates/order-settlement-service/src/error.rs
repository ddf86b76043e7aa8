//! 订单结算服务专用错误类型
//!
//! 在共享库 MallError 基础上定义本服务特有的错误变体：
//! 负载无法解析、结算用户不存在、消息来自未注册的队列。

use mall_shared::error::MallError;

/// 结算处理错误
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// 消息体不是合法的 JSON 或字段类型不符
    #[error("消息反序列化失败: {source}")]
    Deserialize {
        #[from]
        source: serde_json::Error,
    },

    /// 满足分销条件但查不到用户，无法生成分销商档案
    #[error("用户不存在: {user_id}")]
    UserNotFound { user_id: i64 },

    /// 消费到未注册处理器的队列，说明订阅配置有误
    #[error("未注册的队列: {queue}")]
    UnknownQueue { queue: String },

    #[error(transparent)]
    Shared(#[from] MallError),
}

pub type Result<T> = std::result::Result<T, SettlementError>;

impl SettlementError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Deserialize { .. } => "DESERIALIZE_ERROR",
            Self::UserNotFound { .. } => "USER_NOT_FOUND",
            Self::UnknownQueue { .. } => "UNKNOWN_QUEUE",
            Self::Shared(e) => e.code(),
        }
    }

    /// 只有共享库中的瞬时故障值得重试，负载或数据问题重试也不会成功
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Shared(e) => e.is_retryable(),
            _ => false,
        }
    }
}
