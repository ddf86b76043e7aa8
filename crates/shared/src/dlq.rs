//! 死信队列
//!
//! 当消息处理失败且本地重试耗尽后，原始负载连同失败原因被写入 `{queue}:dlq`，
//! 等待人工排查或重新投递，消息不会因为下游故障被静默丢弃。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::redis_mq::{RedisMqProducer, queues};

/// 死信消息信封
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterMessage {
    pub message_id: String,
    /// 原始队列
    pub source_queue: String,
    /// 原始消息内容
    pub payload: String,
    /// 最后一次失败原因
    pub error: String,
    /// 错误码，便于按类型筛选
    pub error_code: String,
    /// 实际执行次数（首次 + 重试）
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
    pub source_service: String,
}

impl DeadLetterMessage {
    pub fn new(
        source_queue: impl Into<String>,
        payload: impl Into<String>,
        error: impl Into<String>,
        error_code: impl Into<String>,
        attempts: u32,
        source_service: impl Into<String>,
    ) -> Self {
        Self {
            message_id: Uuid::now_v7().to_string(),
            source_queue: source_queue.into(),
            payload: payload.into(),
            error: error.into(),
            error_code: error_code.into(),
            attempts,
            failed_at: Utc::now(),
            source_service: source_service.into(),
        }
    }

    /// 写入的死信队列名
    pub fn target_queue(&self) -> String {
        queues::dead_letter(&self.source_queue)
    }
}

/// 死信投递目标
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, message: &DeadLetterMessage) -> Result<()>;
}

/// 基于 Redis List 的死信投递
pub struct RedisDeadLetterSink {
    producer: RedisMqProducer,
}

impl RedisDeadLetterSink {
    pub fn new(producer: RedisMqProducer) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl DeadLetterSink for RedisDeadLetterSink {
    async fn send(&self, message: &DeadLetterMessage) -> Result<()> {
        let target = message.target_queue();
        self.producer.publish_json(&target, message).await?;

        warn!(
            message_id = %message.message_id,
            source_queue = %message.source_queue,
            dead_letter_queue = %target,
            attempts = message.attempts,
            error = %message.error,
            "消息已写入死信队列"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_letter_message_creation() {
        let msg = DeadLetterMessage::new(
            queues::ORDER_AGENT_OR_DISTRIBUTION,
            r#"{"userId":42}"#,
            "外部服务错误: distribution - 超时",
            "EXTERNAL_SERVICE_ERROR",
            4,
            "order-settlement-service",
        );

        assert_eq!(msg.source_queue, "OrderAgentOrDistributionSubscribe");
        assert_eq!(msg.target_queue(), "OrderAgentOrDistributionSubscribe:dlq");
        assert_eq!(msg.attempts, 4);
        assert!(Uuid::parse_str(&msg.message_id).is_ok());
    }

    #[test]
    fn test_dead_letter_serialization() {
        let msg = DeadLetterMessage::new(
            queues::WECHAT_PAY_NOTICE,
            r#"{"total_fee":100}"#,
            "Redis 错误",
            "REDIS_ERROR",
            1,
            "order-settlement-service",
        );

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("messageId"));
        assert!(json.contains("sourceQueue"));
        assert!(json.contains("errorCode"));
        assert!(json.contains("failedAt"));

        let back: DeadLetterMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.payload, r#"{"total_fee":100}"#);
        assert_eq!(back.error_code, "REDIS_ERROR");
    }
}
