//! Redis 队列消费者与消息分发
//!
//! 启动多个消费任务共同消费订阅表中的队列，每条消息只会被一个任务弹出。
//! 单条消息的处理流程：按队列名分发到处理器 -> 可重试错误按退避策略重试
//! -> 最终失败写入 `{queue}:dlq` 死信队列。

use std::sync::Arc;
use std::time::Instant;

use mall_shared::config::{AppConfig, QueueConfig};
use mall_shared::dlq::{DeadLetterMessage, DeadLetterSink};
use mall_shared::observability::metrics;
use mall_shared::redis_mq::{QueueMessage, RedisMqConsumer};
use mall_shared::retry::{RetryPolicy, retry_with_policy};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::{Result, SettlementError};
use crate::registry::SubscriberRegistry;

/// 单条消息的处理管道，在各消费任务间共享
#[derive(Clone)]
pub struct MessagePipeline {
    registry: Arc<SubscriberRegistry>,
    dead_letters: Arc<dyn DeadLetterSink>,
    retry_policy: RetryPolicy,
    service_name: String,
}

impl MessagePipeline {
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        dead_letters: Arc<dyn DeadLetterSink>,
        retry_policy: RetryPolicy,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            dead_letters,
            retry_policy,
            service_name: service_name.into(),
        }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }
}

/// 结算消费者
pub struct SettlementConsumer {
    client: redis::Client,
    pipeline: MessagePipeline,
    queue_config: QueueConfig,
}

impl SettlementConsumer {
    pub fn new(
        config: &AppConfig,
        client: redis::Client,
        registry: Arc<SubscriberRegistry>,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        let pipeline = MessagePipeline::new(
            registry,
            dead_letters,
            RetryPolicy::from(&config.queue),
            config.service_name.clone(),
        );
        Self {
            client,
            pipeline,
            queue_config: config.queue.clone(),
        }
    }

    /// 启动消费任务，直到收到 shutdown 信号且所有任务退出
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let queues = self.pipeline.registry.queues();
        let workers = self.queue_config.workers.max(1);

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let consumer = RedisMqConsumer::new(
                self.client.clone(),
                &queues,
                self.queue_config.poll_interval(),
            )?;
            let pipeline = self.pipeline.clone();
            let shutdown = shutdown.clone();

            handles.push(tokio::spawn(async move {
                consumer
                    .start(shutdown, move |msg| {
                        let pipeline = pipeline.clone();
                        async move {
                            if let Err(e) = handle_message(&pipeline, &msg).await {
                                error!(
                                    worker_id,
                                    queue = %msg.queue,
                                    error = %e,
                                    "队列消息处理失败"
                                );
                            }
                            Ok(())
                        }
                    })
                    .await;
                debug!(worker_id, "消费任务已退出");
            }));
        }

        info!(?queues, workers, "结算消费者已启动");

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "消费任务异常退出");
            }
        }

        info!("结算消费者已停止");
        Ok(())
    }
}

/// 处理单条队列消息的完整流程
///
/// 独立函数便于在测试中直接调用而无需连接 Redis。
/// 处理失败的消息写入死信队列后仍返回原始错误。
pub async fn handle_message(pipeline: &MessagePipeline, msg: &QueueMessage) -> Result<()> {
    let start = Instant::now();
    let registry = pipeline.registry.as_ref();
    let queue = msg.queue.as_str();
    let payload = msg.payload.as_str();

    let outcome = retry_with_policy(
        &pipeline.retry_policy,
        queue,
        SettlementError::is_retryable,
        || registry.dispatch(queue, payload),
    )
    .await;
    let elapsed = start.elapsed().as_secs_f64();

    let err = match outcome.result {
        Ok(()) => {
            metrics::record_message(queue, "ok", elapsed);
            return Ok(());
        }
        Err(e) => e,
    };

    metrics::record_message(queue, "failed", elapsed);

    let dead_letter = DeadLetterMessage::new(
        queue,
        payload,
        err.to_string(),
        err.code(),
        outcome.attempts,
        pipeline.service_name.as_str(),
    );
    match pipeline.dead_letters.send(&dead_letter).await {
        Ok(()) => metrics::record_dead_letter(queue),
        Err(e) => error!(
            queue,
            payload,
            error = %e,
            "写入死信队列失败，消息可能丢失"
        ),
    }

    Err(err)
}
