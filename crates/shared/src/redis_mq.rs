//! Redis 消息队列基础设施封装
//!
//! 以 Redis List 作为消息队列：生产者 LPUSH，消费者 RPOP，先进先出。
//! 每条消息只会被一个消费任务弹出，多个任务可并行消费同一组队列。
//! 封装统一的消息表示、JSON 序列化和基于 `watch` 的优雅关闭语义。

use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::Client;
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{MallError, Result};

// ---------------------------------------------------------------------------
// 队列名常量
// ---------------------------------------------------------------------------

/// 集中管理所有队列名称，与上游发布方保持一致
pub mod queues {
    /// 微信支付异步通知
    pub const WECHAT_PAY_NOTICE: &str = "WeChatPayNoticeQueue";
    /// 订单完结后走代理或分销结佣
    pub const ORDER_AGENT_OR_DISTRIBUTION: &str = "OrderAgentOrDistributionSubscribe";

    /// 死信队列名：原队列名加 `:dlq` 后缀
    pub fn dead_letter(queue: &str) -> String {
        format!("{queue}:dlq")
    }
}

// ---------------------------------------------------------------------------
// QueueMessage
// ---------------------------------------------------------------------------

/// 从队列弹出的消息
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub queue: String,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl QueueMessage {
    pub fn new(queue: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// RedisMqProducer
// ---------------------------------------------------------------------------

/// 消息发布者
///
/// `Client` 内部只保存连接参数，Clone 代价很低。
#[derive(Clone)]
pub struct RedisMqProducer {
    client: Client,
}

impl RedisMqProducer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(MallError::from)
    }

    /// 发布原始文本消息，返回发布后的队列长度
    pub async fn publish(&self, queue: &str, payload: &str) -> Result<i64> {
        let mut conn = self.get_conn().await?;
        let len: i64 = redis::cmd("LPUSH")
            .arg(queue)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        debug!(queue, queue_len = len, "消息已发布");
        Ok(len)
    }

    /// 将值序列化为 JSON 后发布
    pub async fn publish_json<T: Serialize>(&self, queue: &str, value: &T) -> Result<i64> {
        let payload = serde_json::to_string(value)?;
        self.publish(queue, &payload).await
    }
}

// ---------------------------------------------------------------------------
// RedisMqConsumer
// ---------------------------------------------------------------------------

/// 消息消费者
///
/// 按轮转顺序对订阅的队列执行 RPOP，全部为空时休眠 `poll_interval`。
/// 弹出操作不放进 `select!`，避免关闭信号取消一个已经取走消息的请求。
pub struct RedisMqConsumer {
    client: Client,
    queues: Vec<String>,
    poll_interval: Duration,
    next_index: usize,
}

impl RedisMqConsumer {
    pub fn new(client: Client, queues: &[&str], poll_interval: Duration) -> Result<Self> {
        if queues.is_empty() {
            return Err(MallError::Validation("消费者至少需要订阅一个队列".to_string()));
        }

        Ok(Self {
            client,
            queues: queues.iter().map(|q| q.to_string()).collect(),
            poll_interval,
            next_index: 0,
        })
    }

    pub fn queues(&self) -> &[String] {
        &self.queues
    }

    /// 依次尝试每个队列，返回第一条可用消息
    async fn pop_next(&mut self, conn: &mut MultiplexedConnection) -> Result<Option<QueueMessage>> {
        let total = self.queues.len();
        for step in 0..total {
            let idx = (self.next_index + step) % total;
            let queue = &self.queues[idx];

            let popped: Option<String> = redis::cmd("RPOP").arg(queue).query_async(conn).await?;
            if let Some(payload) = popped {
                // 下一轮从后一个队列开始，防止某个繁忙队列饿死其他队列
                self.next_index = (idx + 1) % total;
                return Ok(Some(QueueMessage::new(queue.clone(), payload)));
            }
        }
        Ok(None)
    }

    /// 启动消费循环
    ///
    /// handler 返回错误只记录日志而不中断循环，避免单条坏消息导致整个消费者停止。
    /// 关闭信号变为 `true` 或发送端被丢弃时退出，正在执行的 handler 会自然完成。
    pub async fn start<F, Fut>(mut self, mut shutdown: watch::Receiver<bool>, handler: F)
    where
        F: Fn(QueueMessage) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        info!(queues = ?self.queues, "Redis 消息队列消费循环已启动");

        let mut conn: Option<MultiplexedConnection> = None;

        loop {
            if *shutdown.borrow() {
                info!("收到关闭信号，消费循环退出");
                break;
            }

            if conn.is_none() {
                match self.client.get_multiplexed_async_connection().await {
                    Ok(c) => conn = Some(c),
                    Err(e) => {
                        error!(error = %e, "连接 Redis 失败，稍后重试");
                        if !wait_or_shutdown(&mut shutdown, self.poll_interval).await {
                            break;
                        }
                        continue;
                    }
                }
            }
            let Some(active) = conn.as_mut() else {
                continue;
            };

            match self.pop_next(active).await {
                Ok(Some(msg)) => {
                    debug!(queue = %msg.queue, "收到队列消息");
                    if let Err(e) = handler(msg).await {
                        error!(error = %e, "处理队列消息失败");
                    }
                }
                Ok(None) => {
                    if !wait_or_shutdown(&mut shutdown, self.poll_interval).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "读取队列失败，重建连接");
                    conn = None;
                    if !wait_or_shutdown(&mut shutdown, self.poll_interval).await {
                        break;
                    }
                }
            }
        }

        info!("Redis 消息队列消费循环已停止");
    }
}

/// 休眠指定时间，期间收到关闭信号则提前返回 `false`
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    tokio::select! {
        biased;

        changed = shutdown.changed() => {
            // 发送端已丢弃同样视为关闭
            changed.is_ok() && !*shutdown.borrow()
        }
        _ = tokio::time::sleep(interval) => true,
    }
}
