//! 消息处理重试
//!
//! 处理器返回的可重试错误（下游超时、锁竞争、Redis 断连）在本进程内按指数退避重跑，
//! 最终结果连同实际执行次数一起返回，供死信记录使用。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::QueueConfig;

/// 退避策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 首次执行之外最多再执行的次数
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        QueueConfig::default().into()
    }
}

impl From<&QueueConfig> for RetryPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            multiplier: 2.0,
        }
    }
}

impl From<QueueConfig> for RetryPolicy {
    fn from(config: QueueConfig) -> Self {
        Self::from(&config)
    }
}

impl RetryPolicy {
    /// 第 `retry` 次重试前的等待时间（从 0 计），不超过 `max_delay`
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    /// 最多执行的总次数
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// 重试结束后的结果
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// 实际执行次数（含首次）
    pub attempts: u32,
}

/// 按策略执行异步操作
///
/// `is_retryable` 返回 false 的错误立即结束，不再等待。
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    info!(operation = operation_name, attempts, "重试后处理成功");
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts,
                };
            }
            Err(err) => err,
        };

        if !is_retryable(&err) || attempts >= max_attempts {
            warn!(
                operation = operation_name,
                attempts,
                retryable = is_retryable(&err),
                error = %err,
                "处理失败，停止重试"
            );
            return RetryOutcome {
                result: Err(err),
                attempts,
            };
        }

        let delay = policy.backoff(attempts - 1);
        warn!(
            operation = operation_name,
            attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "处理失败，退避后重试"
        );
        tokio::time::sleep(delay).await;
    }
}
