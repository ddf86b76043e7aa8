//! 统一可观测性模块
//!
//! 提供日志与 Prometheus 指标的统一初始化，所有日志字段与指标命名在此集中约定。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

use crate::config::ObservabilityConfig;

/// 消息队列处理日志统一使用的 target，便于按类别过滤与归档
pub const MQ_LOG_TARGET: &str = "redis_message_queue";

/// 统一初始化可观测性
///
/// 先初始化日志，再按配置启动指标导出端点。
///
/// ```ignore
/// let config = AppConfig::load("order-settlement-service")?;
/// observability::init(&config.service_name, &config.observability)?;
/// ```
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<()> {
    tracing::init(config)?;

    if config.metrics_enabled {
        metrics::init(service_name, config.metrics_port)?;
    }

    info!(
        service = %service_name,
        log_format = %config.log_format,
        metrics_enabled = config.metrics_enabled,
        metrics_port = config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}
