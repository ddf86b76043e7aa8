//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 未初始化 recorder 时记录函数为空操作，单元测试无需额外准备。

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// 启动 Prometheus 导出端点并注册指标描述
pub fn init(service_name: &str, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    info!("Metrics endpoint listening on {}", addr);

    register_common_metrics(service_name);
    Ok(())
}

fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("mq_messages_total", "Total number of queue messages handled");
    metrics::describe_histogram!(
        "mq_message_duration_seconds",
        "Queue message handling duration in seconds"
    );
    metrics::describe_counter!(
        "settlement_path_total",
        "Completed order settlements by commission path"
    );
    metrics::describe_counter!(
        "distribution_created_total",
        "Distributor records created by automatic qualification"
    );
    metrics::describe_counter!(
        "dead_letters_total",
        "Messages moved to a dead-letter queue"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 记录一条队列消息的处理结果
#[inline]
pub fn record_message(queue: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "mq_messages_total",
        "queue" => queue.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "mq_message_duration_seconds",
        "queue" => queue.to_string()
    )
    .record(duration_secs);
}

/// 记录结算路径（agent / distribution）
#[inline]
pub fn record_settlement_path(path: &str) {
    metrics::counter!("settlement_path_total", "path" => path.to_string()).increment(1);
}

#[inline]
pub fn record_distribution_created() {
    metrics::counter!("distribution_created_total").increment(1);
}

#[inline]
pub fn record_dead_letter(queue: &str) {
    metrics::counter!("dead_letters_total", "queue" => queue.to_string()).increment(1);
}
