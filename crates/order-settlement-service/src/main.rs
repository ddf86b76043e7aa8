//! 订单结算服务入口
//!
//! 独立运行模式下协作服务由内存实现提供。

use std::sync::Arc;

use anyhow::{Context, Result};
use mall_shared::{
    config::AppConfig,
    dlq::RedisDeadLetterSink,
    lock::{LockConfig, LockManager},
    observability,
    redis_mq::RedisMqProducer,
};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use order_settlement::{
    SERVICE_NAME, SettlementConsumer, SettlementServices, build_registry, memory::InMemoryMall,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置，失败时使用默认值
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        AppConfig {
            service_name: SERVICE_NAME.to_string(),
            ..AppConfig::default()
        }
    });

    // 2. 初始化日志与指标
    observability::init(&config.service_name, &config.observability)?;
    info!(environment = %config.environment, "Starting {}...", config.service_name);

    if !config.redis_enabled() {
        anyhow::bail!("redis.url is empty, queue consumer cannot start");
    }

    // 3. Redis 客户端：消息队列、分布式锁与死信队列共用
    let client = redis::Client::open(config.redis.url.as_str())
        .with_context(|| format!("invalid redis url: {}", config.redis.url))?;
    let lock = Arc::new(LockManager::new(
        Some(client.clone()),
        LockConfig::from(&config.lock),
    ));

    // 4. 协作服务与订阅表
    let mall = Arc::new(InMemoryMall::with_defaults());
    warn!("Running with in-memory collaborators, settlement results are not persisted");
    let services = SettlementServices::from_backend(mall);
    let registry = Arc::new(build_registry(services, lock));
    info!(queues = ?registry.queues(), "Subscriber registry built");

    // 5. 启动消费者
    let dead_letters = Arc::new(RedisDeadLetterSink::new(RedisMqProducer::new(client.clone())));
    let consumer = SettlementConsumer::new(&config, client, registry, dead_letters);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_task = tokio::spawn(consumer.run(shutdown_rx));

    // 6. 等待退出信号，通知消费任务在处理完当前消息后退出
    signal::ctrl_c().await?;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    consumer_task.await??;
    info!("{} stopped", config.service_name);
    Ok(())
}
