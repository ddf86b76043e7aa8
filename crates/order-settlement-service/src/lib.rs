//! 订单结算服务
//!
//! 订阅 Redis 队列中的微信支付通知与订单完结消息：
//! 支付通知更新支付单状态，订单完结消息按代理或分销路径结佣，
//! 分销路径下自动开通满足条件的分销商并检查已有分销商的等级提升。

pub mod consumer;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod registry;
pub mod services;

pub use consumer::{MessagePipeline, SettlementConsumer, handle_message};
pub use error::SettlementError;
pub use registry::{SubscriberRegistry, build_registry};
pub use services::SettlementServices;

/// 服务名，用于加载 `config/{SERVICE_NAME}.toml` 与标记死信来源
pub const SERVICE_NAME: &str = "order-settlement-service";
