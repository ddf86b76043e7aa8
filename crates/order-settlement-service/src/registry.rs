//! 队列订阅表
//!
//! 启动时显式登记"队列名 -> 处理器"，消费者只订阅表中的队列。

use std::collections::HashMap;
use std::sync::Arc;

use mall_shared::lock::LockManager;

use crate::error::{Result, SettlementError};
use crate::handlers::{MessageHandler, OrderSettlementHandler, PaymentNoticeHandler};
use crate::services::SettlementServices;

#[derive(Default, Clone)]
pub struct SubscriberRegistry {
    handlers: HashMap<&'static str, Arc<dyn MessageHandler>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记处理器，同名队列后登记的覆盖先登记的
    pub fn register(&mut self, handler: Arc<dyn MessageHandler>) -> &mut Self {
        self.handlers.insert(handler.queue(), handler);
        self
    }

    pub fn get(&self, queue: &str) -> Option<&Arc<dyn MessageHandler>> {
        self.handlers.get(queue)
    }

    /// 已登记的队列名，按名称排序
    pub fn queues(&self) -> Vec<&'static str> {
        let mut queues: Vec<_> = self.handlers.keys().copied().collect();
        queues.sort_unstable();
        queues
    }

    pub async fn dispatch(&self, queue: &str, payload: &str) -> Result<()> {
        let handler = self.get(queue).ok_or_else(|| SettlementError::UnknownQueue {
            queue: queue.to_string(),
        })?;
        handler.handle(payload).await
    }
}

/// 构建结算服务的订阅表
pub fn build_registry(services: SettlementServices, lock: Arc<LockManager>) -> SubscriberRegistry {
    let mut registry = SubscriberRegistry::new();
    registry
        .register(Arc::new(PaymentNoticeHandler::new(
            services.bill_payments.clone(),
        )))
        .register(Arc::new(OrderSettlementHandler::new(services, lock)));
    registry
}
