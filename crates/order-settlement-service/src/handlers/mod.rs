//! 队列消息处理器
//!
//! 每个处理器订阅一个队列，收到原始负载后完成解析与结算。
//! 失败时记录带负载的错误日志并返回错误，由消费者决定重试或写入死信队列。

mod order_settlement;
mod payment_notice;

pub use order_settlement::{OrderSettlementHandler, distribution_lock_key};
pub use payment_notice::{PaymentNoticeHandler, build_payment_update};

use async_trait::async_trait;

use crate::error::Result;

/// 结算结束后写入日志的提示
pub const DISTRIBUTION_SUCCESS_MSG: &str = "分销成功";
/// 订单负载为空时的日志提示
pub const ORDER_MISSING_MSG: &str = "订单获取失败";

#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// 订阅的队列名
    fn queue(&self) -> &'static str;

    async fn handle(&self, payload: &str) -> Result<()>;
}
