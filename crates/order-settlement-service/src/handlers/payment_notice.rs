//! 微信支付通知处理器
//!
//! 网关通信成功时按业务结果更新支付单：支付成功标记为已支付，
//! 否则标记为其他状态并记录错误描述。网关通信失败的通知只记日志。

use std::sync::Arc;

use async_trait::async_trait;
use mall_shared::observability::MQ_LOG_TARGET;
use mall_shared::redis_mq::queues;
use tracing::{error, info, instrument};

use super::MessageHandler;
use crate::error::Result;
use crate::models::{BillPaymentStatus, BillPaymentUpdate, PaymentNotification, PaymentType};
use crate::services::BillPaymentService;

pub struct PaymentNoticeHandler {
    bill_payments: Arc<dyn BillPaymentService>,
}

impl PaymentNoticeHandler {
    pub fn new(bill_payments: Arc<dyn BillPaymentService>) -> Self {
        Self { bill_payments }
    }

    async fn process(&self, payload: &str) -> Result<()> {
        let notify: Option<PaymentNotification> = serde_json::from_str(payload)?;
        let Some(notify) = notify else {
            info!(target: MQ_LOG_TARGET, payload, "支付通知为空，不更新支付单");
            return Ok(());
        };

        let Some(update) = build_payment_update(&notify) else {
            info!(
                target: MQ_LOG_TARGET,
                out_trade_no = %notify.out_trade_no,
                return_code = %notify.return_code,
                return_msg = notify.return_msg.as_deref().unwrap_or_default(),
                "支付网关通信失败，不更新支付单"
            );
            return Ok(());
        };

        self.bill_payments.update_by_trade_no(&update).await?;

        info!(
            target: MQ_LOG_TARGET,
            payment_id = %update.payment_id,
            status = ?update.status,
            money = %update.money,
            payload,
            "微信支付成功后推送到接口进行数据处理"
        );
        Ok(())
    }
}

/// 根据通知内容生成支付单更新指令，网关通信失败时返回 `None`
pub fn build_payment_update(notify: &PaymentNotification) -> Option<BillPaymentUpdate> {
    if !notify.is_return_success() {
        return None;
    }

    let (status, payed_msg) = if notify.is_result_success() {
        (BillPaymentStatus::Payed, notify.result_code.clone())
    } else {
        (BillPaymentStatus::Other, notify.error_message())
    };

    Some(BillPaymentUpdate {
        payment_id: notify.out_trade_no.clone(),
        status,
        payment_code: PaymentType::Wechatpay,
        money: notify.money(),
        payed_msg,
        trade_no: notify.transaction_id.clone().unwrap_or_default(),
    })
}

#[async_trait]
impl MessageHandler for PaymentNoticeHandler {
    fn queue(&self) -> &'static str {
        queues::WECHAT_PAY_NOTICE
    }

    #[instrument(skip_all, fields(queue = queues::WECHAT_PAY_NOTICE))]
    async fn handle(&self, payload: &str) -> Result<()> {
        self.process(payload).await.inspect_err(|e| {
            error!(
                target: MQ_LOG_TARGET,
                payload,
                error = %e,
                "微信支付通知处理失败"
            );
        })
    }
}
