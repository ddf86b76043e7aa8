//! 订单完结结佣处理器
//!
//! 订单先尝试归属代理结佣；代理未接手时走分销：记录分享关联订单日志，
//! 未成为分销商的用户在"无需审核但需满足条件"模式下自动开通，
//! 已是分销商的用户检查是否可以升级。
//!
//! 整个结算过程在按用户加锁后执行：同一用户的两笔订单并发结算时只会创建一条分销商记录，
//! 锁获取失败时尚未产生任何写入，消息重试不会重复登记订单。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mall_shared::lock::LockManager;
use mall_shared::observability::{MQ_LOG_TARGET, metrics};
use mall_shared::redis_mq::queues;
use tracing::{debug, error, info, instrument, warn};

use super::{DISTRIBUTION_SUCCESS_MSG, MessageHandler, ORDER_MISSING_MSG};
use crate::error::{Result, SettlementError};
use crate::models::setting::keys;
use crate::models::{
    CallbackResult, Distribution, DistributionType, DistributionVerifyStatus, Order,
};
use crate::services::SettlementServices;

/// 用户结算锁的键
pub fn distribution_lock_key(user_id: i64) -> String {
    format!("settlement:distribution:{user_id}")
}

pub struct OrderSettlementHandler {
    services: SettlementServices,
    lock: Arc<LockManager>,
}

impl OrderSettlementHandler {
    pub fn new(services: SettlementServices, lock: Arc<LockManager>) -> Self {
        Self { services, lock }
    }

    async fn process(&self, payload: &str) -> Result<()> {
        let Some(order) = parse_order(payload)? else {
            info!(target: MQ_LOG_TARGET, "{}", ORDER_MISSING_MSG);
            return Ok(());
        };

        let guard = self
            .lock
            .acquire(&distribution_lock_key(order.user_id), None)
            .await?;
        let outcome = self.settle(&order).await;
        if let Err(e) = guard.release().await {
            warn!(user_id = order.user_id, error = %e, "释放用户结算锁失败");
        }
        outcome
    }

    async fn settle(&self, order: &Order) -> Result<()> {
        let mut result = self.services.agent_orders.add_data(order).await?;
        if result.status {
            metrics::record_settlement_path("agent");
            let result = serde_json::to_string(&result)?;
            info!(
                target: MQ_LOG_TARGET,
                order_id = %order.order_id,
                user_id = order.user_id,
                %result,
                "订单完结后走代理结佣"
            );
            return Ok(());
        }

        self.services.distribution_orders.add_data(order).await?;
        self.qualify_or_upgrade(order.user_id).await?;

        result.status = true;
        result.msg = DISTRIBUTION_SUCCESS_MSG.to_string();
        metrics::record_settlement_path("distribution");
        let result = serde_json::to_string(&result)?;
        info!(
            target: MQ_LOG_TARGET,
            order_id = %order.order_id,
            user_id = order.user_id,
            %result,
            "订单完结后走分销结佣"
        );
        Ok(())
    }

    async fn qualify_or_upgrade(&self, user_id: i64) -> Result<()> {
        let distributions = &self.services.distributions;

        let exists = distributions.exists_by_user(user_id).await?;
        let config = self.services.settings.get_config_dictionaries().await?;
        let distribution_type =
            DistributionType::from_setting(config.get_int(keys::DISTRIBUTION_TYPE, 0));

        if distribution_type == DistributionType::ConditionalAuto && !exists {
            let draft = distributions
                .check_condition(&config, Distribution::default(), user_id)
                .await?;

            if draft.is_qualified() {
                let created = self.create_distribution(user_id).await?;
                debug!(user_id, result = ?created, "分销商自动开通");
            } else {
                debug!(
                    user_id,
                    progress = draft.condition_progress,
                    condition = %draft.condition_msg,
                    "未满足分销条件"
                );
            }
        }

        if exists {
            distributions.check_update(user_id).await?;
        }
        Ok(())
    }

    async fn create_distribution(&self, user_id: i64) -> Result<CallbackResult> {
        let user = self
            .services
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(SettlementError::UserNotFound { user_id })?;

        let record = Distribution {
            user_id,
            mobile: user.mobile.clone(),
            name: user.display_name().to_string(),
            verify_status: DistributionVerifyStatus::VerifyYes,
            verify_time: Some(Utc::now()),
            ..Default::default()
        };

        let result = self.services.distributions.add_data(record, user_id).await?;
        if result.status {
            metrics::record_distribution_created();
        } else {
            warn!(user_id, msg = %result.msg, "分销商开通未成功");
        }
        Ok(result)
    }
}

/// 空白负载与 `null` 视为没有订单
fn parse_order(payload: &str) -> Result<Option<Order>> {
    if payload.trim().is_empty() {
        return Ok(None);
    }
    Ok(serde_json::from_str(payload)?)
}

#[async_trait]
impl MessageHandler for OrderSettlementHandler {
    fn queue(&self) -> &'static str {
        queues::ORDER_AGENT_OR_DISTRIBUTION
    }

    #[instrument(skip_all, fields(queue = queues::ORDER_AGENT_OR_DISTRIBUTION))]
    async fn handle(&self, payload: &str) -> Result<()> {
        self.process(payload).await.inspect_err(|e| {
            error!(
                target: MQ_LOG_TARGET,
                payload,
                error = %e,
                "订单完结结佣失败"
            );
        })
    }
}
