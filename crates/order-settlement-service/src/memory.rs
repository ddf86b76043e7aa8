//! 内存协作服务实现
//!
//! 以 DashMap 保存支付单、用户、代理关系、分销订单、分销商、等级与系统设置，
//! 实现全部协作服务接口。用于独立运行与集成测试，不做持久化。

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mall_shared::error::{MallError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};

use crate::models::distribution::CONDITION_PROGRESS_COMPLETE;
use crate::models::setting::keys;
use crate::models::{
    BillPayment, BillPaymentUpdate, CallbackResult, ConfigDictionary, Distribution,
    DistributionGrade, DistributionOrder, DistributionVerifyStatus, Order, User,
};
use crate::services::{
    AgentOrderService, BillPaymentService, DistributionOrderService, DistributionService,
    SettingService, UserService,
};

/// 成为分销商的条件类型，对应系统设置 `DistributionCondition`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionCondition {
    /// 无门槛
    Unconditional,
    /// 购买过任意商品
    AnyPurchase,
    /// 累计消费达到 `DistributionMoney`
    SpendAmount,
}

impl DistributionCondition {
    pub fn from_setting(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Unconditional),
            2 => Some(Self::AnyPurchase),
            3 => Some(Self::SpendAmount),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct InMemoryMall {
    bill_payments: DashMap<String, BillPayment>,
    users: DashMap<i64, User>,
    /// 用户 -> 绑定的代理
    agents: DashMap<i64, i64>,
    /// 订单 -> 结佣代理
    agent_orders: DashMap<String, i64>,
    distribution_orders: DashMap<i64, Vec<DistributionOrder>>,
    distributions: DashMap<i64, Distribution>,
    settings: DashMap<String, String>,
    /// 按升级金额升序
    grades: Vec<DistributionGrade>,
    next_distribution_id: AtomicI64,
}

impl InMemoryMall {
    pub fn new(grades: Vec<DistributionGrade>) -> Self {
        let mut grades = grades;
        grades.sort_by(|a, b| a.upgrade_amount.cmp(&b.upgrade_amount));
        Self {
            grades,
            next_distribution_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    /// 独立运行时的默认数据：满足条件自动开通、无门槛、三级等级
    pub fn with_defaults() -> Self {
        let mall = Self::new(vec![
            DistributionGrade {
                id: 1,
                name: "普通分销商".to_string(),
                upgrade_amount: Decimal::ZERO,
            },
            DistributionGrade {
                id: 2,
                name: "银牌分销商".to_string(),
                upgrade_amount: Decimal::from(1000),
            },
            DistributionGrade {
                id: 3,
                name: "金牌分销商".to_string(),
                upgrade_amount: Decimal::from(5000),
            },
        ]);
        mall.set_setting(keys::DISTRIBUTION_TYPE, "3");
        mall.set_setting(keys::DISTRIBUTION_CONDITION, "1");
        mall
    }

    pub fn set_setting(&self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn bind_agent(&self, user_id: i64, agent_id: i64) {
        self.agents.insert(user_id, agent_id);
    }

    pub fn insert_bill_payment(&self, payment: BillPayment) {
        self.bill_payments
            .insert(payment.payment_id.clone(), payment);
    }

    pub fn insert_distribution(&self, mut distribution: Distribution) {
        if distribution.id == 0 {
            distribution.id = self.next_distribution_id.fetch_add(1, Ordering::SeqCst);
        }
        self.distributions.insert(distribution.user_id, distribution);
    }

    pub fn bill_payment(&self, payment_id: &str) -> Option<BillPayment> {
        self.bill_payments.get(payment_id).map(|p| p.clone())
    }

    pub fn distribution(&self, user_id: i64) -> Option<Distribution> {
        self.distributions.get(&user_id).map(|d| d.clone())
    }

    pub fn distribution_count(&self) -> usize {
        self.distributions.len()
    }

    pub fn distribution_orders_of(&self, user_id: i64) -> Vec<DistributionOrder> {
        self.distribution_orders
            .get(&user_id)
            .map(|orders| orders.clone())
            .unwrap_or_default()
    }

    pub fn agent_of_order(&self, order_id: &str) -> Option<i64> {
        self.agent_orders.get(order_id).map(|a| *a)
    }

    /// 用户分销订单累计金额
    fn total_spend(&self, user_id: i64) -> Decimal {
        self.distribution_orders
            .get(&user_id)
            .map(|orders| orders.iter().map(|o| o.amount).sum())
            .unwrap_or(Decimal::ZERO)
    }

    fn grade_amount(&self, grade_id: i64) -> Decimal {
        self.grades
            .iter()
            .find(|g| g.id == grade_id)
            .map(|g| g.upgrade_amount)
            .unwrap_or(Decimal::ZERO)
    }

    /// 累计金额可达到的最高等级
    fn reachable_grade(&self, spend: Decimal) -> Option<&DistributionGrade> {
        self.grades
            .iter()
            .rev()
            .find(|g| g.upgrade_amount <= spend)
    }
}

#[async_trait]
impl BillPaymentService for InMemoryMall {
    async fn update_by_trade_no(&self, update: &BillPaymentUpdate) -> Result<()> {
        let mut payment = self
            .bill_payments
            .get_mut(&update.payment_id)
            .ok_or_else(|| MallError::NotFound {
                entity: "BillPayment".to_string(),
                id: update.payment_id.clone(),
            })?;
        payment.apply(update);
        debug!(payment_id = %update.payment_id, status = ?update.status, "支付单已更新");
        Ok(())
    }
}

#[async_trait]
impl AgentOrderService for InMemoryMall {
    async fn add_data(&self, order: &Order) -> Result<CallbackResult> {
        let Some(agent_id) = self.agents.get(&order.user_id).map(|a| *a) else {
            return Ok(CallbackResult::failure("用户未绑定代理"));
        };

        self.agent_orders.insert(order.order_id.clone(), agent_id);
        Ok(CallbackResult::success("代理结佣成功").with_data(serde_json::json!({
            "orderId": order.order_id,
            "agentId": agent_id,
            "amount": order.payed_amount,
        })))
    }
}

#[async_trait]
impl DistributionOrderService for InMemoryMall {
    /// 同一订单重复投递只记录一次
    async fn add_data(&self, order: &Order) -> Result<()> {
        let mut orders = self.distribution_orders.entry(order.user_id).or_default();
        let duplicate =
            !order.order_id.is_empty() && orders.iter().any(|o| o.order_id == order.order_id);
        if !duplicate {
            orders.push(DistributionOrder::from(order));
        }
        Ok(())
    }
}

#[async_trait]
impl DistributionService for InMemoryMall {
    async fn exists_by_user(&self, user_id: i64) -> Result<bool> {
        Ok(self.distributions.contains_key(&user_id))
    }

    async fn check_condition(
        &self,
        config: &ConfigDictionary,
        mut draft: Distribution,
        user_id: i64,
    ) -> Result<Distribution> {
        let condition = DistributionCondition::from_setting(
            config.get_int(keys::DISTRIBUTION_CONDITION, 1),
        );

        let (progress, msg) = match condition {
            Some(DistributionCondition::Unconditional) => {
                (CONDITION_PROGRESS_COMPLETE, "无门槛".to_string())
            }
            Some(DistributionCondition::AnyPurchase) => {
                let purchased = self
                    .distribution_orders
                    .get(&user_id)
                    .is_some_and(|orders| !orders.is_empty());
                let progress = if purchased { CONDITION_PROGRESS_COMPLETE } else { 0 };
                (progress, "购买任意商品".to_string())
            }
            Some(DistributionCondition::SpendAmount) => {
                let threshold = config
                    .get(keys::DISTRIBUTION_MONEY)
                    .and_then(|v| v.trim().parse::<Decimal>().ok())
                    .unwrap_or(Decimal::ZERO);
                let spend = self.total_spend(user_id);
                let progress = if spend >= threshold {
                    CONDITION_PROGRESS_COMPLETE
                } else if threshold <= Decimal::ZERO {
                    // 门槛非正而消费为负（退款冲减），按未开始处理
                    0
                } else {
                    (spend * Decimal::ONE_HUNDRED / threshold)
                        .floor()
                        .to_i32()
                        .unwrap_or(0)
                        .clamp(0, CONDITION_PROGRESS_COMPLETE - 1)
                };
                (progress, format!("累计消费满{threshold}元，已消费{spend}元"))
            }
            None => (0, "未配置有效的分销条件".to_string()),
        };

        draft.user_id = user_id;
        draft.condition_progress = progress;
        draft.condition_status = progress == CONDITION_PROGRESS_COMPLETE;
        draft.condition_msg = msg;
        Ok(draft)
    }

    async fn add_data(&self, mut distribution: Distribution, user_id: i64) -> Result<CallbackResult> {
        match self.distributions.entry(user_id) {
            Entry::Occupied(_) => Ok(CallbackResult::failure("该用户已是分销商")),
            Entry::Vacant(slot) => {
                distribution.id = self.next_distribution_id.fetch_add(1, Ordering::SeqCst);
                distribution.user_id = user_id;
                distribution.created_at = Some(Utc::now());
                if distribution.grade_id == 0 {
                    distribution.grade_id = self.grades.first().map(|g| g.id).unwrap_or(0);
                }
                let id = distribution.id;
                slot.insert(distribution);
                info!(user_id, distribution_id = id, "分销商已开通");
                Ok(CallbackResult::success("分销商开通成功"))
            }
        }
    }

    /// 已审核的分销商按累计金额升级，不降级
    async fn check_update(&self, user_id: i64) -> Result<()> {
        let spend = self.total_spend(user_id);
        let Some(target) = self.reachable_grade(spend).cloned() else {
            return Ok(());
        };

        let Some(mut distribution) = self.distributions.get_mut(&user_id) else {
            return Ok(());
        };
        if distribution.verify_status != DistributionVerifyStatus::VerifyYes {
            return Ok(());
        }

        if target.upgrade_amount > self.grade_amount(distribution.grade_id) {
            info!(
                user_id,
                from = distribution.grade_id,
                to = target.id,
                grade = %target.name,
                "分销商等级提升"
            );
            distribution.grade_id = target.id;
        }
        Ok(())
    }
}

#[async_trait]
impl SettingService for InMemoryMall {
    async fn get_config_dictionaries(&self) -> Result<ConfigDictionary> {
        let mut config = ConfigDictionary::new();
        for entry in self.settings.iter() {
            config.insert(entry.key().clone(), entry.value().clone());
        }
        Ok(config)
    }
}

#[async_trait]
impl UserService for InMemoryMall {
    async fn get_by_id(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }
}
