//! 结算协作服务接口
//!
//! 支付单、代理订单、分销订单、分销商、系统设置与用户的存取都通过 trait 抽象，
//! 处理器只依赖接口，测试时注入 mockall 生成的 mock，独立运行时注入内存实现。

use std::sync::Arc;

use async_trait::async_trait;
use mall_shared::error::Result;

use crate::models::{
    BillPaymentUpdate, CallbackResult, ConfigDictionary, Distribution, Order, User,
};

/// 支付单存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillPaymentService: Send + Sync {
    /// 按支付单号更新支付结果
    async fn update_by_trade_no(&self, update: &BillPaymentUpdate) -> Result<()>;
}

/// 代理订单
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentOrderService: Send + Sync {
    /// 尝试按代理关系结佣，`status == true` 表示订单已归属代理
    async fn add_data(&self, order: &Order) -> Result<CallbackResult>;
}

/// 分销订单日志
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DistributionOrderService: Send + Sync {
    async fn add_data(&self, order: &Order) -> Result<()>;
}

/// 分销商
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DistributionService: Send + Sync {
    async fn exists_by_user(&self, user_id: i64) -> Result<bool>;

    /// 按系统设置检查用户的分销条件，返回填充了条件状态与进度的草稿
    async fn check_condition(
        &self,
        config: &ConfigDictionary,
        draft: Distribution,
        user_id: i64,
    ) -> Result<Distribution>;

    async fn add_data(&self, distribution: Distribution, user_id: i64) -> Result<CallbackResult>;

    /// 检查已有分销商是否满足升级条件
    async fn check_update(&self, user_id: i64) -> Result<()>;
}

/// 系统设置
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingService: Send + Sync {
    async fn get_config_dictionaries(&self) -> Result<ConfigDictionary>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_by_id(&self, user_id: i64) -> Result<Option<User>>;
}

/// 处理器依赖的协作服务集合
#[derive(Clone)]
pub struct SettlementServices {
    pub bill_payments: Arc<dyn BillPaymentService>,
    pub agent_orders: Arc<dyn AgentOrderService>,
    pub distribution_orders: Arc<dyn DistributionOrderService>,
    pub distributions: Arc<dyn DistributionService>,
    pub settings: Arc<dyn SettingService>,
    pub users: Arc<dyn UserService>,
}

impl SettlementServices {
    /// 由同一个后端实现全部接口（内存实现、单体数据库实现等）
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: BillPaymentService
            + AgentOrderService
            + DistributionOrderService
            + DistributionService
            + SettingService
            + UserService
            + 'static,
    {
        Self {
            bill_payments: backend.clone(),
            agent_orders: backend.clone(),
            distribution_orders: backend.clone(),
            distributions: backend.clone(),
            settings: backend.clone(),
            users: backend,
        }
    }
}
