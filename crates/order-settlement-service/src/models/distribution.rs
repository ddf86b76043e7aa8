//! 分销商与分销订单实体

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::DistributionVerifyStatus;
use super::order::Order;

/// 分销商条件达成的进度上限
pub const CONDITION_PROGRESS_COMPLETE: i32 = 100;

/// 分销商
///
/// 生命周期：不存在 -> 条件未满足（进度 0~99）-> 条件满足（进度 100）-> 审核通过。
/// 等级升级只作用于已审核通过的记录。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Distribution {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub grade_id: i64,
    pub mobile: String,
    pub verify_status: DistributionVerifyStatus,
    pub verify_time: Option<DateTime<Utc>>,
    /// 条件是否满足（仅条件检查时填充）
    pub condition_status: bool,
    /// 条件达成进度 0~100
    pub condition_progress: i32,
    pub condition_msg: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Distribution {
    /// 条件已全部满足
    pub fn is_qualified(&self) -> bool {
        self.condition_status && self.condition_progress == CONDITION_PROGRESS_COMPLETE
    }
}

/// 分享关联订单日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionOrder {
    pub order_id: String,
    pub user_id: i64,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for DistributionOrder {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            user_id: order.user_id,
            amount: order.payed_amount,
            created_at: Utc::now(),
        }
    }
}

/// 分销商等级
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionGrade {
    pub id: i64,
    pub name: String,
    /// 升级所需累计分销订单金额
    pub upgrade_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_qualified_requires_both_flags() {
        let mut draft = Distribution {
            condition_status: true,
            condition_progress: 99,
            ..Default::default()
        };
        assert!(!draft.is_qualified());

        draft.condition_progress = 100;
        assert!(draft.is_qualified());

        draft.condition_status = false;
        assert!(!draft.is_qualified());
    }
}
