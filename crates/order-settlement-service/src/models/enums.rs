//! 结算相关枚举类型定义
//!
//! 状态类枚举在存储与消息中均以整数表示，通过 `try_from`/`into` 与 i32 互转。

use serde::{Deserialize, Serialize};

/// 定义一个以整数序列化的枚举，未知取值在反序列化时报错
macro_rules! int_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i32", into = "i32")]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                value as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = String;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(format!("无效的{}取值: {}", stringify!($name), other)),
                }
            }
        }
    };
}

int_enum! {
    /// 支付单状态
    BillPaymentStatus {
        /// 未支付
        NoPay = 0,
        /// 支付成功
        Payed = 1,
        /// 其他（支付失败、异常等）
        Other = 2,
    }
}

int_enum! {
    /// 分销商审核状态
    #[derive(Default)]
    DistributionVerifyStatus {
        /// 审核通过
        VerifyYes = 1,
        /// 审核驳回
        VerifyNo = 2,
        /// 等待审核
        #[default]
        WaitingVerify = 3,
    }
}

int_enum! {
    /// 订单状态
    #[derive(Default)]
    OrderStatus {
        /// 正常
        #[default]
        Normal = 1,
        /// 已完成
        Complete = 2,
        /// 已取消
        Cancel = 3,
    }
}

/// 支付方式编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Wechatpay,
    Alipay,
    Balancepay,
    Offline,
}

impl PaymentType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Wechatpay => "wechatpay",
            Self::Alipay => "alipay",
            Self::Balancepay => "balancepay",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// 分销模式，对应系统设置 `DistributionType`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionType {
    /// 无需审核，但需满足分销条件后自动成为分销商
    ConditionalAuto,
    /// 其余模式（人工申请、审核等）不在结算时自动开通
    Other(i32),
}

impl DistributionType {
    pub const CONDITIONAL_AUTO: i32 = 3;

    pub fn from_setting(value: i32) -> Self {
        match value {
            Self::CONDITIONAL_AUTO => Self::ConditionalAuto,
            other => Self::Other(other),
        }
    }
}
