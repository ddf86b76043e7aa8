//! 数据模型
//!
//! 订单结算涉及的支付单、订单、分销商、系统设置与用户实体。

pub mod distribution;
pub mod enums;
pub mod order;
pub mod payment;
pub mod setting;
pub mod user;

pub use distribution::{Distribution, DistributionGrade, DistributionOrder};
pub use enums::{
    BillPaymentStatus, DistributionType, DistributionVerifyStatus, OrderStatus, PaymentType,
};
pub use order::{CallbackResult, Order};
pub use payment::{BillPayment, BillPaymentUpdate, PaymentNotification};
pub use setting::{ConfigDictionary, ConfigEntry};
pub use user::User;
