//! 订单与结算回执实体

use chrono::{DateTime, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::enums::OrderStatus;

/// 已完结订单
///
/// 结算订阅者只读取订单，所有字段都有默认值，缺省字段不影响解析。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    pub order_id: String,
    pub user_id: i64,
    pub order_amount: Decimal,
    pub payed_amount: Decimal,
    pub status: OrderStatus,
    pub pay_status: i32,
    /// 下单时间，上游可能带时区也可能不带，统一按 UTC 墙上时间保存
    #[serde(deserialize_with = "lenient_time")]
    pub create_time: Option<NaiveDateTime>,
}

/// 同时接受 `2024-05-01T10:20:30` 与 RFC 3339 格式；结算不依赖该字段，无法识别时置空
fn lenient_time<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|text| {
        let text = text.trim();
        DateTime::parse_from_rfc3339(text)
            .map(|time| time.naive_utc())
            .or_else(|_| text.parse::<NaiveDateTime>())
            .ok()
    }))
}

impl Order {
    pub fn new(order_id: impl Into<String>, user_id: i64, payed_amount: Decimal) -> Self {
        Self {
            order_id: order_id.into(),
            user_id,
            order_amount: payed_amount,
            payed_amount,
            status: OrderStatus::Complete,
            ..Default::default()
        }
    }
}

/// 服务调用回执
///
/// 代理结佣的返回值，同时也是结算完成后写入日志的内容。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackResult {
    pub status: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CallbackResult {
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            status: true,
            msg: msg.into(),
            data: None,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            status: false,
            msg: msg.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minimal_order_payload() {
        let order: Order = serde_json::from_str(r#"{"userId":42}"#).unwrap();
        assert_eq!(order.user_id, 42);
        assert_eq!(order.order_id, "");
        assert_eq!(order.status, OrderStatus::Normal);
    }

    #[test]
    fn test_full_order_payload() {
        let order: Order = serde_json::from_str(
            r#"{"orderId":"2024010112","userId":7,"orderAmount":"199.9","payedAmount":"150.00","status":2,"payStatus":2}"#,
        )
        .unwrap();
        assert_eq!(order.order_id, "2024010112");
        assert_eq!(order.order_amount, dec!(199.9));
        assert_eq!(order.payed_amount, dec!(150.00));
        assert_eq!(order.status, OrderStatus::Complete);
    }

    #[test]
    fn test_create_time_without_offset() {
        let order: Order = serde_json::from_str(
            r#"{"orderId":"2024050112","userId":42,"orderAmount":100.50,"payedAmount":100.50,"status":2,"payStatus":2,"createTime":"2024-05-01T10:20:30"}"#,
        )
        .unwrap();
        assert_eq!(order.payed_amount, dec!(100.50));
        assert_eq!(order.status, OrderStatus::Complete);
        assert_eq!(
            order.create_time.unwrap().to_string(),
            "2024-05-01 10:20:30"
        );
    }

    #[test]
    fn test_create_time_other_forms() {
        let with_offset: Order =
            serde_json::from_str(r#"{"userId":1,"createTime":"2024-05-01T10:20:30+08:00"}"#).unwrap();
        assert_eq!(
            with_offset.create_time.unwrap().to_string(),
            "2024-05-01 02:20:30"
        );

        let fractional: Order =
            serde_json::from_str(r#"{"userId":1,"createTime":"2024-05-01T10:20:30.123"}"#).unwrap();
        assert!(fractional.create_time.is_some());

        let null: Order = serde_json::from_str(r#"{"userId":1,"createTime":null}"#).unwrap();
        assert!(null.create_time.is_none());

        let garbage: Order = serde_json::from_str(r#"{"userId":1,"createTime":"昨天"}"#).unwrap();
        assert_eq!(garbage.user_id, 1);
        assert!(garbage.create_time.is_none());
    }

    #[test]
    fn test_callback_result_json() {
        let json = serde_json::to_string(&CallbackResult::success("分销成功")).unwrap();
        assert_eq!(json, r#"{"status":true,"msg":"分销成功"}"#);
    }
}
