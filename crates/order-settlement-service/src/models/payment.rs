//! 支付通知与支付单相关实体

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{BillPaymentStatus, PaymentType};

/// 网关返回码：成功
pub const WECHAT_PAY_SUCCESS: &str = "SUCCESS";

/// 微信支付统一下单异步通知
///
/// 字段名沿用网关的 snake_case 命名，同时兼容 PascalCase 序列化的负载。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentNotification {
    /// 通信标识，表示网关调用是否成功
    #[serde(alias = "ReturnCode")]
    pub return_code: String,
    #[serde(alias = "ReturnMsg")]
    pub return_msg: Option<String>,
    /// 业务结果，表示支付是否成功
    #[serde(alias = "ResultCode")]
    pub result_code: String,
    #[serde(alias = "ErrCode")]
    pub err_code: Option<String>,
    #[serde(alias = "ErrCodeDes")]
    pub err_code_des: Option<String>,
    /// 商户支付单号
    #[serde(alias = "OutTradeNo")]
    pub out_trade_no: String,
    /// 微信支付流水号
    #[serde(alias = "TransactionId")]
    pub transaction_id: Option<String>,
    /// 订单金额（分）
    #[serde(alias = "TotalFee")]
    pub total_fee: i64,
}

impl PaymentNotification {
    pub fn is_return_success(&self) -> bool {
        self.return_code == WECHAT_PAY_SUCCESS
    }

    pub fn is_result_success(&self) -> bool {
        self.result_code == WECHAT_PAY_SUCCESS
    }

    /// 支付金额（元），保留两位小数
    pub fn money(&self) -> Decimal {
        fen_to_yuan(self.total_fee)
    }

    /// 失败描述，格式为 `错误码:错误描述`
    pub fn error_message(&self) -> String {
        format!(
            "{}:{}",
            self.err_code.as_deref().unwrap_or_default(),
            self.err_code_des.as_deref().unwrap_or_default()
        )
    }
}

/// 分转元，银行家舍入保留两位小数
pub fn fen_to_yuan(fen: i64) -> Decimal {
    (Decimal::from(fen) / Decimal::ONE_HUNDRED).round_dp(2)
}

/// 支付单更新指令，按支付单号定位记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPaymentUpdate {
    /// 支付单号（即网关通知中的商户单号）
    pub payment_id: String,
    pub status: BillPaymentStatus,
    pub payment_code: PaymentType,
    pub money: Decimal,
    /// 支付结果描述：成功时为业务结果码，失败时为错误描述
    pub payed_msg: String,
    /// 第三方支付流水号
    pub trade_no: String,
}

/// 持久化的支付单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPayment {
    pub payment_id: String,
    pub status: BillPaymentStatus,
    pub payment_code: Option<PaymentType>,
    pub money: Decimal,
    pub payed_msg: Option<String>,
    pub trade_no: Option<String>,
}

impl BillPayment {
    /// 新建的待支付单
    pub fn pending(payment_id: impl Into<String>, money: Decimal) -> Self {
        Self {
            payment_id: payment_id.into(),
            status: BillPaymentStatus::NoPay,
            payment_code: None,
            money,
            payed_msg: None,
            trade_no: None,
        }
    }

    pub fn apply(&mut self, update: &BillPaymentUpdate) {
        self.status = update.status;
        self.payment_code = Some(update.payment_code);
        self.money = update.money;
        self.payed_msg = Some(update.payed_msg.clone());
        self.trade_no = Some(update.trade_no.clone()).filter(|t| !t.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fen_to_yuan() {
        assert_eq!(fen_to_yuan(10050), dec!(100.50));
        assert_eq!(fen_to_yuan(1), dec!(0.01));
        assert_eq!(fen_to_yuan(0), dec!(0));
    }

    #[test]
    fn test_notification_accepts_both_naming_styles() {
        let snake: PaymentNotification = serde_json::from_str(
            r#"{"return_code":"SUCCESS","result_code":"SUCCESS","out_trade_no":"P1","transaction_id":"T1","total_fee":10050}"#,
        )
        .unwrap();
        let pascal: PaymentNotification = serde_json::from_str(
            r#"{"ReturnCode":"SUCCESS","ResultCode":"SUCCESS","OutTradeNo":"P1","TransactionId":"T1","TotalFee":10050}"#,
        )
        .unwrap();

        for notify in [snake, pascal] {
            assert!(notify.is_return_success());
            assert!(notify.is_result_success());
            assert_eq!(notify.out_trade_no, "P1");
            assert_eq!(notify.money(), dec!(100.50));
        }
    }

    #[test]
    fn test_error_message() {
        let notify = PaymentNotification {
            err_code: Some("NOTENOUGH".to_string()),
            err_code_des: Some("余额不足".to_string()),
            ..Default::default()
        };
        assert_eq!(notify.error_message(), "NOTENOUGH:余额不足");
        assert_eq!(PaymentNotification::default().error_message(), ":");
    }
}
