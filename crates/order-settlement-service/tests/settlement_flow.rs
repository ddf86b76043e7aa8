//! 结算流程集成测试
//!
//! 通过订阅表分发原始负载，协作服务使用内存实现，覆盖支付通知与订单结佣的完整路径。

use std::sync::Arc;

use mall_shared::lock::{LockConfig, LockManager};
use mall_shared::redis_mq::queues;
use order_settlement::memory::InMemoryMall;
use order_settlement::models::setting::keys;
use order_settlement::models::{
    BillPayment, BillPaymentStatus, Distribution, DistributionVerifyStatus, PaymentType, User,
};
use order_settlement::{SettlementServices, SubscriberRegistry, build_registry};
use rust_decimal_macros::dec;

// ==================== 辅助函数 ====================

fn setup(mall: &Arc<InMemoryMall>) -> SubscriberRegistry {
    let services = SettlementServices::from_backend(mall.clone());
    let lock = Arc::new(LockManager::local(LockConfig::default()));
    build_registry(services, lock)
}

fn user(id: i64, nick_name: Option<&str>) -> User {
    User {
        id,
        mobile: format!("1380000{id:04}"),
        nick_name: nick_name.map(str::to_string),
    }
}

fn order_payload(order_id: &str, user_id: i64, amount: &str) -> String {
    format!(r#"{{"orderId":"{order_id}","userId":{user_id},"payedAmount":"{amount}","status":2}}"#)
}

// ==================== 支付通知 ====================

#[tokio::test]
async fn test_successful_payment_marks_bill_payed() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.insert_bill_payment(BillPayment::pending("P1001", dec!(100.50)));
    let registry = setup(&mall);

    registry
        .dispatch(
            queues::WECHAT_PAY_NOTICE,
            r#"{"return_code":"SUCCESS","result_code":"SUCCESS","out_trade_no":"P1001","transaction_id":"42000011","total_fee":10050}"#,
        )
        .await
        .unwrap();

    let payment = mall.bill_payment("P1001").unwrap();
    assert_eq!(payment.status, BillPaymentStatus::Payed);
    assert_eq!(payment.money, dec!(100.50));
    assert_eq!(payment.payment_code, Some(PaymentType::Wechatpay));
    assert_eq!(payment.payed_msg.as_deref(), Some("SUCCESS"));
    assert_eq!(payment.trade_no.as_deref(), Some("42000011"));
}

#[tokio::test]
async fn test_failed_payment_marks_bill_other() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.insert_bill_payment(BillPayment::pending("P1002", dec!(5)));
    let registry = setup(&mall);

    registry
        .dispatch(
            queues::WECHAT_PAY_NOTICE,
            r#"{"ReturnCode":"SUCCESS","ResultCode":"FAIL","ErrCode":"ORDERPAID","ErrCodeDes":"订单已支付","OutTradeNo":"P1002","TotalFee":500}"#,
        )
        .await
        .unwrap();

    let payment = mall.bill_payment("P1002").unwrap();
    assert_eq!(payment.status, BillPaymentStatus::Other);
    assert_eq!(payment.payed_msg.as_deref(), Some("ORDERPAID:订单已支付"));
    assert_eq!(payment.trade_no, None);
}

#[tokio::test]
async fn test_gateway_failure_leaves_bill_untouched() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.insert_bill_payment(BillPayment::pending("P1003", dec!(1)));
    let registry = setup(&mall);

    registry
        .dispatch(
            queues::WECHAT_PAY_NOTICE,
            r#"{"return_code":"FAIL","return_msg":"签名错误","out_trade_no":"P1003","total_fee":100}"#,
        )
        .await
        .unwrap();

    assert_eq!(
        mall.bill_payment("P1003").unwrap(),
        BillPayment::pending("P1003", dec!(1))
    );
}

#[tokio::test]
async fn test_null_notification_is_noop() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.insert_bill_payment(BillPayment::pending("P1004", dec!(1)));
    let registry = setup(&mall);

    registry
        .dispatch(queues::WECHAT_PAY_NOTICE, "null")
        .await
        .unwrap();

    assert_eq!(
        mall.bill_payment("P1004").unwrap(),
        BillPayment::pending("P1004", dec!(1))
    );
}

#[tokio::test]
async fn test_payment_for_unknown_bill_is_error() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    let registry = setup(&mall);

    let err = registry
        .dispatch(
            queues::WECHAT_PAY_NOTICE,
            r#"{"return_code":"SUCCESS","result_code":"SUCCESS","out_trade_no":"missing","total_fee":1}"#,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

// ==================== 订单结佣 ====================

#[tokio::test]
async fn test_agent_order_does_not_touch_distribution() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.insert_user(user(1, Some("代理客户")));
    mall.bind_agent(1, 500);
    let registry = setup(&mall);

    registry
        .dispatch(
            queues::ORDER_AGENT_OR_DISTRIBUTION,
            &order_payload("O1", 1, "99.00"),
        )
        .await
        .unwrap();

    assert_eq!(mall.agent_of_order("O1"), Some(500));
    assert!(mall.distribution_orders_of(1).is_empty());
    assert_eq!(mall.distribution_count(), 0);
}

#[tokio::test]
async fn test_qualified_user_becomes_distributor() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.insert_user(user(42, Some("小王")));
    let registry = setup(&mall);

    registry
        .dispatch(
            queues::ORDER_AGENT_OR_DISTRIBUTION,
            &order_payload("O2", 42, "120.00"),
        )
        .await
        .unwrap();

    let distribution = mall.distribution(42).unwrap();
    assert_eq!(distribution.name, "小王");
    assert_eq!(distribution.mobile, "13800000042");
    assert_eq!(distribution.verify_status, DistributionVerifyStatus::VerifyYes);
    assert!(distribution.verify_time.is_some());
    assert_eq!(mall.distribution_orders_of(42).len(), 1);
}

/// 上游按数据库实体序列化的订单：数字金额，下单时间不带时区
#[tokio::test]
async fn test_database_serialized_order_is_settled() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.insert_user(user(42, Some("小王")));
    let registry = setup(&mall);

    registry
        .dispatch(
            queues::ORDER_AGENT_OR_DISTRIBUTION,
            r#"{"orderId":"2024050112","userId":42,"orderAmount":100.50,"payedAmount":100.50,"status":2,"payStatus":2,"createTime":"2024-05-01T10:20:30"}"#,
        )
        .await
        .unwrap();

    assert_eq!(mall.distribution_orders_of(42).len(), 1);
    assert!(mall.distribution(42).is_some());
}

#[tokio::test]
async fn test_distributor_name_falls_back_to_mobile() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.insert_user(user(43, None));
    let registry = setup(&mall);

    registry
        .dispatch(queues::ORDER_AGENT_OR_DISTRIBUTION, r#"{"userId":43}"#)
        .await
        .unwrap();

    assert_eq!(mall.distribution(43).unwrap().name, "13800000043");
}

#[tokio::test]
async fn test_spend_threshold_reached_on_second_order() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.set_setting(keys::DISTRIBUTION_CONDITION, "3");
    mall.set_setting(keys::DISTRIBUTION_MONEY, "300");
    mall.insert_user(user(44, Some("老李")));
    let registry = setup(&mall);

    registry
        .dispatch(
            queues::ORDER_AGENT_OR_DISTRIBUTION,
            &order_payload("O3", 44, "200.00"),
        )
        .await
        .unwrap();
    assert!(mall.distribution(44).is_none());

    registry
        .dispatch(
            queues::ORDER_AGENT_OR_DISTRIBUTION,
            &order_payload("O4", 44, "100.00"),
        )
        .await
        .unwrap();
    assert!(mall.distribution(44).is_some());
}

/// `{"userId":42}`，代理未接手，DistributionType=2：只记录分销订单日志
#[tokio::test]
async fn test_manual_review_mode_only_logs_order() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.set_setting(keys::DISTRIBUTION_TYPE, "2");
    mall.insert_user(user(42, Some("小王")));
    let registry = setup(&mall);

    registry
        .dispatch(queues::ORDER_AGENT_OR_DISTRIBUTION, r#"{"userId":42}"#)
        .await
        .unwrap();

    assert_eq!(mall.distribution_count(), 0);
    assert_eq!(mall.distribution_orders_of(42).len(), 1);
}

#[tokio::test]
async fn test_existing_distributor_is_upgraded() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.set_setting(keys::DISTRIBUTION_TYPE, "1");
    mall.insert_distribution(Distribution {
        user_id: 45,
        grade_id: 1,
        verify_status: DistributionVerifyStatus::VerifyYes,
        ..Default::default()
    });
    let registry = setup(&mall);

    registry
        .dispatch(
            queues::ORDER_AGENT_OR_DISTRIBUTION,
            &order_payload("O5", 45, "1200.00"),
        )
        .await
        .unwrap();

    assert_eq!(mall.distribution(45).unwrap().grade_id, 2);
    assert_eq!(mall.distribution_count(), 1);
}

#[tokio::test]
async fn test_missing_user_is_error() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    let registry = setup(&mall);

    let err = registry
        .dispatch(queues::ORDER_AGENT_OR_DISTRIBUTION, r#"{"userId":404}"#)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "USER_NOT_FOUND");
    assert_eq!(mall.distribution_count(), 0);
}

#[tokio::test]
async fn test_null_order_is_noop() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    let registry = setup(&mall);

    registry
        .dispatch(queues::ORDER_AGENT_OR_DISTRIBUTION, "null")
        .await
        .unwrap();
    assert_eq!(mall.distribution_count(), 0);
}

// ==================== 并发 ====================

/// 同一新用户的多笔订单并发结算，只会开通一个分销商
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_create_single_distributor() {
    let mall = Arc::new(InMemoryMall::with_defaults());
    mall.insert_user(user(77, Some("并发用户")));
    let registry = Arc::new(setup(&mall));

    let mut handles = Vec::new();
    for i in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .dispatch(
                    queues::ORDER_AGENT_OR_DISTRIBUTION,
                    &order_payload(&format!("C{i}"), 77, "10.00"),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(mall.distribution_count(), 1);
    assert_eq!(mall.distribution_orders_of(77).len(), 16);
}
