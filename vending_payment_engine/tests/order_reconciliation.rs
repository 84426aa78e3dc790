//! End-to-end tests for the order lifecycle against a real SQLite store.
use std::sync::Arc;

use vending_payment_engine::{
    db_types::{NewOrder, NewPaymentTransaction, OrderCode, OrderStatusType, PaymentSource},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{PaymentGatewayError, StockAdjuster},
    OrderFlowApi,
    SqliteDatabase,
};
use vpg_common::Vnd;

async fn new_api() -> OrderFlowApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 25).await.expect("Error creating database");
    OrderFlowApi::new(db, EventProducers::default())
}

fn order(code: i64) -> NewOrder {
    NewOrder::new(OrderCode(code), 1, 10, Vnd::from_thousands(15))
}

async fn seed_slot(api: &OrderFlowApi<SqliteDatabase>, stock: i64) {
    api.db().upsert_slot(1, "A1", 10, stock).await.expect("Error seeding slot");
}

async fn slot_stock(api: &OrderFlowApi<SqliteDatabase>) -> i64 {
    api.db().fetch_slots(1).await.expect("Error fetching slots")[0].stock
}

#[tokio::test]
async fn order_submission_is_idempotent() {
    let api = new_api().await;
    let (first, created) = api.process_new_order(order(100)).await.unwrap();
    assert!(created);
    assert_eq!(first.status, OrderStatusType::Pending);
    let (second, created) = api.process_new_order(order(100)).await.unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);
}

#[tokio::test]
async fn payment_confirmation_decrements_stock_once() {
    let api = new_api().await;
    seed_slot(&api, 5).await;
    api.process_new_order(order(101)).await.unwrap();

    let paid = api.confirm_payment(&OrderCode(101), PaymentSource::Poll).await.unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(slot_stock(&api).await, 4);

    // A webhook reporting the same settlement a second later changes nothing
    let paid = api.confirm_payment(&OrderCode(101), PaymentSource::Webhook).await.unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(slot_stock(&api).await, 4);
}

#[tokio::test]
async fn manual_confirmation_decrements_stock_once() {
    let api = new_api().await;
    seed_slot(&api, 5).await;
    api.process_new_order(order(112)).await.unwrap();

    // An operator marking the order paid is a settlement like any other
    let paid = api.confirm_payment(&OrderCode(112), PaymentSource::Manual).await.unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(slot_stock(&api).await, 4);

    let paid = api.confirm_payment(&OrderCode(112), PaymentSource::Manual).await.unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(slot_stock(&api).await, 4);
}

#[tokio::test]
async fn racing_submissions_of_a_new_code_create_one_order() {
    let api = Arc::new(new_api().await);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let api = Arc::clone(&api);
        handles.push(tokio::spawn(async move { api.process_new_order(order(556)).await }));
    }
    let mut created_count = 0;
    for handle in handles {
        // No submission may surface the unique constraint as an error
        let (order, created) = handle.await.unwrap().unwrap();
        assert_eq!(order.order_code, OrderCode(556));
        if created {
            created_count += 1;
        }
    }
    assert_eq!(created_count, 1);
}

#[tokio::test]
async fn racing_triggers_decrement_stock_exactly_once() {
    let api = Arc::new(new_api().await);
    seed_slot(&api, 5).await;
    api.process_new_order(order(555)).await.unwrap();

    let mut handles = Vec::new();
    for source in [PaymentSource::Poll, PaymentSource::Webhook, PaymentSource::Manual, PaymentSource::Webhook] {
        let api = Arc::clone(&api);
        handles.push(tokio::spawn(async move { api.confirm_payment(&OrderCode(555), source).await }));
    }
    for handle in handles {
        let order = handle.await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatusType::Paid);
    }
    assert_eq!(slot_stock(&api).await, 4);
}

#[tokio::test]
async fn successful_dispense_completes_the_order() {
    let api = new_api().await;
    seed_slot(&api, 5).await;
    api.process_new_order(order(102)).await.unwrap();
    api.confirm_payment(&OrderCode(102), PaymentSource::Webhook).await.unwrap();

    let done = api.dispense_completed(&OrderCode(102), true, None).await.unwrap();
    assert_eq!(done.status, OrderStatusType::Completed);
    // The decrement already happened at payment time, so completion does not repeat it
    assert_eq!(slot_stock(&api).await, 4);

    // The machine retries the callback; nothing moves
    let done = api.dispense_completed(&OrderCode(102), true, None).await.unwrap();
    assert_eq!(done.status, OrderStatusType::Completed);
    assert_eq!(slot_stock(&api).await, 4);
}

#[tokio::test]
async fn dispense_callback_for_unpaid_order_is_rejected() {
    let api = new_api().await;
    api.process_new_order(order(103)).await.unwrap();
    let err = api.dispense_completed(&OrderCode(103), true, None).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::InvalidStateChange { .. }));
}

#[tokio::test]
async fn failed_dispense_is_terminal() {
    let api = new_api().await;
    seed_slot(&api, 5).await;
    api.process_new_order(order(104)).await.unwrap();
    api.confirm_payment(&OrderCode(104), PaymentSource::Manual).await.unwrap();

    let failed = api.dispense_completed(&OrderCode(104), false, Some("Motor jam".to_string())).await.unwrap();
    assert_eq!(failed.status, OrderStatusType::Failed);

    // A later "successful" callback for the same order must not resurrect it
    let err = api.dispense_completed(&OrderCode(104), true, None).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::InvalidStateChange { .. }));
}

#[tokio::test]
async fn cancelled_orders_cannot_be_paid() {
    let api = new_api().await;
    seed_slot(&api, 5).await;
    api.process_new_order(order(105)).await.unwrap();
    let cancelled = api.cancel_order(&OrderCode(105)).await.unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);

    // A late settlement is logged and swallowed; the order stays cancelled and no stock moves
    let order = api.confirm_payment(&OrderCode(105), PaymentSource::Webhook).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(slot_stock(&api).await, 5);
}

#[tokio::test]
async fn paid_orders_cannot_be_cancelled() {
    let api = new_api().await;
    seed_slot(&api, 5).await;
    api.process_new_order(order(106)).await.unwrap();
    api.confirm_payment(&OrderCode(106), PaymentSource::Poll).await.unwrap();
    let err = api.cancel_order(&OrderCode(106)).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::InvalidStateChange { .. }));
}

#[tokio::test]
async fn duplicate_webhook_settlements_record_one_transaction() {
    let api = new_api().await;
    seed_slot(&api, 5).await;
    api.process_new_order(order(107)).await.unwrap();

    let tx = NewPaymentTransaction {
        order_code: OrderCode(107),
        amount: Vnd::from_thousands(15),
        source: PaymentSource::Webhook,
        reference: Some("payos-ref-1".to_string()),
    };
    let (order, recorded) = api.settle_gateway_payment(tx.clone(), PaymentSource::Webhook).await.unwrap();
    assert!(recorded);
    assert_eq!(order.status, OrderStatusType::Paid);

    let (order, recorded) = api.settle_gateway_payment(tx, PaymentSource::Webhook).await.unwrap();
    assert!(!recorded);
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(slot_stock(&api).await, 4);
}

#[tokio::test]
async fn orders_never_regress_to_pending() {
    let api = new_api().await;
    seed_slot(&api, 5).await;
    api.process_new_order(order(111)).await.unwrap();
    api.confirm_payment(&OrderCode(111), PaymentSource::Poll).await.unwrap();
    let err = api.transition(&OrderCode(111), OrderStatusType::Pending).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::InvalidStateChange { .. }));
}

#[tokio::test]
async fn unknown_orders_are_reported_as_missing() {
    let api = new_api().await;
    let err = api.confirm_payment(&OrderCode(999), PaymentSource::Poll).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::OrderNotFound(OrderCode(999))));
}

#[tokio::test]
async fn paid_orders_are_listed_for_the_machine() {
    let api = new_api().await;
    seed_slot(&api, 5).await;
    api.process_new_order(order(108)).await.unwrap();
    api.process_new_order(order(109)).await.unwrap();
    api.confirm_payment(&OrderCode(109), PaymentSource::Poll).await.unwrap();

    let paid = api.fetch_paid_orders(1).await.unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].order_code, OrderCode(109));
}

#[tokio::test]
async fn empty_slot_does_not_block_the_sale() {
    let api = new_api().await;
    seed_slot(&api, 0).await;
    api.process_new_order(order(110)).await.unwrap();
    let paid = api.confirm_payment(&OrderCode(110), PaymentSource::Webhook).await.unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(slot_stock(&api).await, 0);
}
