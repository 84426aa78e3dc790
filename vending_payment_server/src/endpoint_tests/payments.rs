use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use payos_tools::{hmac_sha256_hex, PayOsApi, PayOsConfig};
use serde_json::json;
use vending_payment_engine::{
    db_types::{Order, OrderCode, OrderStatusType, Slot},
    events::EventProducers,
    OrderFlowApi,
};
use vpg_common::{Secret, Vnd};

use super::{
    helpers::{get_request, post_request},
    mocks::MockOrderStore,
};
use crate::routes::{confirm_order, payment_status, payment_webhook};

const CHECKSUM_KEY: &str = "test-checksum-key";

fn order_in(status: OrderStatusType) -> Order {
    Order {
        id: 1,
        order_code: OrderCode(555),
        machine_id: 7,
        product_id: 10,
        amount: Vnd::from_thousands(15),
        status,
        payment_url: None,
        qr_code: None,
        stock_adjusted: false,
        created_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
    }
}

fn slot() -> Slot {
    Slot {
        id: 1,
        machine_id: 7,
        slot_code: "A1".to_string(),
        product_id: 10,
        stock: 4,
        updated_at: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
    }
}

fn payos_api() -> PayOsApi {
    let config = PayOsConfig {
        client_id: "client".to_string(),
        api_key: Secret::new("api-key".to_string()),
        checksum_key: Secret::new(CHECKSUM_KEY.to_string()),
        ..Default::default()
    };
    PayOsApi::new(config).expect("Error creating PayOS API")
}

#[actix_web::test]
async fn manual_confirmation_pays_the_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/payment/confirm/555", json!({}), configure_confirm).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"Paid""#), "unexpected body: {body}");
}

fn configure_confirm(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_fetch_order_by_code().returning(|_| Ok(Some(order_in(OrderStatusType::Pending))));
    store.expect_advance_order_status().returning(|_, _| Ok(Some(order_in(OrderStatusType::Paid))));
    store.expect_try_mark_stock_adjusted().returning(|_| Ok(true));
    store.expect_reduce_stock().returning(|_, _| Ok(Some(slot())));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.route("/payment/confirm/{order_code}", web::post().to(confirm_order::<MockOrderStore>))
        .app_data(web::Data::new(api));
}

#[actix_web::test]
async fn confirming_an_unknown_order_is_a_404() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_request("/payment/confirm/999", json!({}), configure_unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn configure_unknown(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_fetch_order_by_code().returning(|_| Ok(None));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.route("/payment/confirm/{order_code}", web::post().to(confirm_order::<MockOrderStore>))
        .app_data(web::Data::new(api));
}

#[actix_web::test]
async fn status_poll_returns_the_order_without_a_gateway() {
    let _ = env_logger::try_init().ok();
    // No PayOS API is registered, so the poll falls back to the ledger's view
    let (status, body) = get_request("/payment/status/555", configure_status).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"Pending""#), "unexpected body: {body}");
}

fn configure_status(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_fetch_order_by_code().returning(|_| Ok(Some(order_in(OrderStatusType::Pending))));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.route("/payment/status/{order_code}", web::get().to(payment_status::<MockOrderStore>))
        .app_data(web::Data::new(api));
}

#[actix_web::test]
async fn webhook_with_valid_signature_settles_the_order() {
    let _ = env_logger::try_init().ok();
    let data = json!({"amount": 15000, "orderCode": 555, "reference": "payos-ref-1"});
    let signature = hmac_sha256_hex(CHECKSUM_KEY, &data.to_string());
    let event = json!({"code": "00", "desc": "success", "data": data, "signature": signature});
    let (status, body) = post_request("/payment/webhook", event, configure_webhook).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""success":true"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn webhook_with_bad_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let data = json!({"amount": 15000, "orderCode": 555});
    let event = json!({"code": "00", "data": data, "signature": "deadbeef"});
    let (status, body) = post_request("/payment/webhook", event, configure_webhook).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains(r#""success":false"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn webhook_with_tampered_data_is_rejected() {
    let _ = env_logger::try_init().ok();
    let data = json!({"amount": 15000, "orderCode": 555});
    let signature = hmac_sha256_hex(CHECKSUM_KEY, &data.to_string());
    let tampered = json!({"amount": 1, "orderCode": 555});
    let event = json!({"code": "00", "data": tampered, "signature": signature});
    let (status, _) = post_request("/payment/webhook", event, configure_webhook).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn unsuccessful_payment_events_are_acknowledged_without_settling() {
    let _ = env_logger::try_init().ok();
    let data = json!({"orderCode": 555});
    let signature = hmac_sha256_hex(CHECKSUM_KEY, &data.to_string());
    let event = json!({"code": "01", "desc": "payment cancelled", "data": data, "signature": signature});
    // The store mock has no expectations set beyond the webhook path; a settle attempt would panic
    let (status, _) = post_request("/payment/webhook", event, configure_webhook_no_settle).await;
    assert_eq!(status, StatusCode::OK);
}

fn configure_webhook(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_record_gateway_transaction().returning(|_| Ok(true));
    store.expect_fetch_order_by_code().returning(|_| Ok(Some(order_in(OrderStatusType::Pending))));
    store.expect_advance_order_status().returning(|_, _| Ok(Some(order_in(OrderStatusType::Paid))));
    store.expect_try_mark_stock_adjusted().returning(|_| Ok(true));
    store.expect_reduce_stock().returning(|_, _| Ok(Some(slot())));
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.route("/payment/webhook", web::post().to(payment_webhook::<MockOrderStore>))
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(payos_api()));
}

fn configure_webhook_no_settle(cfg: &mut ServiceConfig) {
    let store = MockOrderStore::new();
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.route("/payment/webhook", web::post().to(payment_webhook::<MockOrderStore>))
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(payos_api()));
}
