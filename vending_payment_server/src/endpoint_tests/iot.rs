use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::{TimeZone, Utc};
use serde_json::json;
use vending_payment_engine::{
    db_types::{Order, OrderCode, OrderStatusType, Slot},
    events::EventProducers,
    security::{ReplayConfig, SecureEnvelope, SecureRequestGate},
    DeviceAuthApi,
    OrderFlowApi,
};
use vpg_common::Vnd;

use super::{
    helpers::post_request,
    mocks::{InMemoryRegistry, MockOrderStore},
};
use crate::{
    middleware::IotGateMiddlewareFactory,
    routes::{iot_dispense_complete, iot_heartbeat, iot_ping},
};

const SECRET: &str = "machine-7-test-secret";

fn sealed(data: serde_json::Value) -> serde_json::Value {
    let envelope = SecureEnvelope::seal(7, data, SECRET);
    serde_json::to_value(envelope).expect("Error serializing envelope")
}

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

fn gated_scope(registry: InMemoryRegistry) -> impl actix_web::dev::HttpServiceFactory {
    let gate = SecureRequestGate::new(registry, ReplayConfig::default());
    web::scope("/iot")
        .wrap(IotGateMiddlewareFactory::new(gate, false, false))
        .route("/ping", web::post().to(iot_ping))
        .route("/dispense-complete", web::post().to(iot_dispense_complete::<MockOrderStore>))
        .route("/heartbeat", web::post().to(iot_heartbeat::<InMemoryRegistry>))
}

#[actix_web::test]
async fn ping_with_valid_envelope_succeeds() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/iot/ping", sealed(json!({"hello": true})), configure_ping).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""machine_id":7"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn envelope_without_signature_is_rejected() {
    let _ = env_logger::try_init().ok();
    let mut envelope = sealed(json!({"hello": true}));
    envelope.as_object_mut().unwrap().remove("signature");
    let (status, body) = post_request("/iot/ping", envelope, configure_ping).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("E002"), "unexpected body: {body}");
}

#[actix_web::test]
async fn unknown_machine_is_rejected() {
    let _ = env_logger::try_init().ok();
    // Registry in `configure_no_devices` has no machine 7
    let (status, body) = post_request("/iot/ping", sealed(json!({"hello": true})), configure_no_devices).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("E003"), "unexpected body: {body}");
}

#[actix_web::test]
async fn wrong_secret_is_rejected() {
    let _ = env_logger::try_init().ok();
    let envelope = SecureEnvelope::seal(7, json!({"hello": true}), "some-other-secret");
    let body = serde_json::to_value(envelope).unwrap();
    let (status, body) = post_request("/iot/ping", body, configure_ping).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("E005"), "unexpected body: {body}");
}

#[actix_web::test]
async fn replayed_envelope_is_rejected_on_the_same_gate() {
    let _ = env_logger::try_init().ok();
    let registry = InMemoryRegistry::default().with_active_device(7, SECRET);
    let app = App::new().service(gated_scope(registry));
    let service = test::init_service(app).await;

    let envelope = sealed(json!({"hello": true}));
    let req = TestRequest::post().uri("/iot/ping").set_json(&envelope).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = TestRequest::post().uri("/iot/ping").set_json(&envelope).to_request();
    let res = test::try_call_service(&service, req).await;
    let err = res.expect_err("The replay should have been rejected");
    let res = err.error_response();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn dispense_complete_walks_the_order_to_completed() {
    let _ = env_logger::try_init().ok();
    let data = json!({"order_code": 555, "success": true, "reason": null});
    let (status, body) = post_request("/iot/dispense-complete", sealed(data), configure_dispense).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"Completed""#), "unexpected body: {body}");
}

#[actix_web::test]
async fn heartbeat_returns_a_session() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/iot/heartbeat", sealed(json!({})), configure_ping).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("session_id"), "unexpected body: {body}");
}

fn configure_ping(cfg: &mut ServiceConfig) {
    let registry = InMemoryRegistry::default().with_active_device(7, SECRET);
    let device_auth = DeviceAuthApi::new(registry.clone());
    cfg.service(gated_scope(registry)).app_data(web::Data::new(device_auth));
}

fn configure_no_devices(cfg: &mut ServiceConfig) {
    cfg.service(gated_scope(InMemoryRegistry::default()));
}

fn configure_dispense(cfg: &mut ServiceConfig) {
    let registry = InMemoryRegistry::default().with_active_device(7, SECRET);
    let mut store = MockOrderStore::new();
    // The callback arrives while the order is Paid: the coordinator walks it through
    // Dispensing and into Completed, one edge at a time
    let calls = Arc::new(AtomicUsize::new(0));
    store.expect_fetch_order_by_code().returning(move |_| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let status = if n == 0 { OrderStatusType::Paid } else { OrderStatusType::Dispensing };
        Ok(Some(order_in(status)))
    });
    store.expect_advance_order_status().returning(|_, target| Ok(Some(order_in(target))));
    store.expect_try_mark_stock_adjusted().returning(|_| Ok(true));
    store.expect_reduce_stock().returning(|_, _| {
        Ok(Some(Slot {
            id: 1,
            machine_id: 7,
            slot_code: "A1".to_string(),
            product_id: 10,
            stock: 4,
            updated_at: Utc::now(),
        }))
    });
    let api = OrderFlowApi::new(store, EventProducers::default());
    cfg.service(gated_scope(registry)).app_data(web::Data::new(api));
}
