use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use payos_tools::PayOsApi;
use vending_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    security::SecureRequestGate,
    DeviceAuthApi,
    OrderFlowApi,
    SqliteDatabase,
};

use crate::{config::ServerConfig, errors::ServerError, middleware::IotGateMiddlewareFactory, routes};

pub async fn run_server(config: ServerConfig, hooks: EventHooks) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(25, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let payos = PayOsApi::new(config.payos.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    // The gate is built once and cloned into every worker, so the nonce cache is shared across
    // the whole server rather than per worker.
    let gate = SecureRequestGate::new(db.clone(), config.replay);
    info!("💻️ Machine requests will be verified with a ±{}s timestamp window", config.replay.timestamp_tolerance_secs);
    let (use_x_forwarded_for, use_forwarded) = (config.use_x_forwarded_for, config.use_forwarded);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let device_auth_api = DeviceAuthApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("vps::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(device_auth_api))
            .app_data(web::Data::new(payos.clone()));
        // Every machine-facing route lives under /iot, behind the security gate
        let iot_scope = web::scope("/iot")
            .wrap(IotGateMiddlewareFactory::new(gate.clone(), use_x_forwarded_for, use_forwarded))
            .route("/ping", web::post().to(routes::iot_ping))
            .route("/dispense-complete", web::post().to(routes::iot_dispense_complete::<SqliteDatabase>))
            .route("/heartbeat", web::post().to(routes::iot_heartbeat::<SqliteDatabase>))
            .route("/stock-update", web::post().to(routes::iot_stock_update::<SqliteDatabase>))
            .route("/orders/pending", web::post().to(routes::iot_pending_orders::<SqliteDatabase>));
        app.service(routes::health)
            .service(iot_scope)
            .route("/orders", web::post().to(routes::create_order::<SqliteDatabase>))
            .route("/payment/status/{order_code}", web::get().to(routes::payment_status::<SqliteDatabase>))
            .route("/payment/webhook", web::post().to(routes::payment_webhook::<SqliteDatabase>))
            .route("/payment/confirm/{order_code}", web::post().to(routes::confirm_order::<SqliteDatabase>))
            .route("/payment/cancel/{order_code}", web::post().to(routes::cancel_order::<SqliteDatabase>))
            .route("/devices/register", web::post().to(routes::register_device::<SqliteDatabase>))
            .route("/devices/{machine_id}/revoke", web::post().to(routes::revoke_device::<SqliteDatabase>))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
