//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the backend traits, so the endpoint tests can drive them with mock
//! backends. Actix cannot register generic handlers through the attribute macros, so everything
//! except `health` is registered explicitly in [`crate::server`].
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use payos_tools::{verify_webhook_signature, NewPaymentRequest, PayOsApi};
use serde::Deserialize;
use serde_json::json;
use vending_payment_engine::{
    db_types::{NewOrder, NewPaymentTransaction, OrderCode, PaymentSource},
    traits::{DeviceRegistry, StockAdjuster, VendingDatabase},
    DeviceAuthApi,
    OrderFlowApi,
    OrderSummary,
};
use vpg_common::Vnd;

use crate::{
    data_objects::{DispenseResult, JsonResponse, NewOrderParams, RegisterDeviceParams, StockUpdate, VerifiedDevice},
    errors::ServerError,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//--------------------------------------------   Storefront  ---------------------------------------------------

/// Creates a new order and, when the payment gateway is configured, a hosted checkout link for it.
///
/// Submitting the same order code twice returns the stored order rather than an error, so a
/// storefront retry never creates a second checkout link for a new sale.
pub async fn create_order<B: VendingDatabase + StockAdjuster>(
    params: web::Json<NewOrderParams>,
    api: web::Data<OrderFlowApi<B>>,
    payos: Option<web::Data<PayOsApi>>,
) -> Result<HttpResponse, ServerError> {
    let params = params.into_inner();
    let code = params.order_code;
    debug!("💻️📦️ New order request [{code}] for machine {}", params.machine_id);
    let mut order = NewOrder::new(code, params.machine_id, params.product_id, Vnd::from(params.amount));
    if let Some(payos) = payos {
        let description = params.description.unwrap_or_else(|| format!("Order {}", code.0));
        let mut request = NewPaymentRequest::new(code.0, order.amount, description);
        if let Some(name) = params.product_name {
            request.items[0].name = name;
        }
        let link = payos
            .create_payment_link(&request)
            .await
            .map_err(|e| ServerError::PaymentGatewayUnavailable(e.to_string()))?;
        order.payment_url = Some(link.checkout_url);
        order.qr_code = link.qr_code;
    }
    let (order, created) = api.process_new_order(order).await?;
    let summary = OrderSummary::from(&order);
    let response = if created { HttpResponse::Created().json(summary) } else { HttpResponse::Ok().json(summary) };
    Ok(response)
}

/// Returns the order's current state, polling the payment gateway first if the order is still
/// waiting on payment. This is the poll trigger: a customer refreshing the checkout page drives
/// reconciliation even if the webhook never arrives.
pub async fn payment_status<B: VendingDatabase + StockAdjuster>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
    payos: Option<web::Data<PayOsApi>>,
) -> Result<HttpResponse, ServerError> {
    let code = OrderCode(path.into_inner());
    let order = api.fetch_order(&code).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Order {code}")))?;
    let order = match (order.status.is_terminal(), payos) {
        (false, Some(payos)) => match payos.get_payment_status(code.0).await {
            Ok(status) if status.is_paid() => api.confirm_payment(&code, PaymentSource::Poll).await?,
            Ok(_) => order,
            Err(e) => {
                // The poll is best-effort. The webhook or a later poll will catch the payment.
                warn!("💻️🔍️ Could not poll gateway for order [{code}]: {e}");
                order
            },
        },
        _ => order,
    };
    Ok(HttpResponse::Ok().json(OrderSummary::from(&order)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayOsWebhookEvent {
    pub code: String,
    #[serde(default)]
    pub desc: Option<String>,
    pub data: serde_json::Value,
    pub signature: String,
}

/// The payment gateway's webhook. The signature is checked against the checksum key before
/// anything in the payload is trusted; duplicate deliveries collapse into no-ops downstream.
pub async fn payment_webhook<B: VendingDatabase + StockAdjuster>(
    event: web::Json<PayOsWebhookEvent>,
    api: web::Data<OrderFlowApi<B>>,
    payos: web::Data<PayOsApi>,
) -> Result<HttpResponse, ServerError> {
    let event = event.into_inner();
    if !verify_webhook_signature(payos.checksum_key(), &event.data, &event.signature) {
        warn!("💻️💰️ Webhook with an invalid signature was rejected");
        return Ok(HttpResponse::Forbidden().json(JsonResponse::failure("Invalid signature")));
    }
    if event.code != "00" {
        info!("💻️💰️ Gateway reported an unsuccessful payment event: {}", event.desc.as_deref().unwrap_or("-"));
        return Ok(HttpResponse::Ok().json(JsonResponse::success("Acknowledged")));
    }
    let order_code = event.data.get("orderCode").and_then(|v| v.as_i64()).ok_or_else(|| {
        warn!("💻️💰️ Webhook payload is missing the order code");
        ServerError::InvalidRequestBody("Missing orderCode".to_string())
    })?;
    let amount = event.data.get("amount").and_then(|v| v.as_i64()).unwrap_or_default();
    let reference = event.data.get("reference").and_then(|v| v.as_str()).map(String::from);
    let tx = NewPaymentTransaction {
        order_code: OrderCode(order_code),
        amount: Vnd::from(amount),
        source: PaymentSource::Webhook,
        reference,
    };
    let (order, _) = api.settle_gateway_payment(tx, PaymentSource::Webhook).await?;
    debug!("💻️💰️ Webhook settled. Order [{}] is {}", order.order_code, order.status);
    Ok(HttpResponse::Ok().json(JsonResponse::success("OK")))
}

/// Staff override: mark the order as paid without the gateway's say-so.
pub async fn confirm_order<B: VendingDatabase + StockAdjuster>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = OrderCode(path.into_inner());
    info!("💻️✅️ Manual payment confirmation for order [{code}]");
    let order = api.confirm_payment(&code, PaymentSource::Manual).await?;
    Ok(HttpResponse::Ok().json(OrderSummary::from(&order)))
}

/// Cancels a pending order and, best-effort, its checkout link.
pub async fn cancel_order<B: VendingDatabase + StockAdjuster>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
    payos: Option<web::Data<PayOsApi>>,
) -> Result<HttpResponse, ServerError> {
    let code = OrderCode(path.into_inner());
    let order = api.cancel_order(&code).await?;
    if let Some(payos) = payos {
        if let Err(e) = payos.cancel_payment(code.0).await {
            warn!("💻️❌️ Could not cancel the checkout link for order [{code}]: {e}");
        }
    }
    Ok(HttpResponse::Ok().json(OrderSummary::from(&order)))
}

//--------------------------------------------   Machines  -----------------------------------------------------
// Everything below runs behind the security gate; `VerifiedDevice` carries the payload the
// machine actually signed.

pub async fn iot_ping(device: VerifiedDevice) -> Result<HttpResponse, ServerError> {
    trace!("💻️🤖️ Ping from machine {}", device.0.machine_id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "machine_id": device.0.machine_id })))
}

/// The machine's dispense-complete callback.
pub async fn iot_dispense_complete<B: VendingDatabase + StockAdjuster>(
    device: VerifiedDevice,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let result: DispenseResult =
        serde_json::from_value(device.0.data).map_err(|_| ServerError::CouldNotDeserializePayload)?;
    debug!(
        "💻️🤖️ Machine {} reports dispense for order [{}]: success={}",
        device.0.machine_id, result.order_code, result.success
    );
    let order = api.dispense_completed(&result.order_code, result.success, result.reason).await?;
    Ok(HttpResponse::Ok().json(OrderSummary::from(&order)))
}

/// Keeps the machine's session alive.
pub async fn iot_heartbeat<B: DeviceRegistry>(
    device: VerifiedDevice,
    auth: web::Data<DeviceAuthApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let session = auth.heartbeat(device.0.machine_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "session_id": session.session_id,
        "expires_at": session.expires_at,
    })))
}

/// The machine reports its physical stock levels after a restock or an audit.
pub async fn iot_stock_update<B: VendingDatabase + StockAdjuster>(
    device: VerifiedDevice,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let machine_id = device.0.machine_id;
    let update: StockUpdate =
        serde_json::from_value(device.0.data).map_err(|_| ServerError::CouldNotDeserializePayload)?;
    let mut updated = 0usize;
    for level in &update.slots {
        match api.db().set_slot_stock(machine_id, &level.slot_code, level.stock).await? {
            Some(_) => updated += 1,
            None => warn!("💻️🤖️ Machine {machine_id} reported stock for unknown slot {}", level.slot_code),
        }
    }
    debug!("💻️🤖️ Stock update from machine {machine_id}: {updated}/{} slots", update.slots.len());
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{updated} slots updated"))))
}

/// Orders the machine still owes a product for.
pub async fn iot_pending_orders<B: VendingDatabase + StockAdjuster>(
    device: VerifiedDevice,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let orders = api.fetch_paid_orders(device.0.machine_id).await?;
    let summaries = orders.iter().map(OrderSummary::from).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(summaries))
}

//--------------------------------------------   Provisioning  -------------------------------------------------
// Staff-side endpoints. These sit outside the gate: a factory-fresh machine has no secret to
// sign with yet, and revocation must work even when the machine is hostile.

/// Provisions a machine, or rotates its secret. The response is the only place the shared secret
/// ever appears in plaintext.
pub async fn register_device<B: DeviceRegistry>(
    params: web::Json<RegisterDeviceParams>,
    auth: web::Data<DeviceAuthApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = params.into_inner();
    let device = auth.register_device(params.machine_id, params.firmware_version, params.location).await?;
    Ok(HttpResponse::Created().json(json!({
        "machine_id": device.machine_id,
        "shared_secret": device.shared_secret,
    })))
}

pub async fn revoke_device<B: DeviceRegistry>(
    path: web::Path<i64>,
    auth: web::Data<DeviceAuthApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let machine_id = path.into_inner();
    let device = auth.revoke_device(machine_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Machine {} revoked", device.machine_id))))
}
