use std::fmt::Display;

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use futures::future::{err, ok, Ready};
use serde::{Deserialize, Serialize};
use vending_payment_engine::{db_types::OrderCode, security::AuthorizedRequest};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The storefront's request to start a sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderParams {
    pub order_code: OrderCode,
    pub machine_id: i64,
    pub product_id: i64,
    /// Price in VND.
    pub amount: i64,
    /// Shown on the hosted checkout page.
    pub description: Option<String>,
    pub product_name: Option<String>,
}

/// The machine's report on a dispense attempt, carried inside the signed envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispenseResult {
    pub order_code: OrderCode,
    pub success: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotLevel {
    pub slot_code: String,
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockUpdate {
    pub slots: Vec<SlotLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDeviceParams {
    pub machine_id: i64,
    pub firmware_version: Option<String>,
    pub location: Option<String>,
}

/// A request that has been cleared by the security gate. Extracting this in a handler is the only
/// way to get at a machine request's payload; the raw body never reaches handlers on gated routes.
#[derive(Debug, Clone)]
pub struct VerifiedDevice(pub AuthorizedRequest);

impl FromRequest for VerifiedDevice {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthorizedRequest>() {
            Some(auth) => ok(VerifiedDevice(auth.clone())),
            // A handler asked for a verified device on a route the gate does not cover. That is
            // a routing bug, and it fails closed.
            None => err(ServerError::Unspecified("Route is not covered by the security gate".to_string())),
        }
    }
}
