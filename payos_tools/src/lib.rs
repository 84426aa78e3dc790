mod api;
mod config;
mod error;
mod helpers;

mod data_objects;

pub use api::PayOsApi;
pub use config::PayOsConfig;
pub use data_objects::{NewPaymentRequest, PaymentItem, PaymentLink, PaymentStatus, PAYOS_STATUS_PAID};
pub use error::PayOsApiError;
pub use helpers::{hmac_sha256_hex, sign_request_fields, verify_webhook_signature};
