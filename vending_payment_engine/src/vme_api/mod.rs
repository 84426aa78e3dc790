//! The engine's public APIs. Servers hold these; nothing here knows about HTTP.

mod device_auth_api;
mod order_flow_api;
mod order_objects;

pub use device_auth_api::{DeviceAuthApi, DEFAULT_SESSION_TTL_SECONDS};
pub use order_flow_api::OrderFlowApi;
pub use order_objects::OrderSummary;
