//! The traits a storage backend must implement to drive the vending payment engine.
//!
//! The engine's public APIs are generic over these traits, so alternative backends (or mocks in
//! endpoint tests) can stand in for the bundled SQLite implementation.

mod device_registry;
mod stock_adjuster;
mod vending_database;

pub use device_registry::{DeviceAuthApiError, DeviceRegistry};
pub use stock_adjuster::StockAdjuster;
pub use vending_database::{PaymentGatewayError, VendingDatabase};
