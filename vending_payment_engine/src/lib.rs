//! Vending Payment Engine
//!
//! The engine holds the core logic of the vending payment gateway: the order lifecycle and the
//! security checks applied to requests from vending machines. It is HTTP-framework agnostic.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the bundled backend. You should
//!    never need to access the database directly; use the public API instead. The exception is
//!    the data types used in the database, defined in [`mod@db_types`], which are public.
//! 2. The engine public API ([`mod@vme_api`]). [`OrderFlowApi`] drives orders through their
//!    lifecycle and owns the exactly-once stock decrement; [`DeviceAuthApi`] handles machine
//!    provisioning and sessions. Backends implement the traits in [`mod@traits`] to plug in.
//! 3. Request security ([`mod@security`]). [`security::SecureRequestGate`] verifies the signed
//!    envelope every machine request arrives in, and fails closed.
//!
//! The engine also emits events when orders change state. A simple actor framework lets you hook
//! into these and perform custom actions, such as pushing live updates to a storefront.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod security;
pub mod traits;
mod vme_api;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use vme_api::{DeviceAuthApi, OrderFlowApi, OrderSummary, DEFAULT_SESSION_TTL_SECONDS};
