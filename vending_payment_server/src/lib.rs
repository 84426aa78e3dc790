//! # VPG server
//! This module hosts the HTTP front-end for the vending payment gateway. It is responsible for:
//! * Listening for payment webhooks from PayOS and reconciling them against the order ledger.
//! * Serving the storefront: creating orders with hosted checkout links, and reporting payment
//!   status (which doubles as the gateway poll).
//! * Listening for signed requests from vending machines (dispense callbacks, heartbeats, stock
//!   reports) behind the security gate middleware.
//! * Provisioning and revoking machine identities.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/orders`, `/payment/*`: the storefront and gateway surface.
//! * `/iot/*`: the machine surface. Every route here is wrapped by the security gate.
//! * `/devices/*`: staff provisioning.

pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
