//! # Marketplace server
//!
//! The HTTP surface over the checkout engine and the mobile-money gateway. It is responsible for:
//! * the checkout and order routes,
//! * dispatching payment initiations and status checks to the configured providers,
//! * receiving payment webhooks, verifying their HMAC signature, and feeding them into reconciliation,
//! * the background workers (status poller, stale-order expiry).
//!
//! ## Configuration
//! The server is configured via `MKT_*` environment variables. See [config] for the full list.

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod middleware;
pub mod payments;
pub mod poller;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
