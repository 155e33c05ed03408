//! # Checkout engine public API
//!
//! The `api` module exposes the programmatic API for the checkout engine. The API is modular so that clients can
//! pick the functionality they need; the server composes both APIs over a single SQLite backend, while tests supply
//! lightweight doubles.
//!
//! * [`order_flow_api`] owns the checkout pipeline and the order state machine: cart validation, pricing, atomic
//!   order creation with stock reservation, and the lifecycle transitions.
//! * [`reconciliation_api`] applies payment outcomes (from webhooks or status polls) to transactions, orders,
//!   earnings, and subscriptions, exactly once per outcome.
//!
//! The pattern for using the APIs is the same as everywhere else in this workspace: create an instance by supplying
//! a database backend that implements the traits the API needs.
//!
//! ```rust,ignore
//! use checkout_engine::{OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/marketplace.db", 25).await?;
//! let api = OrderFlowApi::new(db, producers);
//! let outcome = api.checkout(request).await?;
//! ```

pub mod order_flow_api;
pub mod order_objects;
pub mod reconciliation_api;
