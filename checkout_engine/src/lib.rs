//! Marketplace Checkout Engine
//!
//! The checkout engine owns the parts of the marketplace where correctness actually matters: cart validation and
//! pricing, the order state machine with its stock reservations, the payment-transaction ledger, and the
//! reconciliation of asynchronous payment outcomes with orders and seller earnings.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access tables directly; use the public API instead. The exception is the data types, which are defined in
//!    [`db_types`] and are public.
//! 2. The engine public API ([`mod@api`]). [`OrderFlowApi`] drives checkout and the order lifecycle;
//!    [`ReconciliationApi`] applies payment outcomes exactly once. Backends implement the traits in [`mod@traits`].
//!
//! The engine also emits events (payment completed, order confirmed, order annulled) through a small actor-style
//! hook system in [`mod@events`], which is how receipt notifications are dispatched without coupling the engine to
//! an email service.
mod api;

pub mod db_types;
pub mod events;
pub mod pricing;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use api::{
    order_flow_api::{OrderFlowApi, OrderFlowError},
    order_objects,
    reconciliation_api::{
        ReconciliationApi,
        ReconciliationError,
        ReconciliationOutcome,
        AMOUNT_TOLERANCE,
        SUBSCRIPTION_VALIDITY_DAYS,
    },
};
