//! Interface contracts for checkout-engine database backends.
//!
//! The engine's public APIs ([`OrderFlowApi`](crate::OrderFlowApi), [`ReconciliationApi`](crate::ReconciliationApi))
//! are generic over these traits so that the server can run against SQLite in production and against lightweight
//! test doubles in endpoint tests.
//!
//! * [`ProductCatalog`]: read access to products and stock positions.
//! * [`CheckoutDatabase`]: order lifecycle and stock reservation. This is where the atomic conditional reservation
//!   lives; see the trait docs for the contract.
//! * [`PaymentLedger`]: payment-transaction rows keyed by the caller-generated reference.
//! * [`EarningsLedger`]: seller commission lookups and once-only earning inserts.
//! * [`SubscriptionStore`]: activation of subscriptions linked to a payment reference.

mod checkout_database;
mod payment_ledger;
mod product_catalog;

pub use checkout_database::{CheckoutDatabase, CheckoutError};
pub use payment_ledger::{EarningsLedger, LedgerError, PaymentLedger, SubscriptionStore};
pub use product_catalog::ProductCatalog;
