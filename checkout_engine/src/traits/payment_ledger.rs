use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{
    EarningEntry,
    NewPaymentTransaction,
    OrderId,
    PaymentTransaction,
    Reference,
    SellerEarning,
    Subscription,
    TransactionStatus,
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("No payment transaction exists for reference {0}")]
    TransactionNotFound(Reference),
    #[error("A payment transaction already exists for reference {0}")]
    DuplicateTransaction(Reference),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// Storage for payment transactions, keyed by the caller-generated `reference`.
///
/// The reference is unique by construction; a second insert with the same reference returns the existing row rather
/// than erroring, so charge initiation is itself idempotent.
#[allow(async_fn_in_trait)]
pub trait PaymentLedger: Clone {
    /// Inserts the transaction, or returns the existing row (second tuple element `false`) if the reference is
    /// already present.
    async fn insert_transaction(
        &self,
        transaction: NewPaymentTransaction,
    ) -> Result<(PaymentTransaction, bool), LedgerError>;

    async fn fetch_transaction_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<PaymentTransaction>, LedgerError>;

    /// Updates the status, returning the row as it was *before* the update so callers can detect transitions.
    async fn update_transaction_status(
        &self,
        reference: &Reference,
        status: TransactionStatus,
    ) -> Result<PaymentTransaction, LedgerError>;

    /// Records the provider-assigned identifier once initiation succeeds.
    async fn attach_gateway_reference(
        &self,
        reference: &Reference,
        gateway_reference: &str,
    ) -> Result<(), LedgerError>;
}

/// Seller commission lookups and the once-only earning insert.
#[allow(async_fn_in_trait)]
pub trait EarningsLedger: Clone {
    /// The seller's commission rate, or the flat fallback when no row exists for the seller.
    async fn commission_rate(&self, seller_id: &str) -> Result<f64, LedgerError>;

    /// Inserts one earning row per entry. Entries whose `order_item_id` already has an earning are skipped, which is
    /// what makes duplicate webhook delivery safe. Returns the number of rows actually inserted.
    async fn record_earnings(&self, entries: &[EarningEntry]) -> Result<u64, LedgerError>;

    async fn earnings_for_order(&self, order_id: &OrderId) -> Result<Vec<SellerEarning>, LedgerError>;
}

/// Activation of subscriptions linked to a payment reference.
#[allow(async_fn_in_trait)]
pub trait SubscriptionStore: Clone {
    /// Activates any subscription linked to the reference with the given validity window. Returns the activated
    /// subscriptions; an empty result means the payment was not for a subscription, which is not an error.
    async fn activate_for_reference(
        &self,
        reference: &Reference,
        valid_until: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, LedgerError>;
}
