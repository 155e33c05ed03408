use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use mkt_common::Money;
use thiserror::Error;

use crate::{
    db_types::{EarningEntry, Order, OrderId, PaymentTransaction, Reference, TransactionStatus},
    events::{EventProducers, OrderAnnulledEvent, OrderConfirmedEvent, PaymentCompletedEvent},
    traits::{CheckoutDatabase, CheckoutError, EarningsLedger, LedgerError, PaymentLedger, SubscriptionStore},
};

/// Absolute tolerance, in minor units, when comparing a webhook's reported amount against the stored transaction
/// amount. One whole currency unit absorbs float conversion and provider-side rounding; anything larger is treated
/// as a forged or misdirected webhook.
pub const AMOUNT_TOLERANCE: i64 = 100;

/// Validity window granted to a subscription when its payment completes.
pub const SUBSCRIPTION_VALIDITY_DAYS: i64 = 30;

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    /// The reference does not correspond to any stored transaction. Never silently accepted: an unknown reference is
    /// either a provider bug or a probe.
    #[error("No payment transaction exists for reference {0}")]
    UnknownReference(Reference),
    /// The reported amount disagrees with the stored amount beyond tolerance. Security-relevant; logged at error
    /// severity and never auto-corrected.
    #[error("Amount mismatch for {reference}: stored {expected}, webhook reported {reported}")]
    AmountMismatch { reference: Reference, expected: Money, reported: Money },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

/// What a reconciliation pass did.
#[derive(Debug, Clone)]
pub enum ReconciliationOutcome {
    /// The stored transaction was already `Completed`; nothing was reapplied. This is the idempotency gate that
    /// makes at-least-once webhook delivery safe.
    AlreadyCompleted(PaymentTransaction),
    /// The status was recorded but is not terminal, so no side effects fired.
    StatusRecorded(PaymentTransaction),
    /// A terminal status was applied, with its side effects.
    Applied { transaction: PaymentTransaction, order: Option<Order> },
}

/// `ReconciliationApi` applies payment outcomes to the rest of the system, exactly once per outcome.
///
/// Both delivery paths (webhook push and status polling) funnel through [`Self::apply_payment_outcome`], so they
/// converge on identical side effects regardless of which one observes the terminal status first, or whether both
/// do.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> ReconciliationApi<B>
where B: CheckoutDatabase + PaymentLedger + EarningsLedger + SubscriptionStore
{
    /// Applies a payment outcome for the transaction identified by `reference`.
    ///
    /// Hard gates, in order: the reference must exist; the reported amount (when present) must match the stored
    /// amount within [`AMOUNT_TOLERANCE`]; an already-`Completed` transaction short-circuits to
    /// [`ReconciliationOutcome::AlreadyCompleted`] without touching anything.
    ///
    /// Once the gates pass, the status is persisted and, only on the transition to `Completed`, the side effects
    /// run: receipt event, subscription activation, order confirmation and seller-earning inserts. Each side effect
    /// is individually best-effort: a failure is logged and the others still run, because failing the webhook
    /// response for an already-recorded status change would only provoke provider retries of work that cannot be
    /// rolled back.
    pub async fn apply_payment_outcome(
        &self,
        reference: &Reference,
        status: TransactionStatus,
        reported_amount: Option<Money>,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let transaction = self
            .db
            .fetch_transaction_by_reference(reference)
            .await?
            .ok_or_else(|| ReconciliationError::UnknownReference(reference.clone()))?;
        if let Some(reported) = reported_amount {
            if transaction.amount.abs_diff(reported) > AMOUNT_TOLERANCE {
                error!(
                    "🔁️ Amount mismatch on {reference}: stored {} but webhook reported {reported}. Rejecting.",
                    transaction.amount
                );
                return Err(ReconciliationError::AmountMismatch {
                    reference: reference.clone(),
                    expected: transaction.amount,
                    reported,
                });
            }
        }
        if transaction.status == TransactionStatus::Completed {
            debug!("🔁️ Transaction {reference} is already completed. Redelivery ignored.");
            return Ok(ReconciliationOutcome::AlreadyCompleted(transaction));
        }
        self.db.update_transaction_status(reference, status).await?;
        let transaction = self
            .db
            .fetch_transaction_by_reference(reference)
            .await?
            .ok_or_else(|| ReconciliationError::UnknownReference(reference.clone()))?;
        match status {
            TransactionStatus::Completed => {
                let order = self.apply_completion(&transaction).await;
                Ok(ReconciliationOutcome::Applied { transaction, order })
            },
            TransactionStatus::Failed | TransactionStatus::Cancelled => {
                let order = self.apply_failure(&transaction).await;
                Ok(ReconciliationOutcome::Applied { transaction, order })
            },
            _ => {
                trace!("🔁️ Non-terminal status {status} recorded for {reference}");
                Ok(ReconciliationOutcome::StatusRecorded(transaction))
            },
        }
    }

    /// Side effects of a completed payment. Never fails; each effect logs its own trouble.
    async fn apply_completion(&self, transaction: &PaymentTransaction) -> Option<Order> {
        let reference = &transaction.reference;
        let valid_until = Utc::now() + Duration::days(SUBSCRIPTION_VALIDITY_DAYS);
        match self.db.activate_for_reference(reference, valid_until).await {
            Ok(subs) if !subs.is_empty() => {
                info!("🔁️ Activated {} subscription(s) for {reference} until {valid_until}", subs.len());
            },
            Ok(_) => {},
            Err(e) => error!("🔁️ Subscription activation for {reference} failed: {e}"),
        }
        let order = match &transaction.order_id {
            Some(order_id) => self.confirm_and_credit(order_id).await,
            None => None,
        };
        for producer in &self.producers.payment_completed_producer {
            let event = PaymentCompletedEvent::new(transaction.clone(), order.clone());
            producer.publish_event(event).await;
        }
        order
    }

    /// Confirms the order and records one earning per order item. Already-confirmed orders are treated as done (a
    /// poll racing a webhook), and earning inserts are once-only at the storage layer, so running this twice cannot
    /// double-credit a seller.
    async fn confirm_and_credit(&self, order_id: &OrderId) -> Option<Order> {
        let order = match self.db.confirm_order(order_id).await {
            Ok(order) => Some(order),
            Err(CheckoutError::IllegalTransition { from, .. }) => {
                warn!("🔁️ Order {order_id} is in state {from}; leaving it as-is");
                self.db.fetch_order(order_id).await.ok().flatten()
            },
            Err(e) => {
                error!("🔁️ Could not confirm order {order_id}: {e}");
                None
            },
        };
        let items = match self.db.fetch_order_items(order_id).await {
            Ok(items) => items,
            Err(e) => {
                error!("🔁️ Could not fetch items for {order_id}: {e}");
                return order;
            },
        };
        let mut entries = Vec::with_capacity(items.len());
        for item in &items {
            let rate = match self.db.commission_rate(&item.seller_id).await {
                Ok(rate) => rate,
                Err(e) => {
                    error!("🔁️ Commission lookup for seller {} failed: {e}. Using fallback.", item.seller_id);
                    crate::pricing::DEFAULT_COMMISSION_RATE
                },
            };
            entries.push(EarningEntry::from_item(item, rate));
        }
        match self.db.record_earnings(&entries).await {
            Ok(inserted) => debug!("🔁️ {inserted} earning record(s) created for {order_id}"),
            Err(e) => error!("🔁️ Recording earnings for {order_id} failed: {e}"),
        }
        if let Some(order) = &order {
            let earnings = self.db.earnings_for_order(order_id).await.unwrap_or_default();
            for producer in &self.producers.order_confirmed_producer {
                let event = OrderConfirmedEvent::new(order.clone(), earnings.clone());
                producer.publish_event(event).await;
            }
        }
        order
    }

    /// Side effects of a failed or cancelled payment: the order is marked `PaymentFailed` rather than `Cancelled`; the
    /// stock reservation stays in place until the normal cancel path (or the expiry worker) releases it.
    async fn apply_failure(&self, transaction: &PaymentTransaction) -> Option<Order> {
        let order_id = transaction.order_id.as_ref()?;
        match self.db.mark_payment_failed(order_id).await {
            Ok(order) => {
                for producer in &self.producers.order_annulled_producer {
                    producer.publish_event(OrderAnnulledEvent::new(order.clone())).await;
                }
                Some(order)
            },
            Err(CheckoutError::IllegalTransition { from, .. }) => {
                warn!("🔁️ Payment failure for {order_id} ignored; order is in state {from}");
                None
            },
            Err(e) => {
                error!("🔁️ Could not mark {order_id} as payment-failed: {e}");
                None
            },
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
