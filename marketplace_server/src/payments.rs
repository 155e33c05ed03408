//! Glue between the payment providers and the transaction ledger.
//!
//! The transaction row is persisted (in `Pending`) before the provider is called, so the webhook always finds its
//! anchor row no matter how quickly the provider reports back. The provider's own id is attached afterwards as the
//! `gateway_reference`, which is what status polls query by.

use checkout_engine::{
    db_types::{NewPaymentTransaction, OrderId, PaymentTransaction, Reference, TransactionStatus},
    traits::{CheckoutDatabase, EarningsLedger, PaymentLedger, ProductCatalog, SubscriptionStore},
    ReconciliationApi,
    ReconciliationOutcome,
};
use log::*;
use mkt_common::Money;
use momo_gateway::{ChargeRequest, ChargeResponse, EmailAddress, Network, PaymentProvider, PaymentStatus, PhoneNumber};

use crate::errors::ServerError;

/// A backend that can hold up the entire order and payment flow: catalog reads, order writes, ledger writes, and the
/// reconciliation side effects.
pub trait MarketplaceBackend:
    CheckoutDatabase + ProductCatalog + PaymentLedger + EarningsLedger + SubscriptionStore + Clone + Send + Sync + 'static
{
}

impl<T> MarketplaceBackend for T where
    T: CheckoutDatabase + ProductCatalog + PaymentLedger + EarningsLedger + SubscriptionStore + Clone + Send + Sync + 'static
{
}

pub struct PaymentApi<B, U, H> {
    db: B,
    ussd: U,
    hosted: H,
    reconciliation: ReconciliationApi<B>,
}

impl<B, U, H> PaymentApi<B, U, H>
where
    B: MarketplaceBackend,
    U: PaymentProvider,
    H: PaymentProvider,
{
    pub fn new(db: B, ussd: U, hosted: H, reconciliation: ReconciliationApi<B>) -> Self {
        Self { db, ussd, hosted, reconciliation }
    }

    /// Initiates a USSD push charge. The ledger row exists before the provider is called and carries the provider's
    /// transaction id before this returns.
    pub async fn initiate_ussd(
        &self,
        user_id: &str,
        amount: Money,
        phone_number: PhoneNumber,
        network: Network,
        reference: &Reference,
        description: &str,
        order_id: Option<OrderId>,
    ) -> Result<(PaymentTransaction, ChargeResponse), ServerError> {
        let charge = ChargeRequest::ussd(amount, phone_number.clone(), network, reference.as_str(), description);
        let mut new_transaction = NewPaymentTransaction::new(user_id.to_string(), amount, reference.clone())
            .via_network(network.to_string(), phone_number.to_string());
        if let Some(order_id) = order_id {
            new_transaction = new_transaction.for_order(order_id);
        }
        self.dispatch(&self.ussd, charge, new_transaction, reference).await
    }

    /// Creates a hosted checkout session. The returned response carries the `payment_url` for the redirect.
    pub async fn create_hosted_checkout(
        &self,
        user_id: &str,
        amount: Money,
        email: EmailAddress,
        reference: &Reference,
        description: &str,
        order_id: Option<OrderId>,
    ) -> Result<(PaymentTransaction, ChargeResponse), ServerError> {
        let charge = ChargeRequest::hosted(amount, email, reference.as_str(), description);
        let mut new_transaction = NewPaymentTransaction::new(user_id.to_string(), amount, reference.clone());
        if let Some(order_id) = order_id {
            new_transaction = new_transaction.for_order(order_id);
        }
        self.dispatch(&self.hosted, charge, new_transaction, reference).await
    }

    async fn dispatch<P: PaymentProvider>(
        &self,
        provider: &P,
        charge: ChargeRequest,
        new_transaction: NewPaymentTransaction,
        reference: &Reference,
    ) -> Result<(PaymentTransaction, ChargeResponse), ServerError> {
        let (transaction, fresh) = self.db.insert_transaction(new_transaction).await?;
        if !fresh {
            debug!("💻️ Reusing existing transaction for reference {reference}");
        }
        let response = match provider.initiate(&charge).await {
            Ok(response) => response,
            Err(e) => {
                if !e.is_retryable() {
                    // A charge that can never go through should not linger as pending.
                    if let Err(e) = self.db.update_transaction_status(reference, TransactionStatus::Failed).await {
                        error!("💻️ Could not mark transaction {reference} as failed: {e}");
                    }
                }
                return Err(e.into());
            },
        };
        self.db.attach_gateway_reference(reference, &response.transaction_id).await?;
        let status = map_provider_status(response.status);
        let outcome = self.reconciliation.apply_payment_outcome(reference, status, None).await?;
        let transaction = match outcome {
            ReconciliationOutcome::AlreadyCompleted(tx) |
            ReconciliationOutcome::StatusRecorded(tx) |
            ReconciliationOutcome::Applied { transaction: tx, .. } => tx,
        };
        info!("💻️ Payment {reference} initiated: provider tx {} ({})", response.transaction_id, transaction.status);
        Ok((transaction, response))
    }

    /// Polls the provider for the current status of `reference` and applies any change through the same
    /// reconciliation path the webhook uses.
    pub async fn check_status(
        &self,
        reference: &Reference,
    ) -> Result<(PaymentTransaction, Option<ReconciliationOutcome>), ServerError> {
        let transaction = self
            .db
            .fetch_transaction_by_reference(reference)
            .await?
            .ok_or_else(|| ServerError::NoRecordFound(format!("No transaction for reference {reference}")))?;
        if transaction.status.is_terminal() {
            return Ok((transaction, None));
        }
        let gateway_reference = transaction.gateway_reference.clone().ok_or_else(|| {
            ServerError::Conflict(format!("Transaction {reference} has no gateway reference to poll"))
        })?;
        // USSD transactions carry the payer's network; hosted sessions do not.
        let provider_status = if transaction.network.is_some() {
            self.ussd.check_status(&gateway_reference).await?
        } else {
            self.hosted.check_status(&gateway_reference).await?
        };
        let status = map_provider_status(provider_status);
        if status == transaction.status {
            trace!("💻️ Status of {reference} is unchanged ({status})");
            return Ok((transaction, None));
        }
        let outcome = self.reconciliation.apply_payment_outcome(reference, status, None).await?;
        let transaction = match &outcome {
            ReconciliationOutcome::AlreadyCompleted(tx) |
            ReconciliationOutcome::StatusRecorded(tx) |
            ReconciliationOutcome::Applied { transaction: tx, .. } => tx.clone(),
        };
        Ok((transaction, Some(outcome)))
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// The adapter's three-state vocabulary widened to the ledger's. A provider acknowledging a charge means the payer
/// is being prompted, which the ledger records as `Processing`.
pub fn map_provider_status(status: PaymentStatus) -> TransactionStatus {
    match status {
        PaymentStatus::Pending => TransactionStatus::Processing,
        PaymentStatus::Completed => TransactionStatus::Completed,
        PaymentStatus::Failed => TransactionStatus::Failed,
    }
}
