//! Background status polling for in-flight charges.
//!
//! Webhooks are the primary settlement signal, but providers drop them. After a charge is initiated, a poller asks
//! the provider for the status on a fixed cadence until the charge settles or the attempt budget runs out. Every
//! status change funnels through the same reconciliation path as the webhook, so the two signals can race safely.

use actix_web::web;
use checkout_engine::db_types::{PaymentTransaction, Reference};
use log::*;
use momo_gateway::PaymentProvider;

use crate::payments::{MarketplaceBackend, PaymentApi};

/// The polling cadence, shared with handlers through app data.
#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    pub attempts: u32,
    pub interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The charge reached a terminal status within the attempt budget.
    Settled(PaymentTransaction),
    /// The attempt budget ran out with the charge still in flight. The webhook remains the settlement path.
    StillProcessing,
}

/// Polls the provider until `reference` settles or `settings.attempts` polls have been made. Provider errors are
/// logged and the poll continues; a transient outage should not burn the budget's worth of information.
pub async fn poll_payment_status<B, U, H>(
    api: &PaymentApi<B, U, H>,
    reference: &Reference,
    settings: PollerSettings,
) -> PollOutcome
where
    B: MarketplaceBackend,
    U: PaymentProvider,
    H: PaymentProvider,
{
    let mut timer = tokio::time::interval(std::time::Duration::from_secs(settings.interval_seconds));
    // The first tick of an interval fires immediately.
    timer.tick().await;
    for attempt in 1..=settings.attempts {
        timer.tick().await;
        trace!("💳️ Poll {attempt}/{} for {reference}", settings.attempts);
        match api.check_status(reference).await {
            Ok((transaction, _)) => {
                if transaction.status.is_terminal() {
                    info!("💳️ Payment {reference} settled as {} after {attempt} poll(s)", transaction.status);
                    return PollOutcome::Settled(transaction);
                }
            },
            Err(e) => {
                warn!("💳️ Poll {attempt} for {reference} failed: {e}");
            },
        }
    }
    info!("💳️ Payment {reference} still in flight after {} polls. Leaving it to the webhook", settings.attempts);
    PollOutcome::StillProcessing
}

/// Fire-and-forget wrapper around [`poll_payment_status`] for use inside handlers. Runs on the worker's local task
/// set, so the future does not need to be `Send`.
pub fn spawn_status_poller<B, U, H>(
    api: web::Data<PaymentApi<B, U, H>>,
    reference: Reference,
    settings: PollerSettings,
) where
    B: MarketplaceBackend,
    U: PaymentProvider + 'static,
    H: PaymentProvider + 'static,
{
    actix_web::rt::spawn(async move {
        let _ = poll_payment_status(api.as_ref(), &reference, settings).await;
    });
}
