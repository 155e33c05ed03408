use checkout_engine::{db_types::Order, events::EventProducers, OrderFlowApi, SqliteDatabase};
use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Orders that stay `Pending` longer than `unpaid_timeout` are cancelled and their stock reservations released, so
/// abandoned carts cannot hold inventory hostage.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    check_interval_seconds: u64,
    unpaid_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(check_interval_seconds));
        let api = OrderFlowApi::new(db, producers);
        info!("🕰️ Unpaid order expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running unpaid order expiry job");
            match api.expire_stale_orders(unpaid_timeout).await {
                Ok(expired) => {
                    if expired.is_empty() {
                        trace!("🕰️ No orders expired");
                    } else {
                        info!("🕰️ {} unpaid orders expired: {}", expired.len(), order_list(&expired));
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} buyer_id: {}", o.id, o.order_id, o.buyer_id))
        .collect::<Vec<String>>()
        .join(", ")
}
