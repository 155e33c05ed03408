use std::fmt::Debug;

use chrono::Duration;
use log::*;
use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderId, OrderStatus},
    events::{EventProducers, OrderAnnulledEvent, OrderConfirmedEvent},
    order_objects::{CheckoutOutcome, CheckoutRejection, CheckoutRequest, OrderQueryFilter},
    pricing::{price_order, validate_cart, verify_product_prices, PricingConfig},
    traits::{CheckoutDatabase, CheckoutError, ProductCatalog},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    /// The cart failed validation or price verification. Carries every problem found, not just the first.
    #[error("Checkout rejected: {} cart error(s), {} price mismatch(es)", .0.cart_errors.len(), .0.price_mismatches.len())]
    Rejected(CheckoutRejection),
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

/// `OrderFlowApi` is the primary API for the checkout pipeline and the order state machine.
///
/// A checkout request flows through cart validation and price verification against the authoritative catalog,
/// server-side pricing, and atomic order creation with stock reservation. Lifecycle transitions (confirm, cancel,
/// fulfilment) go through here too so every mutation publishes its event.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    pricing: PricingConfig,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, pricing: PricingConfig::default() }
    }

    pub fn with_pricing_config(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }
}

impl<B> OrderFlowApi<B>
where B: CheckoutDatabase + ProductCatalog
{
    /// Runs the full checkout pipeline for a cart.
    ///
    /// Validation and price verification both run to completion before anything is rejected, so a rejection carries
    /// the complete list of problems. Totals are always computed from catalog prices; the client-supplied prices are
    /// only compared, never summed. On success the order is created in `Pending` with a stock reservation for every
    /// item, all-or-nothing.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutOutcome, OrderFlowError> {
        if request.buyer_id.trim().is_empty() {
            return Err(CheckoutError::BuyerMissing.into());
        }
        let ids: Vec<_> = request.items.iter().map(|i| i.product_id.clone()).collect();
        let catalog = self.db.catalog_snapshot(&ids).await?;
        let validation = validate_cart(&request.items, &catalog);
        let price_check = verify_product_prices(&request.items, &catalog);
        let rejection =
            CheckoutRejection { cart_errors: validation.errors, price_mismatches: price_check.mismatches };
        if !rejection.is_empty() {
            info!(
                "🛒️ Checkout rejected for buyer {}: {} cart error(s), {} price mismatch(es)",
                request.buyer_id,
                rejection.cart_errors.len(),
                rejection.price_mismatches.len()
            );
            return Err(OrderFlowError::Rejected(rejection));
        }
        let pricing =
            price_order(&request.items, &catalog, &request.region, request.coupon_code.as_deref(), &self.pricing);
        let mut items = Vec::with_capacity(request.items.len());
        for item in &request.items {
            // validate_cart has already established that every product exists in the snapshot.
            let product = catalog.product(&item.product_id).ok_or_else(|| {
                CheckoutError::DatabaseError(format!("Product {} vanished from the catalog snapshot", item.product_id))
            })?;
            items.push(NewOrderItem {
                product_id: item.product_id.clone(),
                seller_id: product.seller_id.clone(),
                quantity: item.quantity,
                unit_price: product.price,
            });
        }
        let order_id = new_order_id();
        let mut order = NewOrder::new(order_id, request.buyer_id, items);
        order.subtotal = pricing.subtotal;
        order.tax = pricing.tax;
        order.shipping = pricing.shipping;
        order.discount = pricing.discount;
        order.total = pricing.total;
        let order = self.db.create_order(order).await?;
        info!("🛒️ Order {} created for buyer {} with total {}", order.order_id, order.buyer_id, order.total);
        Ok(CheckoutOutcome { order, pricing })
    }

    /// Converts the order's reservation into a permanent stock deduction. Only legal from `Pending`.
    pub async fn confirm_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self.db.confirm_order(order_id).await?;
        self.publish_confirmed(&order).await;
        Ok(order)
    }

    /// Cancels the order, releasing its reservation (or returning its deduction). Only legal from `Pending` or
    /// `Confirmed`; any other state produces an error naming the current status.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self.db.cancel_order(order_id).await?;
        self.publish_annulled(&order).await;
        Ok(order)
    }

    /// Marks a pending order's payment as failed. Distinct from cancellation: the reservation stays in place until
    /// it is explicitly released or the order is cancelled.
    pub async fn mark_payment_failed(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self.db.mark_payment_failed(order_id).await?;
        self.publish_annulled(&order).await;
        Ok(order)
    }

    /// Walks the fulfilment edges `Confirmed → Processing → Shipped → Delivered`.
    pub async fn advance_fulfilment(&self, order_id: &OrderId, to: OrderStatus) -> Result<Order, OrderFlowError> {
        let order = self.db.advance_fulfilment(order_id, to).await?;
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        Ok(self.db.fetch_order(order_id).await?)
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        Ok(self.db.search_orders(query).await?)
    }

    /// Cancels pending orders that have sat unpaid for longer than `limit`, releasing their stock. Used by the
    /// expiry worker.
    pub async fn expire_stale_orders(&self, limit: Duration) -> Result<Vec<Order>, OrderFlowError> {
        let expired = self.db.expire_stale_orders(limit).await?;
        for order in &expired {
            self.publish_annulled(order).await;
        }
        Ok(expired)
    }

    async fn publish_confirmed(&self, order: &Order) {
        for producer in &self.producers.order_confirmed_producer {
            let event = OrderConfirmedEvent::new(order.clone(), Vec::new());
            producer.publish_event(event).await;
        }
    }

    async fn publish_annulled(&self, order: &Order) {
        for producer in &self.producers.order_annulled_producer {
            let event = OrderAnnulledEvent::new(order.clone());
            producer.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// Generates a fresh order id. Collisions are caught by the unique index on `orders.order_id`.
fn new_order_id() -> OrderId {
    OrderId(format!("ord-{:016x}", rand::random::<u64>()))
}
