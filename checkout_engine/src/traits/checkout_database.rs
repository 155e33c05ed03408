use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatus},
    order_objects::OrderQueryFilter,
};

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The buyer id must not be empty")]
    BuyerMissing,
    #[error("An order must contain at least one item")]
    EmptyOrder,
    #[error("Cannot insert order, since it already exists: {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock { product_id: String, available: i64, requested: i64 },
    #[error("Order {order_id} cannot move from {from} to {to}")]
    IllegalTransition { order_id: OrderId, from: OrderStatus, to: OrderStatus },
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        CheckoutError::DatabaseError(e.to_string())
    }
}

/// The order/stock side of a checkout backend.
///
/// Stock-reservation correctness is this trait's central contract. There is no global lock across concurrent order
/// creation, so implementations must reserve with an atomic conditional update at the storage layer (an update that
/// checks `stock - reserved >= quantity` and applies the increment in the same atomic statement). An application-level
/// read-then-write is a race under concurrent load and is not an acceptable implementation.
#[allow(async_fn_in_trait)]
pub trait CheckoutDatabase: Clone {
    /// Creates the order, its items, and a stock reservation for every item in a single transaction.
    ///
    /// All-or-nothing: if any item's reservation fails the conditional check, the whole transaction rolls back and
    /// the returned error names the product, the available count and the requested count. Two concurrent orders
    /// whose combined quantities exceed stock must therefore result in at most one success.
    async fn create_order(&self, order: NewOrder) -> Result<Order, CheckoutError>;

    /// Converts the reservation into a permanent deduction (`stock -= qty; reserved -= qty` per item) and moves the
    /// order from `Pending` to `Confirmed`. Fails with [`CheckoutError::IllegalTransition`] from any other status.
    async fn confirm_order(&self, order_id: &OrderId) -> Result<Order, CheckoutError>;

    /// Releases the reservation (floored at zero, so duplicate cancels cannot drive `reserved` negative) and moves
    /// the order to `Cancelled`. Only legal from `Pending` or `Confirmed`; a confirmed order also has its stock
    /// deduction returned.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, CheckoutError>;

    /// Moves a `Pending` order to `PaymentFailed`. The reservation is deliberately retained; release happens through
    /// [`Self::release_reservation`] or the cancel path.
    async fn mark_payment_failed(&self, order_id: &OrderId) -> Result<Order, CheckoutError>;

    /// Releases the stock hold for a terminal-but-unreleased order (e.g. `PaymentFailed`), floored at zero.
    async fn release_reservation(&self, order_id: &OrderId) -> Result<(), CheckoutError>;

    /// Walks the fulfilment edges: `Confirmed → Processing → Shipped → Delivered`. Any other edge is an
    /// [`CheckoutError::IllegalTransition`] naming both states.
    async fn advance_fulfilment(&self, order_id: &OrderId, to: OrderStatus) -> Result<Order, CheckoutError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, CheckoutError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, CheckoutError>;

    /// Fetches orders according to the filter, ordered by `created_at` ascending.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, CheckoutError>;

    /// Cancels `Pending` orders that have not been updated for longer than `limit`, releasing their reservations.
    /// Returns the expired orders.
    async fn expire_stale_orders(&self, limit: Duration) -> Result<Vec<Order>, CheckoutError>;
}
