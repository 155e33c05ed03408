use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatus, PaymentTransaction, SellerEarning};

/// Emitted when a payment transaction reaches `Completed`. The receipt notifier subscribes to this; the order, when
/// the payment was for one, rides along so the receipt can show what was bought.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCompletedEvent {
    pub transaction: PaymentTransaction,
    pub order: Option<Order>,
}

impl PaymentCompletedEvent {
    pub fn new(transaction: PaymentTransaction, order: Option<Order>) -> Self {
        Self { transaction, order }
    }
}

/// Emitted when an order transitions to `Confirmed`, with the earnings recorded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order: Order,
    pub earnings: Vec<SellerEarning>,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order, earnings: Vec<SellerEarning>) -> Self {
        Self { order, earnings }
    }
}

/// Emitted when an order leaves the happy path (buyer cancel, expiry, or payment failure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatus,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}
