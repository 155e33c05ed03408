use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{CartItem, Order, OrderId, OrderStatus},
    pricing::{CartError, OrderPricing, PriceMismatch},
};

/// A checkout request as assembled by the server layer: the cart plus the context pricing needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub buyer_id: String,
    pub items: Vec<CartItem>,
    pub region: String,
    pub coupon_code: Option<String>,
}

/// The outcome of a successful checkout: the created pending order and its price breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub pricing: OrderPricing,
}

/// Everything that can be wrong with a checkout request, collected in full so the buyer fixes it in one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRejection {
    pub cart_errors: Vec<CartError>,
    pub price_mismatches: Vec<PriceMismatch>,
}

impl CheckoutRejection {
    pub fn is_empty(&self) -> bool {
        self.cart_errors.is_empty() && self.price_mismatches.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub buyer_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatus>>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_buyer_id(mut self, buyer_id: String) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none()
            && self.buyer_id.is_none()
            && self.since.is_none()
            && self.until.is_none()
            && self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true)
    }
}
