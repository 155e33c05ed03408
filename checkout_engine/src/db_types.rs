use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use mkt_common::{Money, TZS_CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid status value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------      ProductId      ---------------------------------------------------------
/// A lightweight wrapper around the catalog's product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ProductId(pub String);

impl<S: Into<String>> From<S> for ProductId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       OrderId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      Reference      ---------------------------------------------------------
/// The caller-generated payment reference. This is the idempotency key for the entire payment flow; webhooks and
/// status polls both correlate back to a transaction through it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Reference(pub String);

impl<S: Into<String>> From<S> for Reference {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Reference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------      OrderStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// The order has been created and stock reserved, but payment has not completed.
    Pending,
    /// Payment has completed and the reservation has been converted to a stock deduction.
    Confirmed,
    /// The seller is preparing the order.
    Processing,
    /// The order has been handed to the courier.
    Shipped,
    /// The order has been received by the buyer. Terminal.
    Delivered,
    /// Cancelled by the buyer or an admin. Terminal.
    Cancelled,
    /// The payment attempt failed. Terminal for the order; the reservation is released through the cancel path.
    PaymentFailed,
}

impl OrderStatus {
    /// True for states from which no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::PaymentFailed)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Confirmed => write!(f, "Confirmed"),
            OrderStatus::Processing => write!(f, "Processing"),
            OrderStatus::Shipped => write!(f, "Shipped"),
            OrderStatus::Delivered => write!(f, "Delivered"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
            OrderStatus::PaymentFailed => write!(f, "PaymentFailed"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            "PaymentFailed" => Ok(Self::PaymentFailed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            log::error!("Invalid order status in database: {value}. Defaulting to Pending");
            OrderStatus::Pending
        })
    }
}

//--------------------------------------  TransactionStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Charge initiated, no outcome reported yet.
    Pending,
    /// The provider has acknowledged the charge and is waiting for the payer.
    Processing,
    /// The provider has settled the charge. Terminal.
    Completed,
    /// The charge failed (declined, timed out, insufficient balance). Terminal.
    Failed,
    /// The payer abandoned the charge. Terminal.
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Processing => write!(f, "Processing"),
            TransactionStatus::Completed => write!(f, "Completed"),
            TransactionStatus::Failed => write!(f, "Failed"),
            TransactionStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

impl From<String> for TransactionStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            log::error!("Invalid transaction status in database: {value}. Defaulting to Pending");
            TransactionStatus::Pending
        })
    }
}

//--------------------------------------       Product       ---------------------------------------------------------
/// An authoritative catalog record. The checkout core only ever reads these; the one mutation it performs is the
/// stock deduction on order confirmation, and that happens on [`StockRecord`], not here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub seller_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub seller_id: String,
    pub is_active: bool,
    pub stock: i64,
}

//--------------------------------------     StockRecord     ---------------------------------------------------------
/// Stock position for a single product. `available()` is the only number order creation may consult; raw `stock`
/// ignores holds taken by concurrent pending orders.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub stock: i64,
    pub reserved: i64,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    pub fn available(&self) -> i64 {
        self.stock - self.reserved
    }
}

//--------------------------------------      CartItem       ---------------------------------------------------------
/// A single line of a checkout request. Transient: cart items are never persisted, they only exist long enough to be
/// validated and turned into order items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: i64,
    /// The price the client believes the product has. Used only for tamper detection; totals always come from the
    /// catalog price.
    pub unit_price: Money,
    pub seller_id: String,
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: String,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
    pub currency: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Recomputes the total invariant from this order's own stored fields, so that later audits reconcile without
    /// access to the original cart.
    pub fn totals_reconcile(&self) -> bool {
        self.total == self.subtotal + self.tax + self.shipping - self.discount
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub items: Vec<NewOrderItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
    pub currency: String,
}

impl NewOrder {
    pub fn new(order_id: OrderId, buyer_id: String, items: Vec<NewOrderItem>) -> Self {
        Self {
            order_id,
            buyer_id,
            items,
            subtotal: Money::default(),
            tax: Money::default(),
            shipping: Money::default(),
            discount: Money::default(),
            total: Money::default(),
            currency: TZS_CURRENCY_CODE.to_string(),
        }
    }
}

//--------------------------------------     OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub seller_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub seller_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

//-------------------------------------- PaymentTransaction  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: i64,
    pub user_id: String,
    pub order_id: Option<OrderId>,
    pub amount: Money,
    pub currency: String,
    pub network: Option<String>,
    pub phone_number: Option<String>,
    pub reference: Reference,
    pub gateway_reference: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentTransaction {
    pub user_id: String,
    pub order_id: Option<OrderId>,
    pub amount: Money,
    pub currency: String,
    pub network: Option<String>,
    pub phone_number: Option<String>,
    pub reference: Reference,
    pub gateway_reference: Option<String>,
}

impl NewPaymentTransaction {
    pub fn new(user_id: String, amount: Money, reference: Reference) -> Self {
        Self {
            user_id,
            order_id: None,
            amount,
            currency: TZS_CURRENCY_CODE.to_string(),
            network: None,
            phone_number: None,
            reference,
            gateway_reference: None,
        }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn via_network(mut self, network: String, phone_number: String) -> Self {
        self.network = Some(network);
        self.phone_number = Some(phone_number);
        self
    }
}

//--------------------------------------    SellerEarning    ---------------------------------------------------------
/// One earning record per order item, created exactly once when the linked payment completes. The unique index on
/// `order_item_id` enforces the once-only rule at the storage layer.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SellerEarning {
    pub id: i64,
    pub seller_id: String,
    pub order_item_id: i64,
    pub order_id: OrderId,
    pub amount: Money,
    pub platform_fee: Money,
    pub net_amount: Money,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// The earning breakdown for a single order item before insertion.
#[derive(Debug, Clone)]
pub struct EarningEntry {
    pub seller_id: String,
    pub order_item_id: i64,
    pub order_id: OrderId,
    pub amount: Money,
    pub platform_fee: Money,
    pub net_amount: Money,
}

impl EarningEntry {
    /// Splits an order item's line total between the platform and the seller at the given commission rate.
    /// The platform fee is rounded half-up; the seller receives the remainder so the split is exact.
    pub fn from_item(item: &OrderItem, commission_rate: f64) -> Self {
        let amount = item.line_total();
        let platform_fee = Money::round_half_up(amount.value() as f64 * commission_rate);
        let net_amount = amount - platform_fee;
        Self {
            seller_id: item.seller_id.clone(),
            order_item_id: item.id,
            order_id: item.order_id.clone(),
            amount,
            platform_fee,
            net_amount,
        }
    }
}

//--------------------------------------    Subscription     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: String,
    pub reference: Reference,
    pub status: String,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
