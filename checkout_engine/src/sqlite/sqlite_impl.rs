//! `SqliteDatabase` is the concrete SQLite backend for the checkout engine.
//!
//! It implements every trait in the [`traits`](crate::traits) module by delegating to the low-level functions in
//! [`db`](super::db), opening a transaction wherever several table updates must be atomic together (order creation
//! with its reservations being the important case).
use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, earnings, new_pool, orders, products, stock, subscriptions, transactions};
use crate::{
    db_types::{
        EarningEntry,
        NewOrder,
        NewPaymentTransaction,
        NewProduct,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentTransaction,
        Product,
        ProductId,
        Reference,
        SellerEarning,
        StockRecord,
        Subscription,
        TransactionStatus,
    },
    order_objects::OrderQueryFilter,
    pricing::CatalogSnapshot,
    traits::{
        CheckoutDatabase,
        CheckoutError,
        EarningsLedger,
        LedgerError,
        PaymentLedger,
        ProductCatalog,
        SubscriptionStore,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database connection pool using the `MKT_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Registers (or updates) a seller's commission rate. Sellers without a row fall back to the flat default.
    pub async fn set_commission_rate(&self, seller_id: &str, rate: f64) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        earnings::upsert_seller(seller_id, rate, &mut conn).await
    }

    /// Creates a pending subscription linked to a payment reference; reconciliation activates it on completion.
    pub async fn create_pending_subscription(
        &self,
        user_id: &str,
        reference: &Reference,
    ) -> Result<Subscription, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::insert_pending(user_id, reference, &mut conn).await
    }

    pub async fn fetch_subscriptions(&self, reference: &Reference) -> Result<Vec<Subscription>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::fetch_for_reference(reference, &mut conn).await
    }

    /// Cancels the order inside the given transaction, returning stock according to the status the order held.
    async fn cancel_order_inner(
        order: &Order,
        items: &[OrderItem],
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<Order, CheckoutError> {
        let updated =
            orders::update_status_checked(&order.order_id, &[OrderStatus::Pending, OrderStatus::Confirmed], OrderStatus::Cancelled, conn)
                .await?
                .ok_or_else(|| CheckoutError::IllegalTransition {
                    order_id: order.order_id.clone(),
                    from: order.status,
                    to: OrderStatus::Cancelled,
                })?;
        for item in items {
            match order.status {
                // Pending orders hold a reservation; release it (floored at zero).
                OrderStatus::Pending => stock::release_reservation(&item.product_id, item.quantity, conn).await?,
                // Confirmed orders already converted the hold into a deduction; put the units back on the shelf.
                OrderStatus::Confirmed => stock::restore_stock(&item.product_id, item.quantity, conn).await?,
                _ => unreachable!("cancel is gated on Pending/Confirmed"),
            }
        }
        Ok(updated)
    }
}

impl CheckoutDatabase for SqliteDatabase {
    async fn create_order(&self, order: NewOrder) -> Result<Order, CheckoutError> {
        if order.buyer_id.trim().is_empty() {
            return Err(CheckoutError::BuyerMissing);
        }
        if order.items.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }
        let mut tx = self.pool.begin().await?;
        let created = orders::insert_order(&order, &mut tx).await?;
        for item in &order.items {
            // Reservation failure aborts the transaction, so no partial holds survive a failed checkout.
            stock::reserve(&item.product_id, item.quantity, &mut tx).await?;
            orders::insert_order_item(
                &created.order_id,
                item.product_id.as_str(),
                &item.seller_id,
                item.quantity,
                item.unit_price.value(),
                &mut tx,
            )
            .await?;
        }
        tx.commit().await?;
        debug!("🗃️ Order {} created with {} item(s), total {}", created.order_id, order.items.len(), created.total);
        Ok(created)
    }

    async fn confirm_order(&self, order_id: &OrderId) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.clone()))?;
        let updated = orders::update_status_checked(order_id, &[OrderStatus::Pending], OrderStatus::Confirmed, &mut tx)
            .await?
            .ok_or(CheckoutError::IllegalTransition {
                order_id: order_id.clone(),
                from: order.status,
                to: OrderStatus::Confirmed,
            })?;
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        for item in &items {
            stock::commit_reservation(&item.product_id, item.quantity, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Order {order_id} confirmed; reservations converted to deductions");
        Ok(updated)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.clone()))?;
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        let updated = Self::cancel_order_inner(&order, &items, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} cancelled from {}", order.status);
        Ok(updated)
    }

    async fn mark_payment_failed(&self, order_id: &OrderId) -> Result<Order, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.clone()))?;
        let updated =
            orders::update_status_checked(order_id, &[OrderStatus::Pending], OrderStatus::PaymentFailed, &mut conn)
                .await?
                .ok_or(CheckoutError::IllegalTransition {
                    order_id: order_id.clone(),
                    from: order.status,
                    to: OrderStatus::PaymentFailed,
                })?;
        Ok(updated)
    }

    async fn release_reservation(&self, order_id: &OrderId) -> Result<(), CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        for item in &items {
            stock::release_reservation(&item.product_id, item.quantity, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn advance_fulfilment(&self, order_id: &OrderId, to: OrderStatus) -> Result<Order, CheckoutError> {
        let from: &[OrderStatus] = match to {
            OrderStatus::Processing => &[OrderStatus::Confirmed],
            OrderStatus::Shipped => &[OrderStatus::Confirmed, OrderStatus::Processing],
            OrderStatus::Delivered => &[OrderStatus::Shipped],
            _ => &[],
        };
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(order_id.clone()))?;
        let updated = orders::update_status_checked(order_id, from, to, &mut conn).await?.ok_or(
            CheckoutError::IllegalTransition { order_id: order_id.clone(), from: order.status, to },
        )?;
        Ok(updated)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_items(order_id, &mut conn).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(query, &mut conn).await
    }

    async fn expire_stale_orders(&self, limit: Duration) -> Result<Vec<Order>, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let stale = orders::stale_pending_orders(limit, &mut tx).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for order in &stale {
            let items = orders::fetch_order_items(&order.order_id, &mut tx).await?;
            let cancelled = Self::cancel_order_inner(order, &items, &mut tx).await?;
            expired.push(cancelled);
        }
        tx.commit().await?;
        Ok(expired)
    }
}

impl ProductCatalog for SqliteDatabase {
    async fn catalog_snapshot(&self, ids: &[ProductId]) -> Result<CatalogSnapshot, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        let mut rows = Vec::with_capacity(ids.len());
        for product in products::fetch_products(ids, &mut conn).await? {
            let stock = stock::fetch_stock(&product.id, &mut conn).await?.unwrap_or(StockRecord {
                product_id: product.id.clone(),
                stock: 0,
                reserved: 0,
                updated_at: Utc::now(),
            });
            rows.push((product, stock));
        }
        Ok(CatalogSnapshot::new(rows))
    }

    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(id, &mut conn).await
    }

    async fn stock_record(&self, id: &ProductId) -> Result<Option<StockRecord>, CheckoutError> {
        let mut conn = self.pool.acquire().await?;
        stock::fetch_stock(id, &mut conn).await
    }

    async fn upsert_product(&self, product: NewProduct) -> Result<Product, CheckoutError> {
        let mut tx = self.pool.begin().await?;
        let row = products::upsert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(row)
    }
}

impl PaymentLedger for SqliteDatabase {
    async fn insert_transaction(
        &self,
        transaction: NewPaymentTransaction,
    ) -> Result<(PaymentTransaction, bool), LedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = transactions::idempotent_insert(transaction, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_transaction_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<PaymentTransaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_by_reference(reference, &mut conn).await
    }

    async fn update_transaction_status(
        &self,
        reference: &Reference,
        status: TransactionStatus,
    ) -> Result<PaymentTransaction, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let previous = transactions::update_status(reference, status, &mut tx).await?;
        tx.commit().await?;
        Ok(previous)
    }

    async fn attach_gateway_reference(
        &self,
        reference: &Reference,
        gateway_reference: &str,
    ) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::attach_gateway_reference(reference, gateway_reference, &mut conn).await
    }
}

impl EarningsLedger for SqliteDatabase {
    async fn commission_rate(&self, seller_id: &str) -> Result<f64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        earnings::commission_rate(seller_id, &mut conn).await
    }

    async fn record_earnings(&self, entries: &[EarningEntry]) -> Result<u64, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let inserted = earnings::record_earnings(entries, &mut tx).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn earnings_for_order(&self, order_id: &OrderId) -> Result<Vec<SellerEarning>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        earnings::earnings_for_order(order_id, &mut conn).await
    }
}

impl SubscriptionStore for SqliteDatabase {
    async fn activate_for_reference(
        &self,
        reference: &Reference,
        valid_until: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::activate_for_reference(reference, valid_until, &mut conn).await
    }
}
