use chrono::Duration;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatus},
    order_objects::OrderQueryFilter,
    traits::CheckoutError,
};

/// Inserts the order header row. Item rows and stock reservations are the caller's responsibility; embed this call
/// in a transaction together with them.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Order, CheckoutError> {
    let order_id = order.order_id.clone();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, buyer_id, subtotal, tax, shipping, discount, total, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.buyer_id)
    .bind(order.subtotal)
    .bind(order.tax)
    .bind(order.shipping)
    .bind(order.discount)
    .bind(order.total)
    .bind(&order.currency)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => CheckoutError::OrderAlreadyExists(order_id),
        _ => CheckoutError::from(e),
    })?;
    debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
    Ok(order)
}

pub async fn insert_order_item(
    order_id: &OrderId,
    product_id: &str,
    seller_id: &str,
    quantity: i64,
    unit_price: i64,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, CheckoutError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO order_items (order_id, product_id, seller_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(product_id)
    .bind(seller_id)
    .bind(quantity)
    .bind(unit_price)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, CheckoutError> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, CheckoutError> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Moves the order to `to`, but only if its current status is one of `from`. The status check and the update are a
/// single conditional statement, so two racing transitions cannot both succeed. `None` means the order either does
/// not exist or is not in an eligible state; the caller decides which error that is.
pub async fn update_status_checked(
    order_id: &OrderId,
    from: &[OrderStatus],
    to: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, CheckoutError> {
    let mut builder = QueryBuilder::new("UPDATE orders SET updated_at = CURRENT_TIMESTAMP, status = ");
    builder.push_bind(to.to_string());
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id.as_str());
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in from {
        statuses.push_bind(status.to_string());
    }
    builder.push(") RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`, ordered by `created_at` ascending.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, CheckoutError> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.as_str().to_string());
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("📝️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {} rows", orders.len());
    Ok(orders)
}

/// Returns the `Pending` orders that have not been updated for longer than `limit`. The status flip happens through
/// the normal cancel path so that reservations are released consistently.
pub async fn stale_pending_orders(
    limit: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, CheckoutError> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = 'Pending'
              AND (unixepoch(CURRENT_TIMESTAMP) - unixepoch(updated_at)) > $1
        "#,
    )
    .bind(limit.num_seconds())
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
