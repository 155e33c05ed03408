use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{ProductId, StockRecord},
    traits::CheckoutError,
};

pub async fn fetch_stock(id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<StockRecord>, CheckoutError> {
    let record =
        sqlx::query_as("SELECT * FROM stock_levels WHERE product_id = $1").bind(id).fetch_optional(conn).await?;
    Ok(record)
}

/// Places a provisional hold on `quantity` units of the product.
///
/// The availability check and the reservation increment are one atomic statement: the UPDATE only matches when
/// `stock - reserved >= quantity`, so two concurrent reservations can never jointly oversell. There is deliberately
/// no read-then-write here; checking availability in application code and then updating would be a race.
pub async fn reserve(id: &ProductId, quantity: i64, conn: &mut SqliteConnection) -> Result<(), CheckoutError> {
    let result = sqlx::query(
        r#"
            UPDATE stock_levels
            SET reserved = reserved + $2, updated_at = CURRENT_TIMESTAMP
            WHERE product_id = $1 AND stock - reserved >= $2
        "#,
    )
    .bind(id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 1 {
        debug!("📦️ Reserved {quantity} units of {id}");
        return Ok(());
    }
    // The conditional update matched nothing: either the product has no stock row, or there is not enough available.
    // Re-read purely to produce an accurate error message.
    let available = fetch_stock(id, conn).await?.map(|s| s.available()).unwrap_or(0);
    Err(CheckoutError::InsufficientStock { product_id: id.to_string(), available, requested: quantity })
}

/// Converts a reservation into a permanent deduction: `stock -= quantity; reserved -= quantity`.
pub async fn commit_reservation(
    id: &ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), CheckoutError> {
    let result = sqlx::query(
        r#"
            UPDATE stock_levels
            SET stock = stock - $2, reserved = reserved - $2, updated_at = CURRENT_TIMESTAMP
            WHERE product_id = $1 AND reserved >= $2
        "#,
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;
    if result.rows_affected() == 1 {
        debug!("📦️ Committed reservation of {quantity} units of {id}");
        Ok(())
    } else {
        Err(CheckoutError::DatabaseError(format!(
            "Cannot commit reservation of {quantity} units for {id}: reservation missing or too small"
        )))
    }
}

/// Releases a reservation, floored at zero. The floor means a duplicate release (a double cancel, or a cancel racing
/// the expiry worker) is a harmless no-op rather than a negative counter.
pub async fn release_reservation(
    id: &ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), CheckoutError> {
    sqlx::query(
        r#"
            UPDATE stock_levels
            SET reserved = MAX(reserved - $2, 0), updated_at = CURRENT_TIMESTAMP
            WHERE product_id = $1
        "#,
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;
    debug!("📦️ Released reservation of up to {quantity} units of {id}");
    Ok(())
}

/// Returns previously deducted stock to the shelf (confirmed order being cancelled).
pub async fn restore_stock(id: &ProductId, quantity: i64, conn: &mut SqliteConnection) -> Result<(), CheckoutError> {
    sqlx::query(
        r#"
            UPDATE stock_levels
            SET stock = stock + $2, updated_at = CURRENT_TIMESTAMP
            WHERE product_id = $1
        "#,
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(())
}
