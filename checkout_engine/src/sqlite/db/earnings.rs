use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{EarningEntry, OrderId, SellerEarning},
    pricing::DEFAULT_COMMISSION_RATE,
    traits::LedgerError,
};

/// Looks up the seller's commission rate, falling back to the flat default when the seller has no row. A missing
/// seller is expected during onboarding and is not an error.
pub async fn commission_rate(seller_id: &str, conn: &mut SqliteConnection) -> Result<f64, LedgerError> {
    let rate: Option<(f64,)> = sqlx::query_as("SELECT commission_rate FROM sellers WHERE id = $1")
        .bind(seller_id)
        .fetch_optional(conn)
        .await?;
    Ok(rate.map(|(r,)| r).unwrap_or(DEFAULT_COMMISSION_RATE))
}

pub async fn upsert_seller(seller_id: &str, rate: f64, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
            INSERT INTO sellers (id, commission_rate) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET commission_rate = excluded.commission_rate;
        "#,
    )
    .bind(seller_id)
    .bind(rate)
    .execute(conn)
    .await?;
    Ok(())
}

/// Inserts one earning row per entry. `INSERT OR IGNORE` together with the unique index on `order_item_id` makes a
/// redelivered webhook a no-op: entries that already have an earning are skipped silently. Returns the number of
/// rows actually inserted.
pub async fn record_earnings(entries: &[EarningEntry], conn: &mut SqliteConnection) -> Result<u64, LedgerError> {
    let mut inserted = 0;
    for entry in entries {
        let result = sqlx::query(
            r#"
                INSERT OR IGNORE INTO seller_earnings
                    (seller_id, order_item_id, order_id, amount, platform_fee, net_amount)
                VALUES ($1, $2, $3, $4, $5, $6);
            "#,
        )
        .bind(&entry.seller_id)
        .bind(entry.order_item_id)
        .bind(&entry.order_id)
        .bind(entry.amount)
        .bind(entry.platform_fee)
        .bind(entry.net_amount)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }
    debug!("💰️ Recorded {inserted} of {} earning entries", entries.len());
    Ok(inserted)
}

pub async fn earnings_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<SellerEarning>, LedgerError> {
    let rows = sqlx::query_as("SELECT * FROM seller_earnings WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
