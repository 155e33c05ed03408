use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Reference, Subscription},
    traits::LedgerError,
};

/// Activates any subscriptions linked to the payment reference. Already-active rows are matched too so that a
/// redelivered webhook simply re-applies the same validity window instead of failing.
pub async fn activate_for_reference(
    reference: &Reference,
    valid_until: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Subscription>, LedgerError> {
    let rows = sqlx::query_as(
        r#"
            UPDATE subscriptions
            SET status = 'Active', valid_until = $2, updated_at = CURRENT_TIMESTAMP
            WHERE reference = $1 AND status IN ('Pending', 'Active')
            RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(valid_until)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn fetch_for_reference(
    reference: &Reference,
    conn: &mut SqliteConnection,
) -> Result<Vec<Subscription>, LedgerError> {
    let rows = sqlx::query_as("SELECT * FROM subscriptions WHERE reference = $1")
        .bind(reference)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub async fn insert_pending(
    user_id: &str,
    reference: &Reference,
    conn: &mut SqliteConnection,
) -> Result<Subscription, LedgerError> {
    let row = sqlx::query_as(
        r#"
            INSERT INTO subscriptions (user_id, reference) VALUES ($1, $2)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(reference)
    .fetch_one(conn)
    .await?;
    Ok(row)
}
