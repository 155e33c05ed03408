use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPaymentTransaction, PaymentTransaction, Reference, TransactionStatus},
    traits::LedgerError,
};

/// Inserts the transaction, returning `false` in the second element if a row with the same reference already exists.
/// The reference is the idempotency key, so a duplicate insert returns the existing row untouched.
pub async fn idempotent_insert(
    transaction: NewPaymentTransaction,
    conn: &mut SqliteConnection,
) -> Result<(PaymentTransaction, bool), LedgerError> {
    if let Some(existing) = fetch_by_reference(&transaction.reference, &mut *conn).await? {
        return Ok((existing, false));
    }
    let row: PaymentTransaction = sqlx::query_as(
        r#"
            INSERT INTO payment_transactions
                (user_id, order_id, amount, currency, network, phone_number, reference, gateway_reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(&transaction.user_id)
    .bind(&transaction.order_id)
    .bind(transaction.amount)
    .bind(&transaction.currency)
    .bind(&transaction.network)
    .bind(&transaction.phone_number)
    .bind(&transaction.reference)
    .bind(&transaction.gateway_reference)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            LedgerError::DuplicateTransaction(transaction.reference.clone())
        },
        _ => LedgerError::from(e),
    })?;
    debug!("💳️ Payment transaction [{}] recorded with id {}", row.reference, row.id);
    Ok((row, true))
}

pub async fn fetch_by_reference(
    reference: &Reference,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, LedgerError> {
    let row = sqlx::query_as("SELECT * FROM payment_transactions WHERE reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Updates the status, returning the row as it was before the update so the caller can detect transitions.
pub async fn update_status(
    reference: &Reference,
    status: TransactionStatus,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, LedgerError> {
    let previous = fetch_by_reference(reference, &mut *conn)
        .await?
        .ok_or_else(|| LedgerError::TransactionNotFound(reference.clone()))?;
    sqlx::query("UPDATE payment_transactions SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE reference = $2")
        .bind(status.to_string())
        .bind(reference)
        .execute(conn)
        .await?;
    Ok(previous)
}

pub async fn attach_gateway_reference(
    reference: &Reference,
    gateway_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    let result = sqlx::query(
        "UPDATE payment_transactions SET gateway_reference = $1, updated_at = CURRENT_TIMESTAMP WHERE reference = $2",
    )
    .bind(gateway_reference)
    .bind(reference)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(LedgerError::TransactionNotFound(reference.clone()));
    }
    Ok(())
}
