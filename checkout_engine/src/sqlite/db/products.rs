use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product, ProductId},
    traits::CheckoutError,
};

/// Inserts or replaces the product row and its opening stock position.
pub async fn upsert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, CheckoutError> {
    let row: Product = sqlx::query_as(
        r#"
            INSERT INTO products (id, name, price, seller_id, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                seller_id = excluded.seller_id,
                is_active = excluded.is_active,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(product.price)
    .bind(&product.seller_id)
    .bind(product.is_active)
    .fetch_one(&mut *conn)
    .await?;
    sqlx::query(
        r#"
            INSERT INTO stock_levels (product_id, stock) VALUES ($1, $2)
            ON CONFLICT (product_id) DO UPDATE SET stock = excluded.stock, updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(&product.id)
    .bind(product.stock)
    .execute(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_product(id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, CheckoutError> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(product)
}

/// Fetches the product rows for the given ids. Missing ids are silently absent from the result.
pub async fn fetch_products(ids: &[ProductId], conn: &mut SqliteConnection) -> Result<Vec<Product>, CheckoutError> {
    let mut result = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(product) = fetch_product(id, conn).await? {
            result.push(product);
        }
    }
    Ok(result)
}
