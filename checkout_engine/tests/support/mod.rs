pub mod prepare_env;

use checkout_engine::{
    db_types::{CartItem, NewProduct, ProductId},
    order_objects::CheckoutRequest,
    traits::ProductCatalog,
    SqliteDatabase,
};
use mkt_common::Money;

/// Seeds a product with the given price (in minor units) and opening stock. The seller id is derived from the
/// product id so commission tests can target it.
pub async fn seed_product(db: &SqliteDatabase, id: &str, price: i64, stock: i64) {
    db.upsert_product(NewProduct {
        id: ProductId::from(id),
        name: format!("Product {id}"),
        price: Money::from(price),
        seller_id: format!("seller-{id}"),
        is_active: true,
        stock,
    })
    .await
    .expect("Error seeding product");
}

/// A cart item quoting the honest catalog price.
pub fn cart_item(id: &str, quantity: i64, price: i64) -> CartItem {
    CartItem {
        product_id: ProductId::from(id),
        quantity,
        unit_price: Money::from(price),
        seller_id: format!("seller-{id}"),
    }
}

pub fn checkout_request(buyer: &str, items: Vec<CartItem>, region: &str, coupon: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
        buyer_id: buyer.to_string(),
        items,
        region: region.to_string(),
        coupon_code: coupon.map(String::from),
    }
}
