//! Cart validation and price computation.
//!
//! Everything in this module is a pure function over a cart and a catalog snapshot. The caller (usually
//! [`OrderFlowApi`](crate::OrderFlowApi)) fetches the authoritative product and stock rows first and hands them in;
//! nothing here touches the database. Client-supplied prices are only ever used for tamper detection, never for
//! totals.

use std::collections::HashMap;

use mkt_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{CartItem, Product, ProductId, StockRecord};

/// The VAT rate applied to every order.
pub const DEFAULT_TAX_RATE: f64 = 0.18;

/// Base shipping fee in whole currency units (TSh 5,000) before the region multiplier and item-count loading.
pub const BASE_SHIPPING_FEE_UNITS: i64 = 5_000;

/// Commission fallback when a seller has no commission row.
pub const DEFAULT_COMMISSION_RATE: f64 = 0.10;

/// The product and stock rows a pricing pass works against, keyed by product id.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    products: HashMap<ProductId, (Product, StockRecord)>,
}

impl CatalogSnapshot {
    pub fn new(rows: Vec<(Product, StockRecord)>) -> Self {
        let products = rows.into_iter().map(|(p, s)| (p.id.clone(), (p, s))).collect();
        Self { products }
    }

    pub fn get(&self, id: &ProductId) -> Option<&(Product, StockRecord)> {
        self.products.get(id)
    }

    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.get(id).map(|(p, _)| p)
    }
}

//--------------------------------------    Cart validation   --------------------------------------------------------

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum CartError {
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Product {product_id} was not found")]
    ProductNotFound { product_id: ProductId },
    #[error("Product {product_id} is not available for sale")]
    ProductInactive { product_id: ProductId },
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },
    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock { product_id: ProductId, available: i64, requested: i64 },
    #[error("Invalid unit price for product {product_id}")]
    InvalidPrice { product_id: ProductId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartValidation {
    pub valid: bool,
    pub errors: Vec<CartError>,
}

/// Validates every cart line against the catalog snapshot. All problems across all items are collected so the
/// buyer sees the complete list in one round trip, not just the first failure.
///
/// The stock check is against `available = stock - reserved`, not raw stock, so holds taken by concurrent pending
/// orders count. This check is advisory only: the authoritative check is the atomic conditional reservation applied
/// at order creation.
pub fn validate_cart(items: &[CartItem], catalog: &CatalogSnapshot) -> CartValidation {
    let mut errors = Vec::new();
    if items.is_empty() {
        errors.push(CartError::EmptyCart);
    }
    for item in items {
        match catalog.get(&item.product_id) {
            None => errors.push(CartError::ProductNotFound { product_id: item.product_id.clone() }),
            Some((product, stock)) => {
                if !product.is_active {
                    errors.push(CartError::ProductInactive { product_id: item.product_id.clone() });
                }
                if item.quantity <= 0 {
                    errors.push(CartError::InvalidQuantity {
                        product_id: item.product_id.clone(),
                        quantity: item.quantity,
                    });
                } else if item.quantity > stock.available() {
                    errors.push(CartError::InsufficientStock {
                        product_id: item.product_id.clone(),
                        available: stock.available(),
                        requested: item.quantity,
                    });
                }
                if !item.unit_price.is_positive() {
                    errors.push(CartError::InvalidPrice { product_id: item.product_id.clone() });
                }
            },
        }
    }
    CartValidation { valid: errors.is_empty(), errors }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceMismatch {
    pub product_id: ProductId,
    pub client_price: Money,
    pub catalog_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceCheck {
    pub valid: bool,
    pub mismatches: Vec<PriceMismatch>,
}

/// Compares each client-supplied price against the catalog price. A mismatch means a stale client cache or
/// tampering; either way the checkout must not proceed on the client's numbers.
pub fn verify_product_prices(items: &[CartItem], catalog: &CatalogSnapshot) -> PriceCheck {
    let mut mismatches = Vec::new();
    for item in items {
        if let Some(product) = catalog.product(&item.product_id) {
            if product.price != item.unit_price {
                mismatches.push(PriceMismatch {
                    product_id: item.product_id.clone(),
                    client_price: item.unit_price,
                    catalog_price: product.price,
                });
            }
        }
    }
    PriceCheck { valid: mismatches.is_empty(), mismatches }
}

//--------------------------------------    Price components  --------------------------------------------------------

/// Σ(catalog price × quantity). Items missing from the snapshot contribute nothing; [`validate_cart`] already
/// reports them.
pub fn calculate_subtotal(items: &[CartItem], catalog: &CatalogSnapshot) -> Money {
    items
        .iter()
        .filter_map(|item| catalog.product(&item.product_id).map(|p| p.price * item.quantity))
        .sum()
}

/// Tax on the subtotal, rounded half-up to the cent.
pub fn calculate_tax(subtotal: Money, rate: f64) -> Money {
    Money::round_half_up(subtotal.value() as f64 * rate)
}

/// Per-region shipping multipliers. Loaded from configuration where available; [`RegionTable::default`] ships a
/// built-in table so a missing config file never breaks checkout. Region names are matched case-insensitively and
/// unknown regions pay the standard rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionTable {
    multipliers: HashMap<String, f64>,
}

impl Default for RegionTable {
    fn default() -> Self {
        let multipliers = [
            // Capital-region discount: dense courier coverage.
            ("dar es salaam", 0.8),
            ("dodoma", 1.0),
            ("arusha", 1.1),
            ("mwanza", 1.2),
            ("zanzibar", 1.5),
            // Remote-region surcharge.
            ("kigoma", 1.8),
            ("mtwara", 1.8),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { multipliers }
    }
}

impl RegionTable {
    pub fn new(multipliers: HashMap<String, f64>) -> Self {
        Self { multipliers }
    }

    pub fn multiplier(&self, region: &str) -> f64 {
        self.multipliers.get(region.trim().to_lowercase().as_str()).copied().unwrap_or(1.0)
    }
}

/// Shipping = base fee × region multiplier × (1 + 0.1 × item count), rounded to whole currency units.
pub fn calculate_shipping(item_count: usize, region: &str, table: &RegionTable) -> Money {
    let loading = 1.0 + 0.1 * item_count as f64;
    let base = Money::from_units(BASE_SHIPPING_FEE_UNITS);
    Money::round_to_unit(base.value() as f64 * table.multiplier(region) * loading)
}

/// Coupon code → discount rate. Unknown codes are worth nothing rather than being an error, so a mistyped
/// coupon degrades to "no discount" instead of blocking checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponTable {
    rates: HashMap<String, f64>,
}

impl Default for CouponTable {
    fn default() -> Self {
        let rates = [("SAVE10", 0.10), ("SAVE20", 0.20), ("KARIBU5", 0.05)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self { rates }
    }
}

impl CouponTable {
    pub fn new(rates: HashMap<String, f64>) -> Self {
        Self { rates }
    }

    pub fn rate(&self, code: &str) -> f64 {
        self.rates.get(code.trim()).copied().unwrap_or(0.0)
    }
}

/// Discount on the subtotal for the given coupon, rounded half-up to the cent. `None` or an unknown code yields
/// zero.
pub fn calculate_discount(subtotal: Money, coupon: Option<&str>, table: &CouponTable) -> Money {
    let rate = coupon.map(|c| table.rate(c)).unwrap_or(0.0);
    Money::round_half_up(subtotal.value() as f64 * rate)
}

//--------------------------------------     OrderPricing     --------------------------------------------------------

/// The fully computed price breakdown for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPricing {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderPricing {
    /// The total invariant, recomputed from the stored components. Checked at construction and re-checked against
    /// persisted orders in tests and reconciliation audits.
    pub fn reconciles(&self) -> bool {
        self.total == self.subtotal + self.tax + self.shipping - self.discount
    }
}

#[derive(Debug, Clone, Default)]
pub struct PricingConfig {
    pub tax_rate: Option<f64>,
    pub regions: RegionTable,
    pub coupons: CouponTable,
}

/// Computes the full price breakdown for a cart using authoritative catalog prices.
pub fn price_order(
    items: &[CartItem],
    catalog: &CatalogSnapshot,
    region: &str,
    coupon: Option<&str>,
    config: &PricingConfig,
) -> OrderPricing {
    let subtotal = calculate_subtotal(items, catalog);
    let tax = calculate_tax(subtotal, config.tax_rate.unwrap_or(DEFAULT_TAX_RATE));
    let shipping = calculate_shipping(items.len(), region, &config.regions);
    let discount = calculate_discount(subtotal, coupon, &config.coupons);
    let total = subtotal + tax + shipping - discount;
    let pricing = OrderPricing { subtotal, tax, shipping, discount, total };
    debug_assert!(pricing.reconciles());
    pricing
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use mkt_common::Money;

    use super::*;
    use crate::db_types::{CartItem, Product, ProductId, StockRecord};

    fn catalog(entries: &[(&str, i64, i64, i64, bool)]) -> CatalogSnapshot {
        // (id, price, stock, reserved, active)
        let rows = entries
            .iter()
            .map(|(id, price, stock, reserved, active)| {
                let product = Product {
                    id: ProductId::from(*id),
                    name: format!("Product {id}"),
                    price: Money::from(*price),
                    seller_id: "seller-1".to_string(),
                    is_active: *active,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                };
                let stock = StockRecord {
                    product_id: ProductId::from(*id),
                    stock: *stock,
                    reserved: *reserved,
                    updated_at: Utc::now(),
                };
                (product, stock)
            })
            .collect();
        CatalogSnapshot::new(rows)
    }

    fn line(id: &str, qty: i64, price: i64) -> CartItem {
        CartItem {
            product_id: ProductId::from(id),
            quantity: qty,
            unit_price: Money::from(price),
            seller_id: "seller-1".to_string(),
        }
    }

    #[test]
    fn empty_cart_is_invalid() {
        let result = validate_cart(&[], &catalog(&[]));
        assert!(!result.valid);
        assert_eq!(result.errors, vec![CartError::EmptyCart]);
    }

    #[test]
    fn all_errors_are_collected() {
        let cat = catalog(&[("p-live", 1_000, 5, 0, true), ("p-dead", 1_000, 5, 0, false)]);
        let items = vec![
            line("p-missing", 1, 1_000),
            line("p-dead", 0, -5),
            line("p-live", 10, 1_000),
        ];
        let result = validate_cart(&items, &cat);
        assert!(!result.valid);
        assert!(result.errors.contains(&CartError::ProductNotFound { product_id: ProductId::from("p-missing") }));
        assert!(result.errors.contains(&CartError::ProductInactive { product_id: ProductId::from("p-dead") }));
        assert!(result
            .errors
            .contains(&CartError::InvalidQuantity { product_id: ProductId::from("p-dead"), quantity: 0 }));
        assert!(result.errors.contains(&CartError::InvalidPrice { product_id: ProductId::from("p-dead") }));
        assert!(result.errors.contains(&CartError::InsufficientStock {
            product_id: ProductId::from("p-live"),
            available: 5,
            requested: 10
        }));
    }

    #[test]
    fn stock_check_accounts_for_reservations() {
        // 10 in stock, 7 already reserved: only 3 available.
        let cat = catalog(&[("p-1", 1_000, 10, 7, true)]);
        let result = validate_cart(&[line("p-1", 4, 1_000)], &cat);
        assert_eq!(result.errors, vec![CartError::InsufficientStock {
            product_id: ProductId::from("p-1"),
            available: 3,
            requested: 4
        }]);
        assert!(validate_cart(&[line("p-1", 3, 1_000)], &cat).valid);
    }

    #[test]
    fn exhausted_stock_never_silently_succeeds() {
        let cat = catalog(&[("p-1", 1_000, 0, 0, true)]);
        let result = validate_cart(&[line("p-1", 1, 1_000)], &cat);
        assert!(!result.valid);
        assert!(matches!(result.errors[0], CartError::InsufficientStock { .. }));
        assert!(result.errors[0].to_string().contains("Insufficient stock"));
    }

    #[test]
    fn tampered_price_is_reported_with_both_values() {
        let cat = catalog(&[("p-1", 10_000, 5, 0, true)]);
        let result = verify_product_prices(&[line("p-1", 1, 1_000)], &cat);
        assert!(!result.valid);
        assert_eq!(result.mismatches.len(), 1);
        assert_eq!(result.mismatches[0].client_price.value(), 1_000);
        assert_eq!(result.mismatches[0].catalog_price.value(), 10_000);
    }

    #[test]
    fn subtotal_uses_catalog_prices() {
        let cat = catalog(&[("p-1", 10_000, 5, 0, true), ("p-2", 2_500, 5, 0, true)]);
        // Client claims p-1 costs 1 cent; the catalog price wins.
        let items = vec![line("p-1", 2, 1), line("p-2", 3, 2_500)];
        assert_eq!(calculate_subtotal(&items, &cat).value(), 2 * 10_000 + 3 * 2_500);
    }

    #[test]
    fn tax_rounds_half_up() {
        assert_eq!(calculate_tax(Money::from(100), 0.18).value(), 18);
        // 0.18 * 125 = 22.5 -> 23
        assert_eq!(calculate_tax(Money::from(125), 0.18).value(), 23);
    }

    #[test]
    fn shipping_scales_with_region_and_count() {
        let table = RegionTable::default();
        let capital = calculate_shipping(2, "Dar es Salaam", &table);
        let standard = calculate_shipping(2, "somewhere-else", &table);
        let remote = calculate_shipping(2, "Kigoma", &table);
        assert!(capital < standard, "capital region must be cheaper than standard");
        assert!(standard < remote, "remote region must carry a surcharge");
        // base 5000 * 1.0 * (1 + 0.2) = 6000 whole units
        assert_eq!(standard, Money::from_units(6_000));
        // More items, higher loading.
        assert!(calculate_shipping(5, "somewhere-else", &table) > standard);
    }

    #[test]
    fn shipping_rounds_to_whole_units() {
        let table = RegionTable::default();
        // base 5000 * 1.1 * (1 + 0.3) = 7150 units exactly; with 3 items in Arusha
        let fee = calculate_shipping(3, "arusha", &table);
        assert_eq!(fee.value() % 100, 0);
    }

    #[test]
    fn coupon_scenarios() {
        let table = CouponTable::default();
        let subtotal = Money::from(100_000);
        assert_eq!(calculate_discount(subtotal, Some("SAVE10"), &table).value(), 10_000);
        assert_eq!(calculate_discount(subtotal, Some("UNKNOWN"), &table).value(), 0);
        assert_eq!(calculate_discount(subtotal, None, &table).value(), 0);
    }

    #[test]
    fn total_invariant_holds() {
        let cat = catalog(&[("p-1", 10_000, 5, 0, true), ("p-2", 2_500, 5, 0, true)]);
        let items = vec![line("p-1", 2, 10_000), line("p-2", 1, 2_500)];
        let config = PricingConfig::default();
        let pricing = price_order(&items, &cat, "dodoma", Some("SAVE10"), &config);
        assert!(pricing.reconciles());
        assert_eq!(pricing.total, pricing.subtotal + pricing.tax + pricing.shipping - pricing.discount);
        assert_eq!(pricing.subtotal.value(), 22_500);
        assert_eq!(pricing.discount.value(), 2_250);
    }
}
