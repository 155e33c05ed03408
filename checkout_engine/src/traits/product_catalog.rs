use crate::{
    db_types::{NewProduct, Product, ProductId, StockRecord},
    pricing::CatalogSnapshot,
    traits::CheckoutError,
};

/// Read access to the authoritative product catalog and stock positions.
///
/// The catalog itself is owned by the wider marketplace; the checkout core treats it as read-only apart from the
/// reservation/deduction counters managed through [`CheckoutDatabase`](crate::traits::CheckoutDatabase).
#[allow(async_fn_in_trait)]
pub trait ProductCatalog: Clone {
    /// Fetches the products and stock rows for the given ids in one snapshot. Missing ids are simply absent from the
    /// result; cart validation reports them.
    async fn catalog_snapshot(&self, ids: &[ProductId]) -> Result<CatalogSnapshot, CheckoutError>;

    async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, CheckoutError>;

    async fn stock_record(&self, id: &ProductId) -> Result<Option<StockRecord>, CheckoutError>;

    /// Inserts or replaces a product with its opening stock. Used by catalog sync and test seeding.
    async fn upsert_product(&self, product: NewProduct) -> Result<Product, CheckoutError>;
}
