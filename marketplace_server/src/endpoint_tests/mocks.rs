use checkout_engine::{
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
use chrono::{DateTime, Duration, Utc};
use mockall::mock;
use momo_gateway::{ChargeRequest, ChargeResponse, MomoGatewayError, PaymentProvider, PaymentStatus, ProviderMode};

mock! {
    pub Backend {}

    impl Clone for Backend {
        fn clone(&self) -> Self;
    }

    impl CheckoutDatabase for Backend {
        async fn create_order(&self, order: NewOrder) -> Result<Order, CheckoutError>;
        async fn confirm_order(&self, order_id: &OrderId) -> Result<Order, CheckoutError>;
        async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, CheckoutError>;
        async fn mark_payment_failed(&self, order_id: &OrderId) -> Result<Order, CheckoutError>;
        async fn release_reservation(&self, order_id: &OrderId) -> Result<(), CheckoutError>;
        async fn advance_fulfilment(&self, order_id: &OrderId, to: OrderStatus) -> Result<Order, CheckoutError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, CheckoutError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, CheckoutError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, CheckoutError>;
        async fn expire_stale_orders(&self, limit: Duration) -> Result<Vec<Order>, CheckoutError>;
    }

    impl ProductCatalog for Backend {
        async fn catalog_snapshot(&self, ids: &[ProductId]) -> Result<CatalogSnapshot, CheckoutError>;
        async fn fetch_product(&self, id: &ProductId) -> Result<Option<Product>, CheckoutError>;
        async fn stock_record(&self, id: &ProductId) -> Result<Option<StockRecord>, CheckoutError>;
        async fn upsert_product(&self, product: NewProduct) -> Result<Product, CheckoutError>;
    }

    impl PaymentLedger for Backend {
        async fn insert_transaction(
            &self,
            transaction: NewPaymentTransaction,
        ) -> Result<(PaymentTransaction, bool), LedgerError>;
        async fn fetch_transaction_by_reference(
            &self,
            reference: &Reference,
        ) -> Result<Option<PaymentTransaction>, LedgerError>;
        async fn update_transaction_status(
            &self,
            reference: &Reference,
            status: TransactionStatus,
        ) -> Result<PaymentTransaction, LedgerError>;
        async fn attach_gateway_reference(
            &self,
            reference: &Reference,
            gateway_reference: &str,
        ) -> Result<(), LedgerError>;
    }

    impl EarningsLedger for Backend {
        async fn commission_rate(&self, seller_id: &str) -> Result<f64, LedgerError>;
        async fn record_earnings(&self, entries: &[EarningEntry]) -> Result<u64, LedgerError>;
        async fn earnings_for_order(&self, order_id: &OrderId) -> Result<Vec<SellerEarning>, LedgerError>;
    }

    impl SubscriptionStore for Backend {
        async fn activate_for_reference(
            &self,
            reference: &Reference,
            valid_until: DateTime<Utc>,
        ) -> Result<Vec<Subscription>, LedgerError>;
    }
}

mock! {
    pub Provider {}

    impl Clone for Provider {
        fn clone(&self) -> Self;
    }

    impl PaymentProvider for Provider {
        async fn initiate(&self, request: &ChargeRequest) -> Result<ChargeResponse, MomoGatewayError>;
        async fn check_status(&self, gateway_reference: &str) -> Result<PaymentStatus, MomoGatewayError>;
        fn mode(&self) -> ProviderMode;
    }
}
