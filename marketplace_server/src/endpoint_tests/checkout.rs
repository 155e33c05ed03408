use actix_web::{http::StatusCode, web, web::ServiceConfig};
use checkout_engine::{
    db_types::{OrderStatus, Product, ProductId, StockRecord, TransactionStatus},
    events::EventProducers,
    pricing::CatalogSnapshot,
    OrderFlowApi,
    ReconciliationApi,
};
use chrono::Utc;
use mkt_common::Money;
use momo_gateway::{ChargeResponse, PaymentStatus};

use super::{
    helpers::{order_fixture, post_request, transaction_fixture},
    mocks::{MockBackend, MockProvider},
};
use crate::{payments::PaymentApi, poller::PollerSettings, routes::CheckoutRoute};

fn cart_body(unit_price: i64) -> serde_json::Value {
    serde_json::json!({
        "buyer_id": "buyer-1",
        "items": [
            { "product_id": "prod-1", "quantity": 2, "unit_price": unit_price, "seller_id": "seller-1" }
        ],
        "region": "Dodoma",
    })
}

fn catalog_with_product() -> CatalogSnapshot {
    let now = Utc::now();
    let product = Product {
        id: ProductId::from("prod-1"),
        name: "Kitenge fabric".to_string(),
        price: Money::from_units(50_000),
        seller_id: "seller-1".to_string(),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let stock = StockRecord { product_id: ProductId::from("prod-1"), stock: 10, reserved: 0, updated_at: now };
    CatalogSnapshot::new(vec![(product, stock)])
}

#[actix_web::test]
async fn an_empty_cart_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "buyer_id": "buyer-1", "items": [], "region": "Dodoma" });
    let (status, body) = post_request("/checkout", body, &[], configure_rejection).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("The cart is empty"));
}

#[actix_web::test]
async fn a_tampered_price_is_rejected_with_the_mismatch() {
    let _ = env_logger::try_init().ok();
    // The catalog price is 50,000 TSh; the client claims 48,000. No order row may be created.
    let (status, body) = post_request("/checkout", cart_body(4_800_000), &[], configure_rejection).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("price_mismatches"));
    assert!(body.contains("prod-1"));
}

#[actix_web::test]
async fn a_valid_cart_creates_a_pending_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/checkout", cart_body(5_000_000), &[], configure_order_creation).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("ord-1001"));
    assert!(body.contains("pricing"));
}

#[actix_web::test]
async fn checkout_with_payment_details_initiates_the_charge() {
    let _ = env_logger::try_init().ok();
    let mut body = cart_body(5_000_000);
    body["payment"] = serde_json::json!({
        "phone_number": "255755123456",
        "network": "MPESA",
        "reference": "pay-1",
    });
    let (status, body) = post_request("/checkout", body, &[], configure_order_with_payment).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("ord-1001"));
    assert!(body.contains("prov-tx-9"));
}

fn configure_rejection(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    backend.expect_catalog_snapshot().returning(|_| Ok(catalog_with_product()));
    register_checkout(cfg, backend, MockBackend::new(), MockBackend::new(), MockProvider::new())
}

fn configure_order_creation(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    backend.expect_catalog_snapshot().returning(|_| Ok(catalog_with_product()));
    backend
        .expect_create_order()
        .times(1)
        .withf(|order| order.items.len() == 1 && order.items[0].unit_price == Money::from_units(50_000))
        .returning(|_| Ok(order_fixture("ord-1001", OrderStatus::Pending)));
    register_checkout(cfg, backend, MockBackend::new(), MockBackend::new(), MockProvider::new())
}

fn configure_order_with_payment(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    backend.expect_catalog_snapshot().returning(|_| Ok(catalog_with_product()));
    backend.expect_create_order().times(1).returning(|_| Ok(order_fixture("ord-1001", OrderStatus::Pending)));
    let mut ledger = MockBackend::new();
    ledger
        .expect_insert_transaction()
        .times(1)
        .withf(|tx| tx.reference.as_str() == "pay-1" && tx.order_id.is_some())
        .returning(|_| Ok((transaction_fixture("pay-1", TransactionStatus::Pending, Some("ord-1001")), true)));
    ledger.expect_attach_gateway_reference().times(1).returning(|_, _| Ok(()));
    let mut recon = MockBackend::new();
    recon
        .expect_fetch_transaction_by_reference()
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Processing, Some("ord-1001")))));
    recon
        .expect_update_transaction_status()
        .times(1)
        .returning(|_, _| Ok(transaction_fixture("pay-1", TransactionStatus::Pending, Some("ord-1001"))));
    let mut ussd = MockProvider::new();
    ussd.expect_initiate().times(1).returning(|_| {
        Ok(ChargeResponse {
            transaction_id: "prov-tx-9".to_string(),
            status: PaymentStatus::Pending,
            payment_url: None,
        })
    });
    register_checkout(cfg, backend, ledger, recon, ussd)
}

fn register_checkout(
    cfg: &mut ServiceConfig,
    backend: MockBackend,
    ledger: MockBackend,
    recon: MockBackend,
    ussd: MockProvider,
) {
    let orders = OrderFlowApi::new(backend, EventProducers::default());
    let reconciliation = ReconciliationApi::new(recon, EventProducers::default());
    let payments = PaymentApi::new(ledger, ussd, MockProvider::new(), reconciliation);
    let poller = PollerSettings { attempts: 0, interval_seconds: 1 };
    cfg.app_data(web::Data::new(orders))
        .app_data(web::Data::new(payments))
        .app_data(web::Data::new(poller))
        .service(CheckoutRoute::<MockBackend, MockProvider, MockProvider>::new());
}
