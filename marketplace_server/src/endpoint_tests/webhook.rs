use actix_web::{http::StatusCode, web, web::ServiceConfig};
use checkout_engine::{
    db_types::{OrderStatus, ProductId, TransactionStatus},
    events::EventProducers,
    ReconciliationApi,
};
use mkt_common::{Money, Secret};
use mockall::Sequence;

use super::{
    helpers::{order_fixture, post_request, transaction_fixture},
    mocks::MockBackend,
};
use crate::{
    config::WEBHOOK_SIGNATURE_HEADER,
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    routes::webhook,
};

const TEST_SECRET: &str = "webhook-test-secret";

/// The stored transaction amount from [`transaction_fixture`], in minor units.
const STORED_AMOUNT: i64 = 12_350_000;

fn sign(body: &serde_json::Value) -> String {
    let payload = serde_json::to_string(body).unwrap();
    calculate_hmac(TEST_SECRET, payload.as_bytes())
}

#[actix_web::test]
async fn webhook_without_a_signature_is_unauthorized() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "reference": "pay-1", "status": "SUCCESS" });
    let (status, _) = post_request("/webhook", body, &[], configure_untouched).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn webhook_with_a_bad_signature_is_unauthorized() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "reference": "pay-1", "status": "SUCCESS" });
    let headers = [(WEBHOOK_SIGNATURE_HEADER, "deadbeef")];
    let (status, _) = post_request("/webhook", body, &headers, configure_untouched).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn webhook_missing_the_reference_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "status": "SUCCESS", "amount": STORED_AMOUNT });
    let signature = sign(&body);
    let headers = [(WEBHOOK_SIGNATURE_HEADER, signature.as_str())];
    let (status, body) = post_request("/webhook", body, &headers, configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("reference"));
}

#[actix_web::test]
async fn webhook_with_an_unknown_status_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "reference": "pay-1", "status": "GARBLED" });
    let signature = sign(&body);
    let headers = [(WEBHOOK_SIGNATURE_HEADER, signature.as_str())];
    let (status, body) = post_request("/webhook", body, &headers, configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("GARBLED"));
}

#[actix_web::test]
async fn webhook_for_an_unknown_reference_is_not_found() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "reference": "pay-nope", "status": "SUCCESS" });
    let signature = sign(&body);
    let headers = [(WEBHOOK_SIGNATURE_HEADER, signature.as_str())];
    let (status, body) = post_request("/webhook", body, &headers, configure_unknown_reference).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("pay-nope"));
}

#[actix_web::test]
async fn webhook_with_a_mismatched_amount_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "reference": "pay-1", "status": "SUCCESS", "amount": STORED_AMOUNT + 101 });
    let signature = sign(&body);
    let headers = [(WEBHOOK_SIGNATURE_HEADER, signature.as_str())];
    // The mock has no update expectation, so a mismatch reaching the ledger would fail the test.
    let (status, body) = post_request("/webhook", body, &headers, configure_pending_transaction).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("mismatch"));
}

#[actix_web::test]
async fn redelivered_webhook_for_a_completed_payment_is_ok() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "reference": "pay-1", "status": "SUCCESS", "amount": STORED_AMOUNT });
    let signature = sign(&body);
    let headers = [(WEBHOOK_SIGNATURE_HEADER, signature.as_str())];
    let (status, body) = post_request("/webhook", body, &headers, configure_completed_transaction).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("processed"));
}

#[actix_web::test]
async fn completed_webhook_confirms_the_order_and_credits_sellers() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "reference": "pay-1", "status": "SETTLED", "amount": STORED_AMOUNT });
    let signature = sign(&body);
    let headers = [(WEBHOOK_SIGNATURE_HEADER, signature.as_str())];
    let (status, body) = post_request("/webhook", body, &headers, configure_completion_flow).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("processed"));
}

#[actix_web::test]
async fn failed_webhook_marks_the_order_payment_failed() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "reference": "pay-1", "status": "DECLINED", "amount": STORED_AMOUNT });
    let signature = sign(&body);
    let headers = [(WEBHOOK_SIGNATURE_HEADER, signature.as_str())];
    let (status, body) = post_request("/webhook", body, &headers, configure_failure_flow).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("processed"));
}

fn configure_untouched(cfg: &mut ServiceConfig) {
    register_webhook(cfg, MockBackend::new());
}

fn configure_unknown_reference(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    backend.expect_fetch_transaction_by_reference().returning(|_| Ok(None));
    register_webhook(cfg, backend);
}

fn configure_pending_transaction(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_transaction_by_reference()
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Processing, Some("ord-1001")))));
    register_webhook(cfg, backend);
}

fn configure_completed_transaction(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_transaction_by_reference()
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Completed, Some("ord-1001")))));
    register_webhook(cfg, backend);
}

fn configure_completion_flow(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    let mut seq = Sequence::new();
    backend
        .expect_fetch_transaction_by_reference()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Processing, Some("ord-1001")))));
    backend
        .expect_update_transaction_status()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|_, status| *status == TransactionStatus::Completed)
        .returning(|_, _| Ok(transaction_fixture("pay-1", TransactionStatus::Processing, Some("ord-1001"))));
    backend
        .expect_fetch_transaction_by_reference()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Completed, Some("ord-1001")))));
    backend.expect_activate_for_reference().returning(|_, _| Ok(Vec::new()));
    backend.expect_confirm_order().returning(|_| Ok(order_fixture("ord-1001", OrderStatus::Confirmed)));
    backend.expect_fetch_order_items().returning(|order_id| {
        Ok(vec![checkout_engine::db_types::OrderItem {
            id: 7,
            order_id: order_id.clone(),
            product_id: ProductId::from("prod-1"),
            seller_id: "seller-1".to_string(),
            quantity: 2,
            unit_price: Money::from_units(50_000),
        }])
    });
    backend.expect_commission_rate().returning(|_| Ok(0.15));
    backend
        .expect_record_earnings()
        .times(1)
        .withf(|entries| entries.len() == 1 && entries[0].seller_id == "seller-1")
        .returning(|entries| Ok(entries.len() as u64));
    backend.expect_earnings_for_order().returning(|_| Ok(Vec::new()));
    register_webhook(cfg, backend);
}

fn configure_failure_flow(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    let mut seq = Sequence::new();
    backend
        .expect_fetch_transaction_by_reference()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Processing, Some("ord-1001")))));
    backend
        .expect_update_transaction_status()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|_, status| *status == TransactionStatus::Failed)
        .returning(|_, _| Ok(transaction_fixture("pay-1", TransactionStatus::Processing, Some("ord-1001"))));
    backend
        .expect_fetch_transaction_by_reference()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Failed, Some("ord-1001")))));
    backend.expect_mark_payment_failed().returning(|_| Ok(order_fixture("ord-1001", OrderStatus::PaymentFailed)));
    register_webhook(cfg, backend);
}

fn register_webhook(cfg: &mut ServiceConfig, backend: MockBackend) {
    let api = ReconciliationApi::new(backend, EventProducers::default());
    let secret = Secret::new(TEST_SECRET.to_string());
    cfg.app_data(web::Data::new(api)).service(
        web::resource("/webhook")
            .wrap(HmacMiddlewareFactory::new(WEBHOOK_SIGNATURE_HEADER, secret))
            .route(web::post().to(webhook::<MockBackend>)),
    );
}
