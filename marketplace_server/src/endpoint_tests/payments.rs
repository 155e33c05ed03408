use actix_web::{http::StatusCode, web, web::ServiceConfig};
use checkout_engine::{db_types::TransactionStatus, events::EventProducers, ReconciliationApi};
use mockall::Sequence;
use momo_gateway::{ChargeResponse, PaymentStatus};

use super::{
    helpers::{post_request, transaction_fixture},
    mocks::{MockBackend, MockProvider},
};
use crate::{payments::PaymentApi, poller::PollerSettings, routes::PaymentRoute};

#[actix_web::test]
async fn an_unknown_action_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "action": "refund" });
    let (status, body) = post_request("/payment", body, &[], configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("initiate, check-status, create-hosted-checkout"));
}

#[actix_web::test]
async fn initiating_without_an_amount_is_rejected() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "action": "initiate",
        "phone_number": "255755123456",
        "network": "MPESA",
        "reference": "pay-1",
        "user_id": "buyer-1",
    });
    let (status, body) = post_request("/payment", body, &[], configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("amount"));
}

#[actix_web::test]
async fn a_malformed_phone_number_never_reaches_the_provider() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "action": "initiate",
        "amount": 12_350_000,
        "phone_number": "0755123456",
        "network": "MPESA",
        "reference": "pay-1",
        "user_id": "buyer-1",
    });
    // The provider mocks carry no expectations, so any call would fail the test.
    let (status, body) = post_request("/payment", body, &[], configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("255"));
}

#[actix_web::test]
async fn an_unknown_network_never_reaches_the_provider() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "action": "initiate",
        "amount": 12_350_000,
        "phone_number": "255755123456",
        "network": "VODAPESA",
        "reference": "pay-1",
        "user_id": "buyer-1",
    });
    let (status, body) = post_request("/payment", body, &[], configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("VODAPESA"));
}

#[actix_web::test]
async fn initiate_a_ussd_charge() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "action": "initiate",
        "amount": 12_350_000,
        "phone_number": "255755123456",
        "network": "MPESA",
        "reference": "pay-1",
        "user_id": "buyer-1",
    });
    let (status, body) = post_request("/payment", body, &[], configure_ussd_initiation).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("prov-tx-9"));
    assert!(body.contains("Processing"));
}

#[actix_web::test]
async fn create_a_hosted_checkout_session() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({
        "action": "create-hosted-checkout",
        "amount": 12_350_000,
        "email": "buyer@example.co.tz",
        "reference": "pay-1",
        "user_id": "buyer-1",
    });
    let (status, body) = post_request("/payment", body, &[], configure_hosted_session).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("https://pay.example.co.tz/session/sess-1"));
}

#[actix_web::test]
async fn check_status_for_an_unknown_reference() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "action": "check-status", "reference": "pay-nope" });
    let (status, body) = post_request("/payment", body, &[], configure_unknown_reference).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("pay-nope"));
}

#[actix_web::test]
async fn check_status_short_circuits_on_a_settled_payment() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "action": "check-status", "reference": "pay-1" });
    // The provider mocks carry no expectations: a settled payment must not be re-polled.
    let (status, body) = post_request("/payment", body, &[], configure_settled_transaction).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Completed"));
}

#[actix_web::test]
async fn check_status_applies_a_provider_status_change() {
    let _ = env_logger::try_init().ok();
    let body = serde_json::json!({ "action": "check-status", "reference": "pay-1" });
    let (status, body) = post_request("/payment", body, &[], configure_settlement_poll).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Completed"));
}

fn configure_untouched(cfg: &mut ServiceConfig) {
    register_payment_routes(cfg, MockBackend::new(), MockBackend::new(), MockProvider::new(), MockProvider::new());
}

fn configure_ussd_initiation(cfg: &mut ServiceConfig) {
    let mut ledger = MockBackend::new();
    ledger
        .expect_insert_transaction()
        .times(1)
        .withf(|tx| tx.reference.as_str() == "pay-1")
        .returning(|_| Ok((transaction_fixture("pay-1", TransactionStatus::Pending, None), true)));
    ledger
        .expect_attach_gateway_reference()
        .times(1)
        .withf(|_, gateway_reference| gateway_reference == "prov-tx-9")
        .returning(|_, _| Ok(()));
    let mut recon = MockBackend::new();
    recon
        .expect_fetch_transaction_by_reference()
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Processing, None))));
    recon
        .expect_update_transaction_status()
        .times(1)
        .withf(|_, status| *status == TransactionStatus::Processing)
        .returning(|_, _| Ok(transaction_fixture("pay-1", TransactionStatus::Pending, None)));
    let mut ussd = MockProvider::new();
    ussd.expect_initiate().times(1).returning(|_| {
        Ok(ChargeResponse {
            transaction_id: "prov-tx-9".to_string(),
            status: PaymentStatus::Pending,
            payment_url: None,
        })
    });
    register_payment_routes(cfg, ledger, recon, ussd, MockProvider::new());
}

fn configure_hosted_session(cfg: &mut ServiceConfig) {
    let mut ledger = MockBackend::new();
    ledger
        .expect_insert_transaction()
        .times(1)
        .returning(|_| Ok((transaction_fixture("pay-1", TransactionStatus::Pending, None), true)));
    ledger.expect_attach_gateway_reference().times(1).returning(|_, _| Ok(()));
    let mut recon = MockBackend::new();
    recon
        .expect_fetch_transaction_by_reference()
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Processing, None))));
    recon
        .expect_update_transaction_status()
        .times(1)
        .returning(|_, _| Ok(transaction_fixture("pay-1", TransactionStatus::Pending, None)));
    let mut hosted = MockProvider::new();
    hosted.expect_initiate().times(1).returning(|_| {
        Ok(ChargeResponse {
            transaction_id: "sess-1".to_string(),
            status: PaymentStatus::Pending,
            payment_url: Some("https://pay.example.co.tz/session/sess-1".to_string()),
        })
    });
    register_payment_routes(cfg, ledger, recon, MockProvider::new(), hosted);
}

fn configure_unknown_reference(cfg: &mut ServiceConfig) {
    let mut ledger = MockBackend::new();
    ledger.expect_fetch_transaction_by_reference().returning(|_| Ok(None));
    register_payment_routes(cfg, ledger, MockBackend::new(), MockProvider::new(), MockProvider::new());
}

fn configure_settled_transaction(cfg: &mut ServiceConfig) {
    let mut ledger = MockBackend::new();
    ledger
        .expect_fetch_transaction_by_reference()
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Completed, None))));
    register_payment_routes(cfg, ledger, MockBackend::new(), MockProvider::new(), MockProvider::new());
}

fn configure_settlement_poll(cfg: &mut ServiceConfig) {
    let mut ledger = MockBackend::new();
    ledger
        .expect_fetch_transaction_by_reference()
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Processing, None))));
    let mut recon = MockBackend::new();
    let mut seq = Sequence::new();
    recon
        .expect_fetch_transaction_by_reference()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Processing, None))));
    recon
        .expect_update_transaction_status()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|_, status| *status == TransactionStatus::Completed)
        .returning(|_, _| Ok(transaction_fixture("pay-1", TransactionStatus::Processing, None)));
    recon
        .expect_fetch_transaction_by_reference()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Some(transaction_fixture("pay-1", TransactionStatus::Completed, None))));
    recon.expect_activate_for_reference().returning(|_, _| Ok(Vec::new()));
    let mut ussd = MockProvider::new();
    ussd
        .expect_check_status()
        .times(1)
        .withf(|gateway_reference| gateway_reference == "prov-tx-1")
        .returning(|_| Ok(PaymentStatus::Completed));
    register_payment_routes(cfg, ledger, recon, ussd, MockProvider::new());
}

fn register_payment_routes(
    cfg: &mut ServiceConfig,
    ledger: MockBackend,
    recon: MockBackend,
    ussd: MockProvider,
    hosted: MockProvider,
) {
    let reconciliation = ReconciliationApi::new(recon, EventProducers::default());
    let api = PaymentApi::new(ledger, ussd, hosted, reconciliation);
    // A zero-attempt budget keeps background polls out of these tests.
    let poller = PollerSettings { attempts: 0, interval_seconds: 1 };
    cfg.app_data(web::Data::new(api))
        .app_data(web::Data::new(poller))
        .service(PaymentRoute::<MockBackend, MockProvider, MockProvider>::new());
}
