use actix_web::{http::StatusCode, web, web::ServiceConfig};
use checkout_engine::{
    db_types::{OrderStatus, ProductId},
    events::EventProducers,
    traits::CheckoutError,
    OrderFlowApi,
};
use mkt_common::Money;

use super::{
    helpers::{get_request, order_fixture, post_request},
    mocks::MockBackend,
};
use crate::routes::{CancelOrderRoute, OrderByIdRoute};

#[actix_web::test]
async fn fetch_an_existing_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/ord-1001", configure_fetch).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("ord-1001"));
    assert!(body.contains("prod-1"));
}

#[actix_web::test]
async fn fetch_an_unknown_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/orders/ord-nope", configure_fetch_missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("not found"));
}

#[actix_web::test]
async fn cancel_a_pending_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = post_request("/orders/ord-1001/cancel", serde_json::json!({}), &[], configure_cancel).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Cancelled"));
}

#[actix_web::test]
async fn cancelling_a_shipped_order_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request("/orders/ord-1001/cancel", serde_json::json!({}), &[], configure_cancel_shipped).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Shipped"));
}

fn configure_fetch(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    backend.expect_fetch_order().returning(|_| Ok(Some(order_fixture("ord-1001", OrderStatus::Pending))));
    backend.expect_fetch_order_items().returning(|order_id| {
        Ok(vec![checkout_engine::db_types::OrderItem {
            id: 1,
            order_id: order_id.clone(),
            product_id: ProductId::from("prod-1"),
            seller_id: "seller-1".to_string(),
            quantity: 2,
            unit_price: Money::from_units(50_000),
        }])
    });
    register_order_routes(cfg, backend);
}

fn configure_fetch_missing(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    backend.expect_fetch_order().returning(|_| Ok(None));
    register_order_routes(cfg, backend);
}

fn configure_cancel(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    backend.expect_cancel_order().returning(|_| Ok(order_fixture("ord-1001", OrderStatus::Cancelled)));
    register_order_routes(cfg, backend);
}

fn configure_cancel_shipped(cfg: &mut ServiceConfig) {
    let mut backend = MockBackend::new();
    backend.expect_cancel_order().returning(|order_id| {
        Err(CheckoutError::IllegalTransition {
            order_id: order_id.clone(),
            from: OrderStatus::Shipped,
            to: OrderStatus::Cancelled,
        })
    });
    register_order_routes(cfg, backend);
}

fn register_order_routes(cfg: &mut ServiceConfig, backend: MockBackend) {
    let api = OrderFlowApi::new(backend, EventProducers::default());
    cfg.app_data(web::Data::new(api))
        .service(OrderByIdRoute::<MockBackend>::new())
        .service(CancelOrderRoute::<MockBackend>::new());
}
