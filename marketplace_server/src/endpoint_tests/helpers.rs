use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
    ResponseError,
};
use checkout_engine::db_types::{Order, OrderId, OrderStatus, PaymentTransaction, Reference, TransactionStatus};
use chrono::Utc;
use mkt_common::{Money, TZS_CURRENCY_CODE};

pub async fn get_request(path: &str, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    send_request(TestRequest::get().uri(path), configure).await
}

pub async fn post_request(
    path: &str,
    body: serde_json::Value,
    headers: &[(&str, &str)],
    configure: fn(&mut ServiceConfig),
) -> (StatusCode, String) {
    let mut req = TestRequest::post().uri(path).set_json(body);
    for (name, value) in headers {
        req = req.insert_header((*name, *value));
    }
    send_request(req, configure).await
}

/// Handler errors surface as `Err` from the test service before the HTTP layer renders them, so both arms are
/// normalized into the (status, body) the client would see.
async fn send_request(req: TestRequest, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let (_, res) = res.into_parts();
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
        Err(e) => {
            let res = e.as_response_error().error_response();
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
    }
}

pub fn order_fixture(order_id: &str, status: OrderStatus) -> Order {
    let now = Utc::now();
    Order {
        id: 1,
        order_id: OrderId::from(order_id.to_string()),
        buyer_id: "buyer-1".to_string(),
        subtotal: Money::from_units(100_000),
        tax: Money::from_units(18_000),
        shipping: Money::from_units(5_500),
        discount: Money::from(0),
        total: Money::from_units(123_500),
        currency: TZS_CURRENCY_CODE.to_string(),
        status,
        created_at: now,
        updated_at: now,
    }
}

pub fn transaction_fixture(reference: &str, status: TransactionStatus, order_id: Option<&str>) -> PaymentTransaction {
    let now = Utc::now();
    PaymentTransaction {
        id: 1,
        user_id: "buyer-1".to_string(),
        order_id: order_id.map(|id| OrderId::from(id.to_string())),
        amount: Money::from_units(123_500),
        currency: TZS_CURRENCY_CODE.to_string(),
        network: Some("MPESA".to_string()),
        phone_number: Some("255755123456".to_string()),
        reference: Reference::from(reference),
        gateway_reference: Some("prov-tx-1".to_string()),
        status,
        created_at: now,
        updated_at: now,
    }
}
