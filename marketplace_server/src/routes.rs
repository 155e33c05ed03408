//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are async so that database and provider calls never block a worker thread.
use std::str::FromStr;

use actix_web::{get, web, HttpResponse, Responder};
use checkout_engine::{
    db_types::{CartItem, Order, OrderId, Reference},
    order_objects::CheckoutRequest,
    OrderFlowApi,
    ReconciliationApi,
    ReconciliationOutcome,
};
use log::*;
use mkt_common::{Money, TZS_CURRENCY_CODE};
use momo_gateway::{EmailAddress, Network, PaymentProvider, PhoneNumber};
use serde_json::json;

use crate::{
    data_objects::{map_webhook_status, CheckoutPayload, JsonResponse, PaymentAction, PaymentDetails, PaymentRequest, WebhookPayload},
    errors::ServerError,
    payments::{MarketplaceBackend, PaymentApi},
    poller::{spawn_status_poller, PollerSettings},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal where $($param:ident: $bound:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<$($param,)+>($(core::marker::PhantomData<fn() -> $param>,)+);}
        paste::paste! { impl<$($param,)+> [<$name:camel Route>]<$($param,)+> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($(core::marker::PhantomData::<fn() -> $param>,)+)
            }
        }}
        paste::paste! { impl<$($param,)+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$($param,)+>
        where
            $($param: $bound + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<$($param,)+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" where B: MarketplaceBackend, U: PaymentProvider, H: PaymentProvider);
/// Route handler for the checkout endpoint.
///
/// Validates the cart, verifies the client's displayed prices against the catalog, reserves stock and creates a
/// pending order. All cart problems are collected and returned in a single 400 response; a tampered price never
/// reserves stock. When the payload carries a `payment` block, a charge for the order total is initiated in the
/// same request and its details are returned alongside the order.
pub async fn checkout<B: MarketplaceBackend, U: PaymentProvider + 'static, H: PaymentProvider + 'static>(
    orders: web::Data<OrderFlowApi<B>>,
    payments: web::Data<PaymentApi<B, U, H>>,
    poller: web::Data<PollerSettings>,
    body: web::Json<CheckoutPayload>,
) -> Result<HttpResponse, ServerError> {
    let payload = body.into_inner();
    trace!("🛒️ Checkout request from buyer {} with {} item(s)", payload.buyer_id, payload.items.len());
    let items = payload
        .items
        .into_iter()
        .map(|i| CartItem {
            product_id: i.product_id.into(),
            quantity: i.quantity,
            unit_price: Money::from(i.unit_price),
            seller_id: i.seller_id,
        })
        .collect();
    let request = CheckoutRequest {
        buyer_id: payload.buyer_id,
        items,
        region: payload.region,
        coupon_code: payload.coupon_code,
    };
    let outcome = orders.checkout(request).await?;
    info!("🛒️ Order {} created for buyer {}. Total: {}", outcome.order.order_id, outcome.order.buyer_id, outcome.order.total);
    let payment = match payload.payment {
        Some(details) => Some(initiate_payment_for_order(payments, &outcome.order, details, *poller.as_ref()).await?),
        None => None,
    };
    Ok(HttpResponse::Ok().json(json!({
        "order": outcome.order,
        "pricing": outcome.pricing,
        "payment": payment,
    })))
}

/// Kicks off the charge for a freshly created order. The payment mode is inferred from the supplied details:
/// a phone number and network selects USSD push, an email selects hosted checkout.
async fn initiate_payment_for_order<B: MarketplaceBackend, U: PaymentProvider + 'static, H: PaymentProvider + 'static>(
    payments: web::Data<PaymentApi<B, U, H>>,
    order: &Order,
    details: PaymentDetails,
    poller: PollerSettings,
) -> Result<serde_json::Value, ServerError> {
    let reference = Reference::from(details.reference);
    let description = format!("Payment for order {}", order.order_id);
    let (transaction, response) = match (details.phone_number, details.network, details.email) {
        (Some(phone), Some(network), _) => {
            let phone = PhoneNumber::new(&phone)?;
            let network = Network::from_str(&network)?;
            let result = payments
                .initiate_ussd(
                    &order.buyer_id,
                    order.total,
                    phone,
                    network,
                    &reference,
                    &description,
                    Some(order.order_id.clone()),
                )
                .await?;
            if !result.0.status.is_terminal() {
                spawn_status_poller(payments.clone(), reference.clone(), poller);
            }
            result
        },
        (None, None, Some(email)) => {
            let email = EmailAddress::new(&email)?;
            payments
                .create_hosted_checkout(
                    &order.buyer_id,
                    order.total,
                    email,
                    &reference,
                    &description,
                    Some(order.order_id.clone()),
                )
                .await?
        },
        _ => {
            return Err(ServerError::InvalidRequestBody(
                "Payment details must carry either phone_number and network, or email".to_string(),
            ))
        },
    };
    Ok(json!({
        "reference": transaction.reference,
        "status": transaction.status,
        "transaction_id": response.transaction_id,
        "payment_url": response.payment_url,
    }))
}

//----------------------------------------------   Payment  ----------------------------------------------------
route!(payment => Post "/payment" where B: MarketplaceBackend, U: PaymentProvider, H: PaymentProvider);
/// Route handler for the payment endpoint.
///
/// A single dispatch endpoint keyed on `action`:
/// * `initiate` starts a USSD push charge on the payer's handset.
/// * `check-status` polls the provider for the current status of a charge and applies any change.
/// * `create-hosted-checkout` creates a provider-hosted payment page and returns its URL.
///
/// All field validation happens before any provider call, so a malformed request costs nothing.
pub async fn payment<B: MarketplaceBackend, U: PaymentProvider + 'static, H: PaymentProvider + 'static>(
    api: web::Data<PaymentApi<B, U, H>>,
    poller: web::Data<PollerSettings>,
    body: web::Json<PaymentRequest>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let action = PaymentAction::from_str(&request.action)?;
    debug!("💳️ Payment request: {action:?}");
    match action {
        PaymentAction::Initiate => initiate_payment(api, request, *poller.as_ref()).await,
        PaymentAction::CheckStatus => check_payment_status(api.as_ref(), request).await,
        PaymentAction::CreateHostedCheckout => create_hosted_checkout(api.as_ref(), request).await,
    }
}

async fn initiate_payment<B: MarketplaceBackend, U: PaymentProvider + 'static, H: PaymentProvider + 'static>(
    api: web::Data<PaymentApi<B, U, H>>,
    request: PaymentRequest,
    poller: PollerSettings,
) -> Result<HttpResponse, ServerError> {
    let amount = required_amount(&request)?;
    let phone = request
        .phone_number
        .as_deref()
        .ok_or_else(|| ServerError::InvalidRequestBody("phone_number is required to initiate a payment".to_string()))?;
    let phone = PhoneNumber::new(phone)?;
    let network = request
        .network
        .as_deref()
        .ok_or_else(|| ServerError::InvalidRequestBody("network is required to initiate a payment".to_string()))?;
    let network = Network::from_str(network)?;
    let (user_id, reference, description, order_id) = common_payment_fields(request)?;
    let (transaction, response) =
        api.initiate_ussd(&user_id, amount, phone, network, &reference, &description, order_id).await?;
    info!("💳️ USSD charge initiated for {reference}: provider tx {}", response.transaction_id);
    if !transaction.status.is_terminal() {
        spawn_status_poller(api.clone(), reference, poller);
    }
    Ok(HttpResponse::Ok().json(json!({
        "reference": transaction.reference,
        "status": transaction.status,
        "transaction_id": response.transaction_id,
    })))
}

async fn check_payment_status<B: MarketplaceBackend, U: PaymentProvider, H: PaymentProvider>(
    api: &PaymentApi<B, U, H>,
    request: PaymentRequest,
) -> Result<HttpResponse, ServerError> {
    let reference = request
        .reference
        .ok_or_else(|| ServerError::InvalidRequestBody("reference is required to check a payment status".to_string()))?;
    let reference = Reference::from(reference);
    let (transaction, outcome) = api.check_status(&reference).await?;
    if let Some(outcome) = &outcome {
        log_reconciliation_outcome(outcome);
    }
    Ok(HttpResponse::Ok().json(json!({
        "reference": transaction.reference,
        "status": transaction.status,
        "order_id": transaction.order_id,
    })))
}

async fn create_hosted_checkout<B: MarketplaceBackend, U: PaymentProvider, H: PaymentProvider>(
    api: &PaymentApi<B, U, H>,
    request: PaymentRequest,
) -> Result<HttpResponse, ServerError> {
    let amount = required_amount(&request)?;
    let email = request
        .email
        .as_deref()
        .ok_or_else(|| ServerError::InvalidRequestBody("email is required for a hosted checkout".to_string()))?;
    let email = EmailAddress::new(email)?;
    let (user_id, reference, description, order_id) = common_payment_fields(request)?;
    let (transaction, response) =
        api.create_hosted_checkout(&user_id, amount, email, &reference, &description, order_id).await?;
    info!("💳️ Hosted checkout created for {reference}: session {}", response.transaction_id);
    Ok(HttpResponse::Ok().json(json!({
        "reference": transaction.reference,
        "status": transaction.status,
        "transaction_id": response.transaction_id,
        "payment_url": response.payment_url,
    })))
}

fn required_amount(request: &PaymentRequest) -> Result<Money, ServerError> {
    if let Some(currency) = request.currency.as_deref() {
        if currency != TZS_CURRENCY_CODE {
            return Err(ServerError::InvalidRequestBody(format!(
                "Unsupported currency '{currency}'. Only {TZS_CURRENCY_CODE} is accepted"
            )));
        }
    }
    let amount = request
        .amount
        .ok_or_else(|| ServerError::InvalidRequestBody("amount is required".to_string()))?;
    if amount <= 0 {
        return Err(ServerError::InvalidRequestBody(format!("amount must be positive, got {amount}")));
    }
    Ok(Money::from(amount))
}

fn common_payment_fields(request: PaymentRequest) -> Result<(String, Reference, String, Option<OrderId>), ServerError> {
    let user_id = request
        .user_id
        .ok_or_else(|| ServerError::InvalidRequestBody("user_id is required".to_string()))?;
    let reference = request
        .reference
        .ok_or_else(|| ServerError::InvalidRequestBody("reference is required".to_string()))?;
    let description = request.description.unwrap_or_else(|| "Marketplace payment".to_string());
    let order_id = request.order_id.map(OrderId::from);
    Ok((user_id, Reference::from(reference), description, order_id))
}

//----------------------------------------------   Webhook  ----------------------------------------------------
// The webhook is registered manually in `server.rs` because its HMAC middleware carries the runtime secret.
/// Route handler for the payment provider webhook.
///
/// The HMAC signature has already been verified by the time this handler runs; unsigned or mis-signed deliveries
/// were rejected with a 401 at the middleware. What remains is the required-field gate, the status translation and
/// the hand-off to reconciliation, which enforces the amount check and the idempotency guarantee. A redelivered
/// webhook for a completed payment gets a 200 and changes nothing.
pub async fn webhook<B: MarketplaceBackend>(
    api: web::Data<ReconciliationApi<B>>,
    body: web::Json<WebhookPayload>,
) -> Result<HttpResponse, ServerError> {
    let payload = body.into_inner();
    let reference = payload
        .reference
        .ok_or_else(|| ServerError::InvalidRequestBody("Webhook payload is missing the reference field".to_string()))?;
    let status = payload
        .status
        .ok_or_else(|| ServerError::InvalidRequestBody("Webhook payload is missing the status field".to_string()))?;
    let status = map_webhook_status(&status)?;
    let reference = Reference::from(reference);
    debug!("🔁️ Webhook for {reference}: {status}");
    let reported_amount = payload.amount.map(Money::from);
    let outcome = api.apply_payment_outcome(&reference, status, reported_amount).await?;
    log_reconciliation_outcome(&outcome);
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Webhook for {reference} processed"))))
}

fn log_reconciliation_outcome(outcome: &ReconciliationOutcome) {
    match outcome {
        ReconciliationOutcome::AlreadyCompleted(tx) => {
            info!("🔁️ Transaction {} was already completed. Nothing to do", tx.reference)
        },
        ReconciliationOutcome::StatusRecorded(tx) => {
            info!("🔁️ Transaction {} is now {}", tx.reference, tx.status)
        },
        ReconciliationOutcome::Applied { transaction, order } => match order {
            Some(order) => info!(
                "🔁️ Transaction {} is {} and order {} is now {}",
                transaction.reference, transaction.status, order.order_id, order.status
            ),
            None => info!("🔁️ Transaction {} is {} (no order attached)", transaction.reference, transaction.status),
        },
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" where B: MarketplaceBackend);
/// Route handler for fetching a single order, with its line items.
pub async fn order_by_id<B: MarketplaceBackend>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("📦️ GET order {order_id}");
    let order = api
        .fetch_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} not found")))?;
    let items = api.db().fetch_order_items(&order_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "order": order, "items": items })))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" where B: MarketplaceBackend);
/// Route handler for cancelling an order.
///
/// Cancelling releases the order's stock reservations. Only orders that have not shipped can be cancelled; a later
/// state gets a 409.
pub async fn cancel_order<B: MarketplaceBackend>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("📦️ Cancel order {order_id}");
    let order = api.cancel_order(&order_id).await?;
    info!("📦️ Order {} cancelled. Reservations released", order.order_id);
    Ok(HttpResponse::Ok().json(order))
}
