use std::{fmt::Display, str::FromStr};

use checkout_engine::db_types::TransactionStatus;
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//--------------------------------------    Checkout route   ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    pub quantity: i64,
    /// The price the client displayed. Verified against the catalog; never used in totals.
    pub unit_price: i64,
    #[serde(default)]
    pub seller_id: String,
}

/// The `POST /checkout` body. When `payment` is present, a charge for the order total is initiated in the same
/// request and its details are returned alongside the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutPayload {
    pub buyer_id: String,
    pub items: Vec<CheckoutItem>,
    pub region: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub payment: Option<PaymentDetails>,
}

/// How the buyer wants to pay. `phone_number` + `network` selects USSD push; `email` selects hosted checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// The caller-generated idempotency key for the payment.
    pub reference: String,
}

//--------------------------------------    Payment route    ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentAction {
    Initiate,
    CheckStatus,
    CreateHostedCheckout,
}

impl PaymentAction {
    pub const VALID_SET: &'static str = "initiate, check-status, create-hosted-checkout";
}

impl FromStr for PaymentAction {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiate" => Ok(PaymentAction::Initiate),
            "check-status" => Ok(PaymentAction::CheckStatus),
            "create-hosted-checkout" => Ok(PaymentAction::CreateHostedCheckout),
            other => Err(ServerError::InvalidRequestBody(format!(
                "Unknown action '{other}'. Valid actions are: {}",
                PaymentAction::VALID_SET
            ))),
        }
    }
}

/// The `POST /payment` body. Which fields are required depends on `action`; the handler validates before any
/// provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub action: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    /// The buyer on whose behalf the charge is made. Supplied by the identity layer in production deployments.
    #[serde(default)]
    pub user_id: Option<String>,
}

//--------------------------------------    Webhook route    ---------------------------------------------------------

/// The webhook body the provider POSTs. Everything is optional at the serde level; the required-field gate runs in
/// the handler so a missing field produces a 400 with a named reason rather than a deserialization error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Amount in minor units.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Translates the provider's webhook status vocabulary into the internal one. The union of both providers'
/// vocabularies is accepted; anything else is a client error, not a crash.
pub fn map_webhook_status(status: &str) -> Result<TransactionStatus, ServerError> {
    match status.to_uppercase().as_str() {
        "COMPLETED" | "COMPLETE" | "SUCCESS" | "SETTLED" | "PAID" => Ok(TransactionStatus::Completed),
        "FAILED" | "DECLINED" | "TIMEOUT" | "EXPIRED" | "INSUFFICIENT_FUNDS" | "ABANDONED" => {
            Ok(TransactionStatus::Failed)
        },
        "CANCELLED" | "CANCELED" => Ok(TransactionStatus::Cancelled),
        "PENDING" | "PROCESSING" | "INPROGRESS" | "ACCEPTED" | "OPEN" | "CREATED" => {
            Ok(TransactionStatus::Processing)
        },
        other => Err(ServerError::InvalidRequestBody(format!("Unknown payment status '{other}'"))),
    }
}
