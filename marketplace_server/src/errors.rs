use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use checkout_engine::{
    order_objects::CheckoutRejection,
    traits::{CheckoutError, LedgerError},
    OrderFlowError,
    ReconciliationError,
};
use momo_gateway::MomoGatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    /// The request is legal but the resource is in the wrong state for it, e.g. cancelling a shipped order.
    #[error("Conflicting state. {0}")]
    Conflict(String),
    #[error("Unauthorized.")]
    Unauthorized,
    /// The cart failed validation or price verification. Carries the complete problem list for the response body.
    #[error("Checkout rejected: {} cart error(s), {} price mismatch(es)", .0.cart_errors.len(), .0.price_mismatches.len())]
    CheckoutRejected(CheckoutRejection),
    #[error("Payment provider error. {0}")]
    PaymentProvider(#[from] MomoGatewayError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::CheckoutRejected(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentProvider(e) => match e {
                MomoGatewayError::Validation(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            // The full problem list so the client can show everything in one round trip.
            Self::CheckoutRejected(rejection) => serde_json::json!({
                "error": self.to_string(),
                "cart_errors": rejection.cart_errors.iter().map(|e| e.to_string()).collect::<Vec<String>>(),
                "price_mismatches": rejection.price_mismatches,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::Rejected(rejection) => Self::CheckoutRejected(rejection),
            OrderFlowError::Checkout(e) => e.into(),
        }
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match &e {
            CheckoutError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id} not found")),
            CheckoutError::IllegalTransition { .. } => Self::Conflict(e.to_string()),
            CheckoutError::InsufficientStock { .. } => Self::Conflict(e.to_string()),
            CheckoutError::BuyerMissing | CheckoutError::EmptyOrder => Self::InvalidRequestBody(e.to_string()),
            CheckoutError::OrderAlreadyExists(_) => Self::Conflict(e.to_string()),
            CheckoutError::DatabaseError(msg) => Self::BackendError(format!("Database error: {msg}")),
        }
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match &e {
            LedgerError::TransactionNotFound(r) => Self::NoRecordFound(format!("No transaction for reference {r}")),
            LedgerError::DuplicateTransaction(_) => Self::Conflict(e.to_string()),
            LedgerError::DatabaseError(msg) => Self::BackendError(format!("Database error: {msg}")),
        }
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::UnknownReference(r) => {
                Self::NoRecordFound(format!("No transaction for reference {r}"))
            },
            // Security-relevant; the 400 carries no more detail than the log already has.
            mismatch @ ReconciliationError::AmountMismatch { .. } => Self::InvalidRequestBody(mismatch.to_string()),
            ReconciliationError::Ledger(e) => e.into(),
            ReconciliationError::Checkout(e) => e.into(),
        }
    }
}
