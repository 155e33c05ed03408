use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum MomoGatewayError {
    /// The request is malformed and resending it unchanged will fail again. The caller should fix their input.
    #[error("Invalid payment request: {0}")]
    Validation(String),
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    /// The provider could not be reached, or dropped the connection. Retry later.
    #[error("Provider transport error: {0}")]
    Transport(String),
    /// The provider answered with a failure status. Retry later unless the status says otherwise.
    #[error("Provider rejected the request. Error {status}. {message}")]
    Provider { status: u16, message: String },
    #[error("Could not deserialize provider response: {0}")]
    Json(String),
}

impl MomoGatewayError {
    /// True when resubmitting the same request may succeed. Validation failures never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            MomoGatewayError::Validation(_) | MomoGatewayError::Initialization(_) => false,
            MomoGatewayError::Transport(_) | MomoGatewayError::Json(_) => true,
            MomoGatewayError::Provider { status, .. } => *status >= 500,
        }
    }
}
