use crate::{ChargeRequest, ChargeResponse, MomoGatewayError, PaymentStatus, ProviderMode};

/// The single contract the server programs against. Implementations validate their input before any network call,
/// translate provider status vocabularies at the response boundary, and report every failure as a structured
/// [`MomoGatewayError`]; nothing panics across this seam.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider: Clone {
    /// Starts a charge. On success the returned `transaction_id` must be stored as the transaction's
    /// `gateway_reference` before the result is surfaced to the end user.
    async fn initiate(&self, request: &ChargeRequest) -> Result<ChargeResponse, MomoGatewayError>;

    /// Queries the provider for the current status of a previously initiated charge.
    async fn check_status(&self, gateway_reference: &str) -> Result<PaymentStatus, MomoGatewayError>;

    fn mode(&self) -> ProviderMode;
}
