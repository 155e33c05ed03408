use std::sync::Arc;

use log::*;
use mkt_common::Secret;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    ChargeRequest,
    ChargeResponse,
    MomoGatewayError,
    PaymentProvider,
    PaymentStatus,
    ProviderMode,
    TokenCache,
    UssdPushConfig,
};

/// Client for the USSD push provider. A charge pops a PIN prompt on the payer's handset; the outcome arrives later
/// through the webhook or the status poller.
#[derive(Clone)]
pub struct UssdPushProvider {
    config: UssdPushConfig,
    client: Arc<Client>,
    tokens: TokenCache,
}

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    api_key: &'a str,
    api_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Serialize)]
struct PushChargeBody<'a> {
    /// Amount in minor units of the given currency.
    amount: i64,
    currency: &'a str,
    msisdn: &'a str,
    network: &'a str,
    external_reference: &'a str,
    narration: &'a str,
}

#[derive(Debug, Deserialize)]
struct PushChargeReply {
    transaction_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StatusReply {
    status: String,
}

impl UssdPushProvider {
    pub fn new(config: UssdPushConfig) -> Result<Self, MomoGatewayError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| MomoGatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), tokens: TokenCache::new() })
    }

    /// Translates the provider's status vocabulary. Unrecognized values are logged and treated as pending so the
    /// poller keeps watching rather than prematurely settling the charge.
    fn translate_status(provider_status: &str) -> PaymentStatus {
        match provider_status.to_uppercase().as_str() {
            "SUCCESS" | "SETTLED" | "COMPLETED" => PaymentStatus::Completed,
            "PENDING" | "ACCEPTED" | "INPROGRESS" | "PROCESSING" => PaymentStatus::Pending,
            "FAILED" | "DECLINED" | "TIMEOUT" | "CANCELLED" | "INSUFFICIENT_FUNDS" => PaymentStatus::Failed,
            other => {
                warn!("💳️ Unrecognized USSD provider status '{other}'. Treating as pending.");
                PaymentStatus::Pending
            },
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Returns a bearer token, authenticating against the provider only when the cache cannot serve one.
    async fn bearer_token(&self) -> Result<Secret<String>, MomoGatewayError> {
        if let Some(token) = self.tokens.current() {
            return Ok(token);
        }
        if self.config.api_key.is_empty() || self.config.api_secret.is_empty() {
            return Err(MomoGatewayError::Initialization(
                "USSD provider credentials are not configured".to_string(),
            ));
        }
        debug!("🔐️ Fetching a new USSD provider token");
        let body =
            AuthRequest { api_key: self.config.api_key.reveal(), api_secret: self.config.api_secret.reveal() };
        let response = self
            .client
            .post(self.url("/oauth/token"))
            .json(&body)
            .send()
            .await
            .map_err(|e| MomoGatewayError::Transport(e.to_string()))?;
        let auth = Self::parse_response::<AuthResponse>(response).await?;
        let token = Secret::new(auth.access_token);
        self.tokens.store(token.clone(), auth.expires_in);
        Ok(token)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, MomoGatewayError> {
        if response.status().is_success() {
            response.json::<T>().await.map_err(|e| MomoGatewayError::Json(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| MomoGatewayError::Transport(e.to_string()))?;
            Err(MomoGatewayError::Provider { status, message })
        }
    }

    fn validate(request: &ChargeRequest) -> Result<(&crate::PhoneNumber, crate::Network), MomoGatewayError> {
        if request.amount.value() <= 0 {
            return Err(MomoGatewayError::Validation(format!(
                "Charge amount must be positive, got {}",
                request.amount
            )));
        }
        let phone = request
            .phone_number
            .as_ref()
            .ok_or_else(|| MomoGatewayError::Validation("A phone number is required for USSD push".to_string()))?;
        let network = request
            .network
            .ok_or_else(|| MomoGatewayError::Validation("A network is required for USSD push".to_string()))?;
        Ok((phone, network))
    }
}

impl PaymentProvider for UssdPushProvider {
    async fn initiate(&self, request: &ChargeRequest) -> Result<ChargeResponse, MomoGatewayError> {
        let (phone, network) = Self::validate(request)?;
        let token = self.bearer_token().await?;
        let body = PushChargeBody {
            amount: request.amount.value(),
            currency: &request.currency,
            msisdn: phone.as_str(),
            network: network.as_str(),
            external_reference: &request.reference,
            narration: &request.description,
        };
        debug!("💳️ Initiating USSD push of {} on {network} for {}", request.amount, request.reference);
        let response = self
            .client
            .post(self.url("/v1/charges"))
            .bearer_auth(token.reveal())
            .json(&body)
            .send()
            .await
            .map_err(|e| MomoGatewayError::Transport(e.to_string()))?;
        if response.status() == StatusCode::UNAUTHORIZED {
            // The provider disagrees with our expiry bookkeeping. Drop the token; the next call re-authenticates.
            self.tokens.clear();
        }
        let reply = Self::parse_response::<PushChargeReply>(response).await?;
        let status = Self::translate_status(&reply.status);
        info!("💳️ USSD push accepted for {}: provider tx {} ({status})", request.reference, reply.transaction_id);
        Ok(ChargeResponse { transaction_id: reply.transaction_id, status, payment_url: None })
    }

    async fn check_status(&self, gateway_reference: &str) -> Result<PaymentStatus, MomoGatewayError> {
        let token = self.bearer_token().await?;
        let path = format!("/v1/charges/{gateway_reference}");
        trace!("💳️ Checking USSD charge status for {gateway_reference}");
        let response = self
            .client
            .get(self.url(&path))
            .bearer_auth(token.reveal())
            .send()
            .await
            .map_err(|e| MomoGatewayError::Transport(e.to_string()))?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.clear();
        }
        let reply = Self::parse_response::<StatusReply>(response).await?;
        Ok(Self::translate_status(&reply.status))
    }

    fn mode(&self) -> ProviderMode {
        ProviderMode::UssdPush
    }
}
