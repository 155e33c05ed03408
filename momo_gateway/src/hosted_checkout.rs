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
    HostedCheckoutConfig,
    MomoGatewayError,
    PaymentProvider,
    PaymentStatus,
    ProviderMode,
    TokenCache,
};

/// Client for the hosted checkout provider. `initiate` creates a checkout session and returns the URL the payer
/// must be redirected to; settlement is reported later through the webhook or the status poller.
#[derive(Clone)]
pub struct HostedCheckoutProvider {
    config: HostedCheckoutConfig,
    client: Arc<Client>,
    tokens: TokenCache,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    merchant_id: &'a str,
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    expires_in: i64,
}

#[derive(Debug, Serialize)]
struct CreateSessionBody<'a> {
    merchant_id: &'a str,
    /// Amount in minor units of the given currency.
    amount: i64,
    currency: &'a str,
    customer_email: &'a str,
    merchant_reference: &'a str,
    description: &'a str,
    redirect_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionReply {
    session_id: String,
    checkout_url: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct SessionStatusReply {
    status: String,
}

impl HostedCheckoutProvider {
    pub fn new(config: HostedCheckoutConfig) -> Result<Self, MomoGatewayError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| MomoGatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), tokens: TokenCache::new() })
    }

    /// The session-state vocabulary of the hosted provider. Unknown states are left pending for the poller.
    fn translate_status(provider_status: &str) -> PaymentStatus {
        match provider_status.to_lowercase().as_str() {
            "paid" | "complete" | "completed" => PaymentStatus::Completed,
            "created" | "open" | "pending" | "processing" => PaymentStatus::Pending,
            "expired" | "cancelled" | "failed" | "abandoned" => PaymentStatus::Failed,
            other => {
                warn!("💳️ Unrecognized hosted checkout status '{other}'. Treating as pending.");
                PaymentStatus::Pending
            },
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn bearer_token(&self) -> Result<Secret<String>, MomoGatewayError> {
        if let Some(token) = self.tokens.current() {
            return Ok(token);
        }
        if self.config.api_key.is_empty() {
            return Err(MomoGatewayError::Initialization(
                "Hosted checkout credentials are not configured".to_string(),
            ));
        }
        debug!("🔐️ Logging in to the hosted checkout provider");
        let body = LoginRequest { merchant_id: &self.config.merchant_id, api_key: self.config.api_key.reveal() };
        let response = self
            .client
            .post(self.url("/v1/auth/login"))
            .json(&body)
            .send()
            .await
            .map_err(|e| MomoGatewayError::Transport(e.to_string()))?;
        let login = Self::parse_response::<LoginResponse>(response).await?;
        let token = Secret::new(login.token);
        self.tokens.store(token.clone(), login.expires_in);
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

    fn validate(request: &ChargeRequest) -> Result<&crate::EmailAddress, MomoGatewayError> {
        if request.amount.value() <= 0 {
            return Err(MomoGatewayError::Validation(format!(
                "Charge amount must be positive, got {}",
                request.amount
            )));
        }
        request
            .email
            .as_ref()
            .ok_or_else(|| MomoGatewayError::Validation("An email address is required for hosted checkout".to_string()))
    }
}

impl PaymentProvider for HostedCheckoutProvider {
    async fn initiate(&self, request: &ChargeRequest) -> Result<ChargeResponse, MomoGatewayError> {
        let email = Self::validate(request)?;
        let token = self.bearer_token().await?;
        let body = CreateSessionBody {
            merchant_id: &self.config.merchant_id,
            amount: request.amount.value(),
            currency: &request.currency,
            customer_email: email.as_str(),
            merchant_reference: &request.reference,
            description: &request.description,
            redirect_url: &self.config.redirect_url,
        };
        debug!("💳️ Creating hosted checkout session of {} for {}", request.amount, request.reference);
        let response = self
            .client
            .post(self.url("/v1/checkout/sessions"))
            .bearer_auth(token.reveal())
            .json(&body)
            .send()
            .await
            .map_err(|e| MomoGatewayError::Transport(e.to_string()))?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.clear();
        }
        let reply = Self::parse_response::<SessionReply>(response).await?;
        let status = Self::translate_status(&reply.status);
        info!("💳️ Hosted session {} created for {} ({status})", reply.session_id, request.reference);
        Ok(ChargeResponse {
            transaction_id: reply.session_id,
            status,
            payment_url: Some(reply.checkout_url),
        })
    }

    async fn check_status(&self, gateway_reference: &str) -> Result<PaymentStatus, MomoGatewayError> {
        let token = self.bearer_token().await?;
        let path = format!("/v1/checkout/sessions/{gateway_reference}");
        trace!("💳️ Checking hosted session status for {gateway_reference}");
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
        let reply = Self::parse_response::<SessionStatusReply>(response).await?;
        Ok(Self::translate_status(&reply.status))
    }

    fn mode(&self) -> ProviderMode {
        ProviderMode::HostedCheckout
    }
}
