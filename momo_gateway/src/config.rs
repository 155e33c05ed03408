use log::*;
use mkt_common::Secret;

/// Connection settings for the USSD push provider. Read from the environment; every absent variable logs a warning
/// and falls back to a sandbox value so a dev instance starts without any configuration.
#[derive(Debug, Clone)]
pub struct UssdPushConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
}

impl Default for UssdPushConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.ussdpay.example".to_string(),
            api_key: Secret::default(),
            api_secret: Secret::default(),
        }
    }
}

impl UssdPushConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = std::env::var("MKT_USSD_BASE_URL").unwrap_or_else(|_| {
            warn!("🔐️ MKT_USSD_BASE_URL not set, using the sandbox URL");
            UssdPushConfig::default().base_url
        });
        let api_key = Secret::new(std::env::var("MKT_USSD_API_KEY").unwrap_or_else(|_| {
            warn!("🔐️ MKT_USSD_API_KEY not set. Provider calls will be rejected until it is configured.");
            String::default()
        }));
        let api_secret = Secret::new(std::env::var("MKT_USSD_API_SECRET").unwrap_or_else(|_| {
            warn!("🔐️ MKT_USSD_API_SECRET not set. Provider calls will be rejected until it is configured.");
            String::default()
        }));
        Self { base_url, api_key, api_secret }
    }
}

/// Connection settings for the hosted checkout provider.
#[derive(Debug, Clone)]
pub struct HostedCheckoutConfig {
    pub base_url: String,
    pub merchant_id: String,
    pub api_key: Secret<String>,
    /// Where the provider sends the payer after the hosted page completes.
    pub redirect_url: String,
}

impl Default for HostedCheckoutConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.hostedpay.example".to_string(),
            merchant_id: "sandbox-merchant".to_string(),
            api_key: Secret::default(),
            redirect_url: "http://localhost:3000/payment/result".to_string(),
        }
    }
}

impl HostedCheckoutConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = HostedCheckoutConfig::default();
        let base_url = std::env::var("MKT_HOSTED_BASE_URL").unwrap_or_else(|_| {
            warn!("🔐️ MKT_HOSTED_BASE_URL not set, using the sandbox URL");
            defaults.base_url.clone()
        });
        let merchant_id = std::env::var("MKT_HOSTED_MERCHANT_ID").unwrap_or_else(|_| {
            warn!("🔐️ MKT_HOSTED_MERCHANT_ID not set, using '{}'", defaults.merchant_id);
            defaults.merchant_id.clone()
        });
        let api_key = Secret::new(std::env::var("MKT_HOSTED_API_KEY").unwrap_or_else(|_| {
            warn!("🔐️ MKT_HOSTED_API_KEY not set. Provider calls will be rejected until it is configured.");
            String::default()
        }));
        let redirect_url = std::env::var("MKT_HOSTED_REDIRECT_URL").unwrap_or_else(|_| {
            warn!("🔐️ MKT_HOSTED_REDIRECT_URL not set, using {}", defaults.redirect_url);
            defaults.redirect_url.clone()
        });
        Self { base_url, merchant_id, api_key, redirect_url }
    }
}
