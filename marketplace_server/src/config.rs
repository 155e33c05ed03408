use std::env;

use chrono::Duration;
use log::*;
use mkt_common::{parse_boolean_flag, Secret};
use momo_gateway::{HostedCheckoutConfig, UssdPushConfig};

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8260;
const DEFAULT_UNPAID_ORDER_TIMEOUT: Duration = Duration::hours(2);
const DEFAULT_EXPIRY_CHECK_INTERVAL_SECONDS: u64 = 60;
const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 5;
const DEFAULT_POLL_ATTEMPTS: u32 = 10;
const DEFAULT_CANONICAL_ORIGIN: &str = "https://shop.example.co.tz";

/// The header carrying the webhook's HMAC-SHA256 hex signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Marketplace-Signature";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for webhook signatures. When empty, signature checks are skipped with a warning on every
    /// request. Acceptable for bring-up, not for production.
    pub webhook_secret: Secret<String>,
    /// The frontend origins allowed by CORS, plus the canonical origin that is always allowed.
    pub cors: CorsConfig,
    /// How long a pending order may sit unpaid before the expiry worker cancels it.
    pub unpaid_order_timeout: Duration,
    pub expiry_check_interval_seconds: u64,
    /// Disables the background expiry sweep. Useful when several instances share a database and only one should
    /// run the sweep.
    pub disable_expiry_worker: bool,
    /// Fixed backoff between status poll attempts.
    pub poll_interval_seconds: u64,
    /// Hard ceiling on status poll attempts for a single payment.
    pub poll_attempts: u32,
    pub ussd: UssdPushConfig,
    pub hosted: HostedCheckoutConfig,
}

#[derive(Clone, Debug)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    /// The production frontend. Always in the allow-list; never replaced by a wildcard.
    pub canonical_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { allowed_origins: Vec::new(), canonical_origin: DEFAULT_CANONICAL_ORIGIN.to_string() }
    }
}

impl CorsConfig {
    /// True when `origin` may be echoed back in `Access-Control-Allow-Origin`.
    pub fn is_allowed(&self, origin: &str) -> bool {
        origin == self.canonical_origin || self.allowed_origins.iter().any(|o| o == origin)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            webhook_secret: Secret::default(),
            cors: CorsConfig::default(),
            unpaid_order_timeout: DEFAULT_UNPAID_ORDER_TIMEOUT,
            expiry_check_interval_seconds: DEFAULT_EXPIRY_CHECK_INTERVAL_SECONDS,
            disable_expiry_worker: false,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            ussd: UssdPushConfig::default(),
            hosted: HostedCheckoutConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let defaults = ServerConfig::default();
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, \
                         instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let webhook_secret = Secret::new(env::var("MKT_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ MKT_WEBHOOK_SECRET is not set. Webhook signatures will NOT be checked.");
            String::default()
        }));
        let canonical_origin = env::var("MKT_CANONICAL_ORIGIN").unwrap_or_else(|_| {
            warn!("🪛️ MKT_CANONICAL_ORIGIN is not set. Using {DEFAULT_CANONICAL_ORIGIN}.");
            DEFAULT_CANONICAL_ORIGIN.to_string()
        });
        let allowed_origins = env::var("MKT_CORS_ORIGINS")
            .map(|s| s.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect::<Vec<String>>())
            .unwrap_or_default();
        let unpaid_order_timeout = duration_from_hours_env("MKT_UNPAID_ORDER_TIMEOUT", defaults.unpaid_order_timeout);
        let expiry_check_interval_seconds =
            u64_from_env("MKT_EXPIRY_CHECK_INTERVAL", defaults.expiry_check_interval_seconds);
        let disable_expiry_worker = parse_boolean_flag(env::var("MKT_DISABLE_EXPIRY_WORKER").ok(), false);
        if disable_expiry_worker {
            warn!("🪛️ MKT_DISABLE_EXPIRY_WORKER is set. Unpaid orders will not be expired by this instance.");
        }
        let poll_interval_seconds = u64_from_env("MKT_POLL_INTERVAL", defaults.poll_interval_seconds);
        let poll_attempts = u64_from_env("MKT_POLL_ATTEMPTS", u64::from(defaults.poll_attempts)) as u32;
        let ussd = UssdPushConfig::from_env_or_default();
        let hosted = HostedCheckoutConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            webhook_secret,
            cors: CorsConfig { allowed_origins, canonical_origin },
            unpaid_order_timeout,
            expiry_check_interval_seconds,
            disable_expiry_worker,
            poll_interval_seconds,
            poll_attempts,
            ussd,
            hosted,
        }
    }
}

fn u64_from_env(var: &str, default: u64) -> u64 {
    env::var(var)
        .map(|s| {
            s.parse::<u64>().unwrap_or_else(|e| {
                warn!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
                default
            })
        })
        .unwrap_or(default)
}

fn duration_from_hours_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .map(|s| {
            s.parse::<i64>().map(Duration::hours).unwrap_or_else(|e| {
                warn!("🪛️ {s} is not a valid hour count for {var}. {e} Using the default instead.");
                default
            })
        })
        .unwrap_or(default)
}
