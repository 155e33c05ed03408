//! Mobile-money gateway clients.
//!
//! Two providers are supported: a USSD push provider (the payer approves the charge on their handset) and a hosted
//! checkout provider (the payer is redirected to a provider-hosted payment page). Both are normalized behind the
//! [`PaymentProvider`] trait so the server can treat them interchangeably; no provider-specific status string ever
//! crosses this crate's boundary.

mod config;
mod data_objects;
mod error;
mod hosted_checkout;
mod provider;
mod token;
mod ussd_push;

pub use config::{HostedCheckoutConfig, UssdPushConfig};
pub use data_objects::{
    ChargeRequest,
    ChargeResponse,
    EmailAddress,
    Network,
    PaymentStatus,
    PhoneNumber,
    ProviderMode,
};
pub use error::MomoGatewayError;
pub use hosted_checkout::HostedCheckoutProvider;
pub use provider::PaymentProvider;
pub use token::TokenCache;
pub use ussd_push::UssdPushProvider;
