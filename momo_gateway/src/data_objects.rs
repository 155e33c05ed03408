use std::{fmt::Display, str::FromStr, sync::OnceLock};

use mkt_common::Money;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::MomoGatewayError;

//--------------------------------------       Network       ---------------------------------------------------------
/// The mobile-money networks the USSD push provider can charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Network {
    Mpesa,
    TigoPesa,
    AirtelMoney,
    HaloPesa,
}

impl Network {
    pub const VALID_SET: &'static str = "MPESA, TIGOPESA, AIRTELMONEY, HALOPESA";

    /// The wire form the provider expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mpesa => "MPESA",
            Network::TigoPesa => "TIGOPESA",
            Network::AirtelMoney => "AIRTELMONEY",
            Network::HaloPesa => "HALOPESA",
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Network {
    type Err = MomoGatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MPESA" => Ok(Network::Mpesa),
            "TIGOPESA" => Ok(Network::TigoPesa),
            "AIRTELMONEY" => Ok(Network::AirtelMoney),
            "HALOPESA" => Ok(Network::HaloPesa),
            other => Err(MomoGatewayError::Validation(format!(
                "Unknown network '{other}'. Valid networks are: {}",
                Network::VALID_SET
            ))),
        }
    }
}

impl TryFrom<String> for Network {
    type Error = MomoGatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Network> for String {
    fn from(value: Network) -> Self {
        value.as_str().to_string()
    }
}

//--------------------------------------     PhoneNumber     ---------------------------------------------------------
/// A Tanzanian mobile number in international format. Validated on construction so a value of this type is always
/// safe to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new<S: AsRef<str>>(number: S) -> Result<Self, MomoGatewayError> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let number = number.as_ref().trim();
        // The pattern is a literal; compilation cannot fail, so it happens once.
        let re = PATTERN.get_or_init(|| Regex::new(r"^255\d{9}$").unwrap());
        if re.is_match(number) {
            Ok(Self(number.to_string()))
        } else {
            Err(MomoGatewayError::Validation(format!(
                "Invalid phone number '{number}'. Expected format: 255 followed by 9 digits"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PhoneNumber {
    type Err = MomoGatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = MomoGatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

impl Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------     EmailAddress    ---------------------------------------------------------
/// A lightly validated email address for the hosted checkout flow. The shape check catches obvious typos; the
/// provider remains the authority on deliverability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new<S: AsRef<str>>(email: S) -> Result<Self, MomoGatewayError> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let email = email.as_ref().trim();
        let re = PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
        if re.is_match(email) {
            Ok(Self(email.to_string()))
        } else {
            Err(MomoGatewayError::Validation(format!("Invalid email address '{email}'")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = MomoGatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
/// The internal three-state payment vocabulary. Provider status strings are translated into this at the response
/// boundary and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------     ProviderMode    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderMode {
    /// The payer approves the charge on their handset via a USSD prompt.
    UssdPush,
    /// The payer is redirected to a provider-hosted payment page.
    HostedCheckout,
}

//--------------------------------------     ChargeRequest   ---------------------------------------------------------
/// A normalized charge instruction. Exactly one payer detail applies per provider mode: `phone_number` + `network`
/// for USSD push, `email` for hosted checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: Money,
    pub currency: String,
    pub phone_number: Option<PhoneNumber>,
    pub network: Option<Network>,
    pub email: Option<EmailAddress>,
    /// The caller-generated idempotency key. Every provider call and every webhook correlates through it.
    pub reference: String,
    pub description: String,
}

impl ChargeRequest {
    pub fn ussd(amount: Money, phone_number: PhoneNumber, network: Network, reference: &str, description: &str) -> Self {
        Self {
            amount,
            currency: mkt_common::TZS_CURRENCY_CODE.to_string(),
            phone_number: Some(phone_number),
            network: Some(network),
            email: None,
            reference: reference.to_string(),
            description: description.to_string(),
        }
    }

    pub fn hosted(amount: Money, email: EmailAddress, reference: &str, description: &str) -> Self {
        Self {
            amount,
            currency: mkt_common::TZS_CURRENCY_CODE.to_string(),
            phone_number: None,
            network: None,
            email: Some(email),
            reference: reference.to_string(),
            description: description.to_string(),
        }
    }
}

//--------------------------------------    ChargeResponse   ---------------------------------------------------------
/// What the caller gets back from a successful initiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeResponse {
    /// The provider's identifier for this charge. Stored as the transaction's `gateway_reference` and used for
    /// status polls.
    pub transaction_id: String,
    pub status: PaymentStatus,
    /// Set by the hosted checkout provider only: the URL the payer must be redirected to.
    pub payment_url: Option<String>,
}
