//! Invoice payment data consumed by the payment slip pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Currencies a QR-bill may be issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Currency {
    #[serde(rename = "CHF")]
    Chf,
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Chf => "CHF",
            Self::Eur => "EUR",
        }
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CHF" => Ok(Self::Chf),
            "EUR" => Ok(Self::Eur),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

fn default_currency() -> String {
    Currency::Chf.code().to_string()
}

fn default_country() -> String {
    "CH".to_string()
}

/// Payment data of one invoice.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct InvoicePaymentData {
    /// Internal document id, encoded into the payment reference
    pub document_id: u64,
    /// Display number printed as additional information, e.g. `INV-2024-042`
    pub document_number: String,
    pub client_name: String,
    #[serde(default)]
    pub client_surname: String,
    /// Street
    pub address_1: String,
    /// Building number
    #[serde(default)]
    pub address_2: String,
    pub postal_code: String,
    pub city: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[schema(value_type = String, example = "1250.50")]
    pub total: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl InvoicePaymentData {
    /// Debtor name as printed on the slip.
    pub fn debtor_name(&self) -> String {
        format!("{} {}", self.client_name.trim(), self.client_surname.trim())
            .trim()
            .to_string()
    }
}
