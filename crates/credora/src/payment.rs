use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::constants::X402_VERSION;

/// Serde adapter for token amounts carried as base-10 strings on the wire.
///
/// `U256`'s own serde impl uses hex; x402 uses decimal strings so that
/// amounts survive JSON consumers limited to 53-bit numbers.
pub mod decimal_u256 {
    use alloy::primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    /// Parse a non-negative base-10 integer. Signs, hex prefixes, decimal
    /// points and blanks are rejected.
    pub fn parse(raw: &str) -> Result<U256, String> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("amount '{raw}' is not a non-negative integer"));
        }
        U256::from_str_radix(raw, 10).map_err(|e| format!("amount '{raw}': {e}"))
    }
}

fn default_x402_version() -> u32 {
    X402_VERSION
}

/// A single entry in the `accepts` array of a 402 response.
///
/// Only `maxAmountRequired`, `payTo` and `asset` are needed to act on a
/// shortfall; the descriptive fields default when a sender omits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub network: String,
    #[serde(with = "decimal_u256")]
    pub max_amount_required: U256,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    pub pay_to: String,
    #[serde(default)]
    pub max_timeout_seconds: u64,
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PaymentRequirements {
    /// EIP-712 domain `(name, version)` advertised in `extra`, if any.
    pub fn eip712_domain(&self) -> Option<(&str, &str)> {
        let extra = self.extra.as_ref()?;
        let name = extra.get("name")?.as_str()?;
        let version = extra.get("version")?.as_str()?;
        Some((name, version))
    }
}

/// The 402 response body returned by the resource server, also carried
/// base64-encoded in the `x-payment` response header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    #[serde(default = "default_x402_version")]
    pub x402_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
}

impl PaymentRequiredBody {
    pub fn new(accepts: Vec<PaymentRequirements>, error: Option<String>) -> Self {
        Self {
            x402_version: X402_VERSION,
            error,
            accepts,
        }
    }
}

/// EIP-3009 authorization parameters as they travel in the `X-PAYMENT` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmAuthorization {
    pub from: Address,
    pub to: Address,
    #[serde(with = "decimal_u256")]
    pub value: U256,
    #[serde(with = "decimal_u256")]
    pub valid_after: U256,
    #[serde(with = "decimal_u256")]
    pub valid_before: U256,
    pub nonce: B256,
}

/// Signed payload for the `exact` scheme on EVM networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: String,
    pub authorization: ExactEvmAuthorization,
}

/// Wire-format payment payload (sent in the `X-PAYMENT` header, base64-encoded JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    pub payload: ExactEvmPayload,
}
