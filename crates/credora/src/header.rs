//! Base64 JSON codec shared by the `x-payment`, `X-PAYMENT` and
//! `X-PAYMENT-RESPONSE` headers.
//!
//! Decoding is strict: a value that is not base64, or that does not parse
//! into the requested type, is an error. Callers never get a partially
//! decoded payload.

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{CredoraError, PaymentPayload, PaymentRequiredBody, SettleResponse};

/// Serialize `value` to JSON and base64-encode it (standard alphabet, padded).
pub fn encode<T: Serialize>(value: &T) -> Result<String, CredoraError> {
    let json = serde_json::to_vec(value)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(json))
}

/// Decode a base64 JSON header value. Surrounding whitespace is ignored.
pub fn decode<T: DeserializeOwned>(value: impl AsRef<[u8]>) -> Result<T, CredoraError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value.as_ref().trim_ascii())
        .map_err(|e| CredoraError::InvalidHeader(format!("invalid base64: {e}")))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encode a 402 body for the `x-payment` response header.
pub fn encode_requirements(body: &PaymentRequiredBody) -> Result<String, CredoraError> {
    encode(body)
}

/// Decode the `x-payment` response header into a typed 402 body.
pub fn decode_requirements(value: impl AsRef<[u8]>) -> Result<PaymentRequiredBody, CredoraError> {
    decode(value)
}

/// Encode a signed payment for the `X-PAYMENT` request header.
pub fn encode_payment(payload: &PaymentPayload) -> Result<String, CredoraError> {
    encode(payload)
}

/// Decode the `X-PAYMENT` request header.
pub fn decode_payment(value: impl AsRef<[u8]>) -> Result<PaymentPayload, CredoraError> {
    decode(value)
}

/// Decode the `X-PAYMENT-RESPONSE` header returned with a granted resource.
pub fn decode_settlement(value: impl AsRef<[u8]>) -> Result<SettleResponse, CredoraError> {
    decode(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExactEvmAuthorization, ExactEvmPayload, PaymentRequirements};
    use alloy::primitives::{Address, B256, U256};

    fn sample_body(amount: U256) -> PaymentRequiredBody {
        PaymentRequiredBody::new(
            vec![PaymentRequirements {
                scheme: "exact".to_string(),
                network: "base-sepolia".to_string(),
                max_amount_required: amount,
                resource: "http://localhost:3000/premium".to_string(),
                description: "premium plan".to_string(),
                mime_type: "application/json".to_string(),
                pay_to: "0x4ec137a8be0466c166997bcfc56ffdafc542201b".to_string(),
                max_timeout_seconds: 60,
                asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
                extra: Some(serde_json::json!({"name": "USDC", "version": "2"})),
            }],
            Some("insufficient_funds".to_string()),
        )
    }

    #[test]
    fn test_requirements_roundtrip_is_field_for_field() {
        let body = sample_body(U256::from(500_000u64));
        let encoded = encode_requirements(&body).unwrap();
        assert_eq!(decode_requirements(&encoded).unwrap(), body);
    }

    #[test]
    fn test_roundtrip_preserves_huge_amounts() {
        let body = sample_body(U256::MAX);
        let decoded = decode_requirements(encode_requirements(&body).unwrap()).unwrap();
        assert_eq!(decoded.accepts[0].max_amount_required, U256::MAX);
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_payment_roundtrip() {
        let payload = PaymentPayload {
            x402_version: 1,
            scheme: "exact".to_string(),
            network: "base-sepolia".to_string(),
            payload: ExactEvmPayload {
                signature: "0xdead".to_string(),
                authorization: ExactEvmAuthorization {
                    from: Address::ZERO,
                    to: Address::ZERO,
                    value: U256::from(1000u64),
                    valid_after: U256::ZERO,
                    valid_before: U256::from(u64::MAX),
                    nonce: B256::ZERO,
                },
            },
        };
        let encoded = encode_payment(&payload).unwrap();
        assert_eq!(decode_payment(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_decode_tolerates_surrounding_whitespace() {
        let body = sample_body(U256::from(7u64));
        let encoded = format!("  {}\n", encode_requirements(&body).unwrap());
        assert_eq!(decode_requirements(encoded).unwrap(), body);
    }

    #[test]
    fn test_decode_invalid_base64() {
        let err = decode_requirements("not-valid-base64!!!").unwrap_err();
        assert!(matches!(err, CredoraError::InvalidHeader(_)));
        assert!(err.to_string().contains("invalid base64"));
    }

    #[test]
    fn test_decode_invalid_json() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"this is not json");
        let err = decode_requirements(&encoded).unwrap_err();
        assert!(matches!(err, CredoraError::SerdeError(_)));
    }

    #[test]
    fn test_decode_rejects_unparseable_amount() {
        let raw = r#"{"error":"insufficient_funds","accepts":[{"maxAmountRequired":"1.5","payTo":"a","asset":"b"}]}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
        assert!(decode_requirements(&encoded).is_err());
    }
}
