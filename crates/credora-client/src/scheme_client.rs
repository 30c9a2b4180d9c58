use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use credora::{
    eip712::{domain_for_requirements, encode_signature_hex, random_nonce, signing_hash},
    ChainConfig, CredoraError, ExactEvmAuthorization, ExactEvmPayload, PaymentPayload,
    PaymentRequirements, SchemeClient, TransferWithAuthorization,
};

/// Authorizations stay valid for at least this long when requirements omit a timeout.
const MIN_VALIDITY_SECS: u64 = 60;

/// Client-side `exact` scheme: signs EIP-3009 `TransferWithAuthorization`s.
///
/// Use this with [`PaidClient`](crate::PaidClient) to make paid API requests.
pub struct ExactEvmSchemeClient {
    signer: PrivateKeySigner,
    config: ChainConfig,
}

impl ExactEvmSchemeClient {
    /// Create a new client with Base Sepolia defaults.
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            signer,
            config: ChainConfig::default(),
        }
    }

    /// Create a new client with a custom chain configuration.
    pub fn with_chain_config(signer: PrivateKeySigner, config: ChainConfig) -> Self {
        Self { signer, config }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_config(&self) -> &ChainConfig {
        &self.config
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, CredoraError> {
    raw.parse()
        .map_err(|e| CredoraError::InvalidPayload(format!("invalid {field} '{raw}': {e}")))
}

impl SchemeClient for ExactEvmSchemeClient {
    async fn create_payment_payload(
        &self,
        x402_version: u32,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, CredoraError> {
        if requirements.network != self.config.network {
            return Err(CredoraError::UnsupportedScheme(format!(
                "requirements are for {}, client signs for {}",
                requirements.network, self.config.network
            )));
        }

        let token = parse_address("asset", &requirements.asset)?;
        let pay_to = parse_address("payTo", &requirements.pay_to)?;

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| CredoraError::ConfigError(format!("system time error: {e}")))?
            .as_secs();

        let valid_after = U256::from(now.saturating_sub(60));
        let valid_before =
            U256::from(now + requirements.max_timeout_seconds.max(MIN_VALIDITY_SECS));
        let nonce = random_nonce();

        let auth = TransferWithAuthorization {
            from: self.signer.address(),
            to: pay_to,
            value: requirements.max_amount_required,
            validAfter: valid_after,
            validBefore: valid_before,
            nonce,
        };

        let domain = domain_for_requirements(&self.config, requirements, token);
        let sig = self
            .signer
            .sign_hash_sync(&signing_hash(&auth, &domain))
            .map_err(|e| CredoraError::SignatureError(format!("signing failed: {e}")))?;

        Ok(PaymentPayload {
            x402_version,
            scheme: requirements.scheme.clone(),
            network: requirements.network.clone(),
            payload: ExactEvmPayload {
                signature: encode_signature_hex(&sig),
                authorization: ExactEvmAuthorization {
                    from: auth.from,
                    to: auth.to,
                    value: auth.value,
                    valid_after,
                    valid_before,
                    nonce,
                },
            },
        })
    }
}
