//! EIP-712 helpers for EIP-3009 `TransferWithAuthorization`.
//!
//! - Building the token's domain ([`transfer_domain`], [`domain_for_requirements`])
//! - Computing signing hashes ([`signing_hash`])
//! - Recovering the signer of a hex signature ([`recover_signer`])
//! - Generating random nonces ([`random_nonce`]) and encoding signatures ([`encode_signature_hex`])

use std::borrow::Cow;

use alloy::primitives::{keccak256, Address, Signature, B256, U256};
use alloy::sol_types::{Eip712Domain, SolStruct};

use crate::{ChainConfig, CredoraError, PaymentRequirements, TransferWithAuthorization};

/// Build the EIP-712 domain of `token` with an explicit name and version.
pub fn transfer_domain(name: &str, version: &str, chain_id: u64, token: Address) -> Eip712Domain {
    Eip712Domain {
        name: Some(Cow::Owned(name.to_string())),
        version: Some(Cow::Owned(version.to_string())),
        chain_id: Some(U256::from(chain_id)),
        verifying_contract: Some(token),
        salt: None,
    }
}

/// Build the domain for a payment: the name and version advertised in the
/// requirements' `extra` win over the chain defaults.
pub fn domain_for_requirements(
    config: &ChainConfig,
    requirements: &PaymentRequirements,
    token: Address,
) -> Eip712Domain {
    let (name, version) = requirements.eip712_domain().unwrap_or((
        config.eip712_domain_name.as_str(),
        config.eip712_domain_version.as_str(),
    ));
    transfer_domain(name, version, config.chain_id, token)
}

/// Compute the EIP-712 signing hash of an authorization.
pub fn signing_hash(auth: &TransferWithAuthorization, domain: &Eip712Domain) -> B256 {
    auth.eip712_signing_hash(domain)
}

/// Recover the address that produced a `0x`-prefixed 65-byte signature.
pub fn recover_signer(
    auth: &TransferWithAuthorization,
    domain: &Eip712Domain,
    signature_hex: &str,
) -> Result<Address, CredoraError> {
    let raw = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let bytes = alloy::hex::decode(raw)
        .map_err(|e| CredoraError::SignatureError(format!("invalid hex: {e}")))?;
    if bytes.len() != 65 {
        return Err(CredoraError::SignatureError(format!(
            "signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }
    let sig = Signature::from_raw(&bytes)
        .map_err(|e| CredoraError::SignatureError(format!("invalid signature: {e}")))?;
    sig.recover_address_from_prehash(&signing_hash(auth, domain))
        .map_err(|e| CredoraError::SignatureError(format!("recovery failed: {e}")))
}

/// Generate a random 32-byte nonce (keccak256 of 32 random bytes from the OS CSPRNG).
pub fn random_nonce() -> B256 {
    let bytes: [u8; 32] = rand::random();
    keccak256(bytes)
}

/// Encode a signature as `0x` + 130 hex chars (v = 27 or 28 in the last byte).
pub fn encode_signature_hex(sig: &Signature) -> String {
    format!("0x{}", alloy::hex::encode(sig.as_bytes()))
}
