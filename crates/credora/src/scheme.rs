//! Trait definitions for the two sides of an x402 exchange this workspace owns.
//!
//! - [`SchemeClient`]: client-side: creates signed payment payloads
//! - [`SchemeServer`]: server-side: parses prices into on-chain amounts
//!
//! Verification and settlement belong to the external facilitator.

use crate::error::CredoraError;
use crate::payment::{PaymentPayload, PaymentRequirements};
use alloy::primitives::{Address, U256};

/// Client-side scheme: creates signed payment payloads.
pub trait SchemeClient: Send + Sync {
    /// Create a signed payment payload for the given requirements.
    fn create_payment_payload(
        &self,
        x402_version: u32,
        requirements: &PaymentRequirements,
    ) -> impl std::future::Future<Output = Result<PaymentPayload, CredoraError>> + Send;
}

/// Server-side scheme: parses prices into on-chain amounts.
pub trait SchemeServer: Send + Sync {
    /// Parse a human-readable price string (e.g. "$0.001") into an amount
    /// in atomic units and the asset it is denominated in.
    fn parse_price(&self, price: &str) -> Result<(U256, Address), CredoraError>;
}
