//! Shared building blocks for Credora: x402 payments backed by on-chain credit.
//!
//! A resource server answers unpaid requests with HTTP 402 and an encoded
//! [`PaymentRequiredBody`]. Clients decode it, and when the failure is
//! `insufficient_funds` they draw a loan from the [`loan::LoanFacility`]
//! before paying again.
//!
//! # Modules
//!
//! - [`payment`] / [`response`]: x402 v1 wire types (amounts are [`U256`](alloy::primitives::U256))
//! - [`header`]: base64 JSON codec for the `x-payment` family of headers
//! - [`constants`]: supported networks and their USDC deployments
//! - [`scheme`] / [`scheme_server`]: scheme traits and price parsing
//! - [`eip712`]: EIP-3009 `TransferWithAuthorization` signing helpers
//! - [`loan`] / [`erc20`]: contract bindings for the credit manager and the payment token
//!
//! # Decoding a payment-required header
//!
//! ```
//! use credora::{header, PaymentRequiredBody};
//!
//! let raw = r#"{"error":"insufficient_funds","accepts":[{"maxAmountRequired":"500000","payTo":"0xabc","asset":"0xdef"}]}"#;
//! let encoded = header::encode(&serde_json::from_str::<serde_json::Value>(raw).unwrap()).unwrap();
//!
//! let body: PaymentRequiredBody = header::decode(&encoded).unwrap();
//! assert_eq!(body.error.as_deref(), Some("insufficient_funds"));
//! assert_eq!(body.accepts[0].max_amount_required.to_string(), "500000");
//! ```

// Core types and traits
pub mod constants;
pub mod error;
pub mod header;
pub mod hmac;
pub mod payment;
pub mod response;
pub mod scheme;
pub mod security;

// EVM implementation
pub mod eip712;
pub mod erc20;
pub mod loan;
pub mod scheme_server;

use alloy::sol;

// EIP-3009 authorization signed by the payer and submitted by the facilitator.
// The sol! macro derives SolStruct which provides eip712_signing_hash().
sol! {
    #[derive(Debug)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

// Re-exports
pub use constants::ChainConfig;
pub use constants::*;
pub use error::CredoraError;
pub use loan::{LoanFacility, LoanReceipt, LoanState};
pub use payment::*;
pub use response::*;
pub use scheme::*;

pub use scheme_server::ExactSchemeServer;
