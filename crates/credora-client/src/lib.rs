//! Credora client SDK: pay x402-protected APIs and borrow the difference.
//!
//! When a resource server refuses a payment with `insufficient_funds`, the
//! [`CredoraClient`] reads the shortfall from the `x-payment` header and
//! draws a loan for exactly that amount. [`PaidClient`] wires this into the
//! usual request, 402, sign, retry loop.
//!
//! # Quick Example
//!
//! ```no_run
//! use alloy::primitives::address;
//! use alloy::signers::local::PrivateKeySigner;
//! use credora::loan::{wallet_provider, ContractLoanFacility};
//! use credora_client::{CredoraClient, ExactEvmSchemeClient, PaidClient};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), credora::CredoraError> {
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse().unwrap();
//! let provider = wallet_provider(signer.clone(), "https://sepolia.base.org")?;
//! let loans = ContractLoanFacility::new(provider, address!("5FbDB2315678afecb367f032d93F642f64180aa3"));
//!
//! let client = PaidClient::new(
//!     ExactEvmSchemeClient::new(signer),
//!     CredoraClient::new(loans),
//!     "base-sepolia",
//! )?;
//! let paid = client
//!     .fetch("http://localhost:3000/premium", reqwest::Method::GET)
//!     .await?;
//!
//! if let Some(loan) = paid.loan {
//!     println!("borrowed in tx {}", loan.transaction_hash);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod http_client;
pub mod recovery;
pub mod repay;
mod scheme_client;

pub use config::{AgentConfig, ConfigError};
pub use http_client::{PaidClient, PaidResponse};
pub use recovery::{
    connect, handle_payment, CredoraClient, PaymentFailure, PaymentHeaders, PaymentOutcome,
    Shortfall,
};
pub use repay::AutoRepayer;
pub use scheme_client::ExactEvmSchemeClient;

// Re-export commonly needed types from core
pub use credora::{
    ChainConfig, CredoraError, LoanFacility, LoanReceipt, LoanState, PaymentPayload,
    PaymentRequiredBody, PaymentRequirements, SchemeClient, SettleResponse,
};
