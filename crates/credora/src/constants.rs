use alloy::primitives::{address, Address};

/// x402 protocol version spoken by this crate.
pub const X402_VERSION: u32 = 1;

/// x402 scheme name for EIP-3009 exact-amount payments.
pub const SCHEME_NAME: &str = "exact";

/// Header carrying a base64 JSON [`PaymentRequiredBody`](crate::PaymentRequiredBody)
/// on 402 responses, and the signed [`PaymentPayload`](crate::PaymentPayload) on paid requests.
pub const PAYMENT_HEADER: &str = "x-payment";

/// Header carrying the base64 JSON settlement on a paid response.
pub const PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";

/// Error code a facilitator reports when the payer cannot cover the amount.
pub const INSUFFICIENT_FUNDS: &str = "insufficient_funds";

/// Base Sepolia network identifier.
pub const BASE_SEPOLIA_NETWORK: &str = "base-sepolia";

/// Base mainnet network identifier.
pub const BASE_NETWORK: &str = "base";

/// USDC on Base Sepolia.
pub const BASE_SEPOLIA_USDC: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// USDC on Base mainnet.
pub const BASE_USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC has 6 decimal places on every supported network.
pub const TOKEN_DECIMALS: u32 = 6;

/// Public facilitator operated for Base Sepolia.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Runtime chain configuration for one x402 network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub network: String,
    pub scheme_name: String,
    pub default_token: Address,
    pub token_decimals: u32,
    pub rpc_url: String,
    pub explorer_base: String,
    pub eip712_domain_name: String,
    pub eip712_domain_version: String,
}

impl ChainConfig {
    pub fn base_sepolia() -> Self {
        Self {
            chain_id: 84532,
            network: BASE_SEPOLIA_NETWORK.to_string(),
            scheme_name: SCHEME_NAME.to_string(),
            default_token: BASE_SEPOLIA_USDC,
            token_decimals: TOKEN_DECIMALS,
            rpc_url: "https://sepolia.base.org".to_string(),
            explorer_base: "https://sepolia.basescan.org".to_string(),
            eip712_domain_name: "USDC".to_string(),
            eip712_domain_version: "2".to_string(),
        }
    }

    pub fn base() -> Self {
        Self {
            chain_id: 8453,
            network: BASE_NETWORK.to_string(),
            scheme_name: SCHEME_NAME.to_string(),
            default_token: BASE_USDC,
            token_decimals: TOKEN_DECIMALS,
            rpc_url: "https://mainnet.base.org".to_string(),
            explorer_base: "https://basescan.org".to_string(),
            eip712_domain_name: "USD Coin".to_string(),
            eip712_domain_version: "2".to_string(),
        }
    }

    /// Look up a supported network by its x402 identifier.
    pub fn for_network(network: &str) -> Option<Self> {
        match network {
            BASE_SEPOLIA_NETWORK => Some(Self::base_sepolia()),
            BASE_NETWORK => Some(Self::base()),
            _ => None,
        }
    }

    /// Transaction link on the network's block explorer.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_base)
    }
}

impl Default for ChainConfig {
    /// Defaults to Base Sepolia.
    fn default() -> Self {
        Self::base_sepolia()
    }
}
