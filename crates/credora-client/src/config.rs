use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use credora::loan::TxOverrides;
use credora::{ChainConfig, BASE_SEPOLIA_NETWORK};
use std::env;
use std::time::Duration;
use url::Url;

const DEFAULT_REPAY_INTERVAL_SECS: u64 = 5;

/// Agent settings, read once from the environment.
#[derive(Clone)]
pub struct AgentConfig {
    /// Wallet that signs payments and borrows from the loan facility
    pub signer: PrivateKeySigner,
    /// Resource server root, e.g. `http://localhost:3000`
    pub base_url: String,
    pub rpc_url: String,
    /// `CreditManager` contract
    pub loan_address: Address,
    pub chain: ChainConfig,
    /// Token watched and approved by the auto-repayer (network USDC unless overridden)
    pub token: Address,
    pub overrides: TxOverrides,
    pub auto_repay: bool,
    pub repay_interval: Duration,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("wallet", &self.signer.address())
            .field("base_url", &self.base_url)
            .field("rpc_url", &self.rpc_url)
            .field("loan_address", &self.loan_address)
            .field("network", &self.chain.network)
            .field("token", &self.token)
            .field("overrides", &self.overrides)
            .field("auto_repay", &self.auto_repay)
            .field("repay_interval", &self.repay_interval)
            .finish()
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source. Empty values count as unset.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::MissingRequired(key));

        let signer: PrivateKeySigner = required("PRIVATE_KEY")?
            .parse()
            .map_err(|_| ConfigError::InvalidPrivateKey)?;

        let base_url = http_url(required("BASE_URL")?)?;
        let rpc_url = http_url(required("CREDORA_RPC_URL")?)?;
        let loan_address = address(required("CREDORA_LOAN_ADDRESS")?)?;

        let network = var("CREDORA_NETWORK").unwrap_or_else(|| BASE_SEPOLIA_NETWORK.to_string());
        let chain =
            ChainConfig::for_network(&network).ok_or(ConfigError::UnknownNetwork(network))?;

        let token = match var("CREDORA_TOKEN_ADDRESS") {
            Some(raw) => address(raw)?,
            None => chain.default_token,
        };

        let overrides = TxOverrides {
            gas_price: number(&var, "CREDORA_GAS_PRICE")?,
            max_fee_per_gas: number(&var, "CREDORA_MAX_FEE_PER_GAS")?,
            max_priority_fee_per_gas: number(&var, "CREDORA_MAX_PRIORITY_FEE_PER_GAS")?,
        };

        let auto_repay = var("CREDORA_AUTO_REPAY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let repay_interval = Duration::from_secs(
            number(&var, "CREDORA_REPAY_INTERVAL_SECS")?
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REPAY_INTERVAL_SECS),
        );

        Ok(Self {
            signer,
            base_url: base_url.trim_end_matches('/').to_string(),
            rpc_url,
            loan_address,
            chain,
            token,
            overrides,
            auto_repay,
            repay_interval,
        })
    }
}

fn http_url(raw: String) -> Result<String, ConfigError> {
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(raw),
        _ => Err(ConfigError::InvalidUrl(raw)),
    }
}

fn address(raw: String) -> Result<Address, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
}

fn number<T: std::str::FromStr>(
    var: impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    var(key)
        .map(|raw| {
            raw.parse()
                .map_err(|_| ConfigError::InvalidNumber { var: key, value: raw })
        })
        .transpose()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("PRIVATE_KEY is not a valid secp256k1 private key")]
    InvalidPrivateKey,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // Well-known anvil dev key #0
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const LOAN: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn vars(extra: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let mut map: HashMap<String, String> = [
            ("PRIVATE_KEY", KEY),
            ("BASE_URL", "http://localhost:3000/"),
            ("CREDORA_RPC_URL", "https://sepolia.base.org"),
            ("CREDORA_LOAN_ADDRESS", LOAN),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in extra {
            map.insert(k.to_string(), v.to_string());
        }
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(
            config.signer.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.chain.network, "base-sepolia");
        assert_eq!(config.token, credora::BASE_SEPOLIA_USDC);
        assert_eq!(config.overrides, TxOverrides::default());
        assert!(!config.auto_repay);
        assert_eq!(config.repay_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_required() {
        for key in ["PRIVATE_KEY", "BASE_URL", "CREDORA_RPC_URL", "CREDORA_LOAN_ADDRESS"] {
            let err = AgentConfig::from_vars(vars(&[(key, "")])).unwrap_err();
            assert!(
                matches!(err, ConfigError::MissingRequired(k) if k == key),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            AgentConfig::from_vars(vars(&[("PRIVATE_KEY", "0x1234")])),
            Err(ConfigError::InvalidPrivateKey)
        ));
        assert!(matches!(
            AgentConfig::from_vars(vars(&[("CREDORA_LOAN_ADDRESS", "loan")])),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert!(matches!(
            AgentConfig::from_vars(vars(&[("BASE_URL", "localhost:3000")])),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            AgentConfig::from_vars(vars(&[("CREDORA_NETWORK", "solana")])),
            Err(ConfigError::UnknownNetwork(_))
        ));
        assert!(matches!(
            AgentConfig::from_vars(vars(&[("CREDORA_GAS_PRICE", "1.5 gwei")])),
            Err(ConfigError::InvalidNumber { var: "CREDORA_GAS_PRICE", .. })
        ));
    }

    #[test]
    fn test_overrides_and_repay_settings() {
        let config = AgentConfig::from_vars(vars(&[
            ("CREDORA_NETWORK", "base"),
            ("CREDORA_MAX_FEE_PER_GAS", "2000000000"),
            ("CREDORA_MAX_PRIORITY_FEE_PER_GAS", "1000000"),
            ("CREDORA_AUTO_REPAY", "true"),
            ("CREDORA_REPAY_INTERVAL_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.token, credora::BASE_USDC);
        assert_eq!(config.overrides.gas_price, None);
        assert_eq!(config.overrides.max_fee_per_gas, Some(2_000_000_000));
        assert_eq!(config.overrides.max_priority_fee_per_gas, Some(1_000_000));
        assert!(config.auto_repay);
        assert_eq!(config.repay_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_debug_hides_private_key() {
        let config = AgentConfig::from_vars(vars(&[])).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains(&KEY[2..]));
        assert!(debug.contains("wallet"));
    }
}
