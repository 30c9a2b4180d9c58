use alloy::primitives::Address;
use credora::{
    ChainConfig, ExactSchemeServer, PaymentRequirements, SchemeServer, BASE_SEPOLIA_NETWORK,
    DEFAULT_FACILITATOR_URL, SCHEME_NAME,
};
use std::collections::HashMap;
use std::env;
use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PREMIUM_PRICE: &str = "$0.001";
const DEFAULT_RATE_LIMIT_RPM: u64 = 60;
const MAX_TIMEOUT_SECONDS: u64 = 60;

/// Everything the server reads from the environment, loaded once at startup.
#[derive(Clone)]
pub struct ServerConfig {
    /// Receiving wallet for every priced route
    pub pay_to: Address,
    /// Facilitator that verifies and settles payments
    pub facilitator_url: String,
    /// HMAC shared secret for self-hosted facilitators (None = public facilitator)
    pub hmac_secret: Option<Vec<u8>>,
    pub port: u16,
    /// Human price of `GET /premium` (e.g. "$0.001")
    pub premium_price: String,
    /// Settlement network of `GET /premium`
    pub premium_network: String,
    /// CORS allowed origins (empty = localhost only)
    pub allowed_origins: Vec<String>,
    pub rate_limit_rpm: u64,
    /// Bearer token required for /metrics
    pub metrics_token: Option<String>,
    /// Serve /metrics without a token when none is configured
    pub public_metrics: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("pay_to", &self.pay_to)
            .field("facilitator_url", &self.facilitator_url)
            .field(
                "hmac_secret",
                &self.hmac_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("port", &self.port)
            .field("premium_price", &self.premium_price)
            .field("premium_network", &self.premium_network)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("public_metrics", &self.public_metrics)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source. Empty values count as unset.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // Required: receiving address
        let pay_to_str = var("PAY_TO_ADDRESS").ok_or(ConfigError::MissingRequired("PAY_TO_ADDRESS"))?;
        let pay_to: Address = pay_to_str
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(pay_to_str.clone()))?;
        if pay_to == Address::ZERO {
            return Err(ConfigError::InvalidAddress(pay_to_str));
        }

        let facilitator_url =
            var("FACILITATOR_URL").unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string());
        let parsed = Url::parse(&facilitator_url)
            .map_err(|_| ConfigError::InvalidUrl(facilitator_url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(facilitator_url));
        }

        let hmac_secret = var("FACILITATOR_SHARED_SECRET").map(String::into_bytes);

        // A port that is set but unparseable is an error, not a silent default.
        let port = match var("PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::InvalidPort(p))?,
            None => DEFAULT_PORT,
        };

        let premium_price =
            var("PREMIUM_PRICE").unwrap_or_else(|| DEFAULT_PREMIUM_PRICE.to_string());
        let premium_network =
            var("PREMIUM_NETWORK").unwrap_or_else(|| BASE_SEPOLIA_NETWORK.to_string());

        let allowed_origins: Vec<String> = var("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let rate_limit_rpm = var("RATE_LIMIT_RPM")
            .and_then(|r| r.parse().ok())
            .filter(|r| *r > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPM);

        let metrics_token = var("METRICS_TOKEN");
        let public_metrics = var("CREDORA_PUBLIC_METRICS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            pay_to,
            facilitator_url,
            hmac_secret,
            port,
            premium_price,
            premium_network,
            allowed_origins,
            rate_limit_rpm,
            metrics_token,
            public_metrics,
        })
    }

    /// Price table for the routes this server gates.
    pub fn payment_config(&self) -> Result<PaymentConfig, ConfigError> {
        PaymentConfigBuilder::new(self.pay_to)
            .route(
                "GET",
                "/premium",
                &self.premium_price,
                &self.premium_network,
                "Premium plan data",
            )?
            .build()
    }
}

/// Payment configuration for a single route.
#[derive(Debug, Clone)]
pub struct RoutePaymentConfig {
    pub requirements: PaymentRequirements,
}

/// Holds payment configuration for all protected routes, keyed by `"METHOD /path"`.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub routes: HashMap<String, RoutePaymentConfig>,
}

impl PaymentConfig {
    /// Look up the payment config for a given route (e.g. `GET /premium`).
    pub fn get_route(&self, method: &str, path: &str) -> Option<&RoutePaymentConfig> {
        self.routes.get(&route_key(method, path))
    }
}

fn route_key(method: &str, path: &str) -> String {
    format!("{} {path}", method.to_ascii_uppercase())
}

/// Builder for a [`PaymentConfig`] with one or more priced routes.
pub struct PaymentConfigBuilder {
    pay_to: Address,
    routes: HashMap<String, RoutePaymentConfig>,
}

impl PaymentConfigBuilder {
    pub fn new(pay_to: Address) -> Self {
        Self {
            pay_to,
            routes: HashMap::new(),
        }
    }

    /// Register a priced route, e.g. `route("GET", "/premium", "$0.001", "base-sepolia", "...")`.
    ///
    /// `price` is converted to atomic units of the network's USDC deployment.
    pub fn route(
        mut self,
        method: &str,
        path: &str,
        price: &str,
        network: &str,
        description: &str,
    ) -> Result<Self, ConfigError> {
        let chain = ChainConfig::for_network(network)
            .ok_or_else(|| ConfigError::UnknownNetwork(network.to_string()))?;
        let scheme = ExactSchemeServer::with_chain_config(chain.clone());
        let (amount, asset) = scheme
            .parse_price(price)
            .map_err(|e| ConfigError::InvalidPrice(format!("{price}: {e}")))?;

        self.routes.insert(
            route_key(method, path),
            RoutePaymentConfig {
                requirements: PaymentRequirements {
                    scheme: SCHEME_NAME.to_string(),
                    network: chain.network.clone(),
                    max_amount_required: amount,
                    resource: path.to_string(),
                    description: description.to_string(),
                    mime_type: "application/json".to_string(),
                    pay_to: self.pay_to.to_string(),
                    max_timeout_seconds: MAX_TIMEOUT_SECONDS,
                    asset: asset.to_string(),
                    extra: Some(serde_json::json!({
                        "name": chain.eip712_domain_name,
                        "version": chain.eip712_domain_version,
                    })),
                },
            },
        );
        Ok(self)
    }

    /// Consume the builder. At least one route is required.
    pub fn build(self) -> Result<PaymentConfig, ConfigError> {
        if self.routes.is_empty() {
            return Err(ConfigError::NoRoutes);
        }
        Ok(PaymentConfig {
            routes: self.routes,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("no priced routes configured")]
    NoRoutes,
}
