use crate::{ChainConfig, CredoraError, SchemeServer};
use alloy::primitives::{Address, U256};

/// Server-side `exact` scheme: turns dollar prices into USDC atomic units.
pub struct ExactSchemeServer {
    config: ChainConfig,
}

impl ExactSchemeServer {
    pub fn new() -> Self {
        Self {
            config: ChainConfig::default(),
        }
    }

    pub fn with_chain_config(config: ChainConfig) -> Self {
        Self { config }
    }

    pub fn chain_config(&self) -> &ChainConfig {
        &self.config
    }
}

impl Default for ExactSchemeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemeServer for ExactSchemeServer {
    fn parse_price(&self, price: &str) -> Result<(U256, Address), CredoraError> {
        let invalid = |why: &str| CredoraError::InvalidPayload(format!("invalid price '{price}': {why}"));

        let trimmed = price.trim();
        let numeric = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
        if numeric.is_empty() {
            return Err(invalid("no numeric content"));
        }

        let (integer_part, fractional_part) = numeric.split_once('.').unwrap_or((numeric, ""));
        if integer_part.is_empty() && fractional_part.is_empty() {
            return Err(invalid("no numeric content"));
        }
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(integer_part) || !all_digits(fractional_part) {
            return Err(invalid("expected a decimal number"));
        }

        // Integer-only arithmetic: no floats anywhere in the pipeline.
        // Digits beyond the token's precision are truncated.
        let decimals = self.config.token_decimals as usize;
        let mut frac = fractional_part[..fractional_part.len().min(decimals)].to_string();
        while frac.len() < decimals {
            frac.push('0');
        }

        let parse = |s: &str| -> Result<U256, CredoraError> {
            if s.is_empty() {
                return Ok(U256::ZERO);
            }
            U256::from_str_radix(s, 10).map_err(|e| invalid(&e.to_string()))
        };

        let multiplier = U256::from(10u64).pow(U256::from(self.config.token_decimals));
        let whole = parse(integer_part)?
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("overflow"))?;
        let amount = whole
            .checked_add(parse(&frac)?)
            .ok_or_else(|| invalid("overflow"))?;

        Ok((amount, self.config.default_token))
    }
}
