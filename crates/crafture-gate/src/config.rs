//! Gate configuration from environment variables.

use std::time::Duration;

use crate::constants::{ChainConfig, DEFAULT_API_URL};
use crate::GateError;

/// Runtime configuration for a payment gate session.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Base URL of the prompt/generation API (env: CRAFTURE_API_URL).
    pub api_url: String,
    /// Network payments must be made on (env: REQUIRED_CHAIN_ID, RPC_URL).
    pub chain: ChainConfig,
    /// Upper bound on the finality wait (env: CONFIRMATION_TIMEOUT_SECS, default: 300).
    pub confirmation_timeout: Duration,
    /// Timeout for unlock and catalog calls (env: HTTP_TIMEOUT_SECS, default: 30).
    pub http_timeout: Duration,
    /// Timeout for generation calls (env: GENERATION_TIMEOUT_SECS, default: 180).
    pub generation_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            chain: ChainConfig::default(),
            confirmation_timeout: Duration::from_secs(300),
            http_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(180),
        }
    }
}

impl GateConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, GateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GateError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &str, default: u64| -> Result<u64, GateError> {
            match get(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map_err(|e| GateError::Config(format!("{key}={raw}: {e}"))),
                None => Ok(default),
            }
        };

        let defaults = Self::default();
        let mut chain = defaults.chain;
        chain.chain_id = number("REQUIRED_CHAIN_ID", chain.chain_id)?;
        if let Some(rpc_url) = get("RPC_URL") {
            chain.rpc_url = rpc_url;
        }

        let confirmation_secs = number("CONFIRMATION_TIMEOUT_SECS", 300)?;
        if confirmation_secs == 0 {
            return Err(GateError::Config(
                "CONFIRMATION_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            api_url: get("CRAFTURE_API_URL").unwrap_or(defaults.api_url),
            chain,
            confirmation_timeout: Duration::from_secs(confirmation_secs),
            http_timeout: Duration::from_secs(number("HTTP_TIMEOUT_SECS", 30)?),
            generation_timeout: Duration::from_secs(number("GENERATION_TIMEOUT_SECS", 180)?),
        })
    }
}
