//! Runtime configuration
//!
//! Every setting can be given as a flag or an environment variable; a
//! `.env` file in the working directory is honored. Values are fixed for
//! the lifetime of the process.

use crate::{
    constants::{
        BIRDEYE_API_URL, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SUPPLY, DEFAULT_TOKEN_ADDRESS,
        POLL_INTERVAL_MS, REQUEST_TIMEOUT_MS,
    },
    error::ConfigError,
    providers::BirdeyeSettings,
    tracker::TrackerSettings,
};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Price-caching proxy for a token's market cap
#[derive(Debug, Clone, Parser)]
#[command(name = "marketcap-cache", version, about)]
pub struct Config {
    /// Contract address of the tracked token
    #[arg(long, env = "TOKEN_ADDRESS", default_value = DEFAULT_TOKEN_ADDRESS)]
    pub token_address: String,

    /// Total token supply, in whole tokens
    #[arg(long, env = "TOKEN_SUPPLY", default_value_t = DEFAULT_SUPPLY)]
    pub supply: u64,

    /// Birdeye API key
    #[arg(long, env = "BIRDEYE_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Address to listen on
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Refresh period in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Timeout for each upstream request in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,

    /// Birdeye API base URL
    #[arg(long, env = "BIRDEYE_API_URL", default_value = BIRDEYE_API_URL)]
    pub api_base_url: String,

    /// Chain spellings to try, in order
    #[arg(long, env = "BIRDEYE_CHAINS", value_delimiter = ',', default_value = "bsc,BNB")]
    pub chains: Vec<String>,
}

impl Config {
    /// Loads `.env` (if present) and parses flags and environment
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    /// Checks values clap cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero {
                name: "poll interval",
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                name: "request timeout",
            });
        }
        if self.supply == 0 {
            return Err(ConfigError::Zero { name: "supply" });
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Empty { name: "API key" });
        }
        if self.chains.iter().all(|c| c.trim().is_empty()) {
            return Err(ConfigError::Empty { name: "chains" });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn birdeye(&self) -> BirdeyeSettings {
        BirdeyeSettings {
            api_key: self.api_key.trim().to_string(),
            base_url: self.api_base_url.clone(),
            chains: self
                .chains
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            request_timeout: self.request_timeout(),
        }
    }

    pub fn tracker(&self) -> TrackerSettings {
        TrackerSettings {
            token: self.token_address.clone(),
            supply: self.supply,
            poll_interval: self.poll_interval(),
        }
    }
}
