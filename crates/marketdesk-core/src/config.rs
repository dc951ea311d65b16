//! Environment-driven runtime configuration.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `MARKETDESK_PROVIDER` | `alpaca`, `polygon`, `finnhub` or `synthetic` (`mock` accepted) |
//! | `MARKETDESK_ALPACA_API_KEY` / `MARKETDESK_ALPACA_SECRET_KEY` | Alpaca key pair |
//! | `MARKETDESK_ALPACA_API_BASE_URL` / `MARKETDESK_ALPACA_DATA_BASE_URL` | Alpaca endpoint overrides |
//! | `MARKETDESK_POLYGON_API_KEY` | Polygon key |
//! | `MARKETDESK_FINNHUB_API_KEY` | Finnhub key (REST and trade socket) |
//! | `MARKETDESK_FINNHUB_WS_URL` | trade socket override |
//! | `MARKETDESK_SYNTHETIC_SEED` | seed for the offline provider |
//! | `MARKETDESK_POLL_INTRADAY_MS` / `MARKETDESK_POLL_DEFAULT_MS` | poll cadence |
//! | `MARKETDESK_HTTP_TIMEOUT_MS` | per-request timeout for live providers |
//! | `MARKETDESK_API_TOKEN` | session credential |
//!
//! Without `MARKETDESK_PROVIDER` the first provider with complete credentials
//! is used, in the order Alpaca, Polygon, Finnhub; with none, the synthetic
//! provider.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::adapters::synthetic::DEFAULT_SEED;
use crate::adapters::{AlpacaAdapter, FinnhubAdapter, PolygonAdapter, SyntheticProvider};
use crate::provider::MarketDataProvider;
use crate::provider_policy::ProviderPolicy;
use crate::stream::{StreamConfig, DEFAULT_STREAM_URL};
use crate::{PollIntervals, ProviderId};

pub const ENV_PROVIDER: &str = "MARKETDESK_PROVIDER";
pub const ENV_ALPACA_API_KEY: &str = "MARKETDESK_ALPACA_API_KEY";
pub const ENV_ALPACA_SECRET_KEY: &str = "MARKETDESK_ALPACA_SECRET_KEY";
pub const ENV_ALPACA_API_BASE_URL: &str = "MARKETDESK_ALPACA_API_BASE_URL";
pub const ENV_ALPACA_DATA_BASE_URL: &str = "MARKETDESK_ALPACA_DATA_BASE_URL";
pub const ENV_POLYGON_API_KEY: &str = "MARKETDESK_POLYGON_API_KEY";
pub const ENV_FINNHUB_API_KEY: &str = "MARKETDESK_FINNHUB_API_KEY";
pub const ENV_FINNHUB_WS_URL: &str = "MARKETDESK_FINNHUB_WS_URL";
pub const ENV_SYNTHETIC_SEED: &str = "MARKETDESK_SYNTHETIC_SEED";
pub const ENV_POLL_INTRADAY_MS: &str = "MARKETDESK_POLL_INTRADAY_MS";
pub const ENV_POLL_DEFAULT_MS: &str = "MARKETDESK_POLL_DEFAULT_MS";
pub const ENV_HTTP_TIMEOUT_MS: &str = "MARKETDESK_HTTP_TIMEOUT_MS";
pub const ENV_API_TOKEN: &str = "MARKETDESK_API_TOKEN";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("provider '{provider}' selected but {var} is not set")]
    MissingCredential { provider: ProviderId, var: &'static str },
}

#[derive(Clone, PartialEq, Eq)]
struct AlpacaKeys {
    key_id: String,
    secret_key: String,
}

/// Resolved runtime configuration.
#[derive(Clone)]
pub struct Config {
    provider: ProviderId,
    alpaca: Option<AlpacaKeys>,
    alpaca_api_base_url: Option<String>,
    alpaca_data_base_url: Option<String>,
    polygon_api_key: Option<String>,
    finnhub_api_key: Option<String>,
    stream_url: String,
    synthetic_seed: u64,
    poll_intervals: PollIntervals,
    http_timeout_ms: Option<u64>,
    api_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderId::Synthetic,
            alpaca: None,
            alpaca_api_base_url: None,
            alpaca_data_base_url: None,
            polygon_api_key: None,
            finnhub_api_key: None,
            stream_url: String::from(DEFAULT_STREAM_URL),
            synthetic_seed: DEFAULT_SEED,
            poll_intervals: PollIntervals::default(),
            http_timeout_ms: None,
            api_token: None,
        }
    }
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let alpaca = match (read(ENV_ALPACA_API_KEY), read(ENV_ALPACA_SECRET_KEY)) {
            (Some(key_id), Some(secret_key)) => Some(AlpacaKeys { key_id, secret_key }),
            _ => None,
        };

        let defaults = PollIntervals::default();
        let mut config = Self {
            provider: ProviderId::Synthetic,
            alpaca,
            alpaca_api_base_url: read(ENV_ALPACA_API_BASE_URL),
            alpaca_data_base_url: read(ENV_ALPACA_DATA_BASE_URL),
            polygon_api_key: read(ENV_POLYGON_API_KEY),
            finnhub_api_key: read(ENV_FINNHUB_API_KEY),
            stream_url: read(ENV_FINNHUB_WS_URL).unwrap_or_else(|| String::from(DEFAULT_STREAM_URL)),
            synthetic_seed: parse_u64(ENV_SYNTHETIC_SEED, read(ENV_SYNTHETIC_SEED))?
                .unwrap_or(DEFAULT_SEED),
            poll_intervals: PollIntervals {
                intraday: parse_millis(ENV_POLL_INTRADAY_MS, read(ENV_POLL_INTRADAY_MS))?
                    .unwrap_or(defaults.intraday),
                default: parse_millis(ENV_POLL_DEFAULT_MS, read(ENV_POLL_DEFAULT_MS))?
                    .unwrap_or(defaults.default),
            },
            http_timeout_ms: parse_millis(ENV_HTTP_TIMEOUT_MS, read(ENV_HTTP_TIMEOUT_MS))?
                .map(|timeout| timeout.as_millis() as u64),
            api_token: read(ENV_API_TOKEN),
        };

        config.provider = match read(ENV_PROVIDER) {
            Some(value) => {
                let provider = value.parse::<ProviderId>().map_err(|error| ConfigError::InvalidValue {
                    var: ENV_PROVIDER,
                    value: value.clone(),
                    reason: error.to_string(),
                })?;
                config.ensure_credentials(provider)?;
                provider
            }
            None => config.detect_provider(),
        };

        Ok(config)
    }

    /// Switches to `provider`, failing when its credentials are missing.
    pub fn with_provider(mut self, provider: ProviderId) -> Result<Self, ConfigError> {
        self.ensure_credentials(provider)?;
        self.provider = provider;
        Ok(self)
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_finnhub_api_key(mut self, key: impl Into<String>) -> Self {
        self.finnhub_api_key = Some(key.into());
        self
    }

    pub fn with_synthetic_seed(mut self, seed: u64) -> Self {
        self.synthetic_seed = seed;
        self
    }

    pub fn with_poll_intervals(mut self, poll_intervals: PollIntervals) -> Self {
        self.poll_intervals = poll_intervals;
        self
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub const fn poll_intervals(&self) -> PollIntervals {
        self.poll_intervals
    }

    pub const fn synthetic_seed(&self) -> u64 {
        self.synthetic_seed
    }

    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    /// Providers whose credentials are present. Synthetic is always available.
    pub fn available_providers(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .into_iter()
            .filter(|provider| self.ensure_credentials(*provider).is_ok())
            .collect()
    }

    /// Builds the selected provider.
    pub fn build_provider(&self) -> Result<Arc<dyn MarketDataProvider>, ConfigError> {
        self.ensure_credentials(self.provider)?;
        let policy = ProviderPolicy::default_for(self.provider).map(|policy| match self.http_timeout_ms {
            Some(timeout_ms) => policy.with_timeout_ms(timeout_ms),
            None => policy,
        });

        let provider: Arc<dyn MarketDataProvider> = match (self.provider, &self.alpaca) {
            (ProviderId::Alpaca, Some(keys)) => {
                let mut adapter = AlpacaAdapter::new(keys.key_id.clone(), keys.secret_key.clone());
                if self.alpaca_api_base_url.is_some() || self.alpaca_data_base_url.is_some() {
                    adapter = adapter.with_base_urls(
                        self.alpaca_api_base_url
                            .clone()
                            .unwrap_or_else(|| String::from(crate::adapters::alpaca::DEFAULT_API_BASE_URL)),
                        self.alpaca_data_base_url
                            .clone()
                            .unwrap_or_else(|| String::from(crate::adapters::alpaca::DEFAULT_DATA_BASE_URL)),
                    );
                }
                Arc::new(adapter.with_policy(policy))
            }
            (ProviderId::Polygon, _) => Arc::new(
                PolygonAdapter::new(self.polygon_api_key.clone().unwrap_or_default()).with_policy(policy),
            ),
            (ProviderId::Finnhub, _) => Arc::new(
                FinnhubAdapter::new(self.finnhub_api_key.clone().unwrap_or_default()).with_policy(policy),
            ),
            _ => Arc::new(SyntheticProvider::new(self.synthetic_seed)),
        };
        Ok(provider)
    }

    /// Trade socket settings; requires the Finnhub key.
    pub fn stream_config(&self) -> Result<StreamConfig, ConfigError> {
        let token = self
            .finnhub_api_key
            .clone()
            .ok_or(ConfigError::MissingCredential {
                provider: ProviderId::Finnhub,
                var: ENV_FINNHUB_API_KEY,
            })?;
        let mut config = StreamConfig::new(token);
        config.url = self.stream_url.clone();
        Ok(config)
    }

    fn detect_provider(&self) -> ProviderId {
        [ProviderId::Alpaca, ProviderId::Polygon, ProviderId::Finnhub]
            .into_iter()
            .find(|provider| self.ensure_credentials(*provider).is_ok())
            .unwrap_or(ProviderId::Synthetic)
    }

    fn ensure_credentials(&self, provider: ProviderId) -> Result<(), ConfigError> {
        let missing = |var| Err(ConfigError::MissingCredential { provider, var });
        match provider {
            ProviderId::Alpaca if self.alpaca.is_none() => missing(ENV_ALPACA_API_KEY),
            ProviderId::Polygon if self.polygon_api_key.is_none() => missing(ENV_POLYGON_API_KEY),
            ProviderId::Finnhub if self.finnhub_api_key.is_none() => missing(ENV_FINNHUB_API_KEY),
            _ => Ok(()),
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field("available", &self.available_providers())
            .field("stream_url", &self.stream_url)
            .field("synthetic_seed", &self.synthetic_seed)
            .field("poll_intervals", &self.poll_intervals)
            .field("http_timeout_ms", &self.http_timeout_ms)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn parse_u64(var: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    value
        .map(|value| {
            value.parse::<u64>().map_err(|error| ConfigError::InvalidValue {
                var,
                reason: error.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_millis(var: &'static str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    match parse_u64(var, value)? {
        Some(0) => Err(ConfigError::InvalidValue {
            var,
            value: String::from("0"),
            reason: String::from("must be greater than zero"),
        }),
        other => Ok(other.map(Duration::from_millis)),
    }
}
