use std::{collections::HashMap, time::Duration};

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

use super::{
    BaseHttpClientConfig, ChannelsConfig, DispatchRetryConfig, HealthConfig, HttpRetryConfig,
    deserialize_duration_from_seconds, deserialize_urls,
};
use crate::models::wallet::WalletSpec;

fn default_page_limit() -> u32 {
    200
}

fn default_poll_concurrency() -> usize {
    4
}

fn default_trend_window() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_dispatch_batch_limit() -> u32 {
    50
}

/// Amount floors for severity banding. Anything below `high_floor` that
/// still crossed its wallet threshold is `Medium`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SeverityBands {
    /// Amounts at or above this are critical.
    pub critical_floor: Decimal,
    /// Amounts at or above this (but below critical) are high.
    pub high_floor: Decimal,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            critical_floor: Decimal::from(1_000_000),
            high_floor: Decimal::from(500_000),
        }
    }
}

/// HTTP trigger-surface server configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the trigger surface listens on.
    pub listen_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Application configuration for Spyhop.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database URL for the SQLite store.
    pub database_url: String,

    /// Ordered list of equivalent ledger JSON-RPC endpoints; tried
    /// sequentially, first success wins.
    #[serde(deserialize_with = "deserialize_urls")]
    pub ledger_rpc_urls: Vec<Url>,

    /// Maximum entries requested per account_tx page.
    #[serde(default = "default_page_limit")]
    pub ledger_page_limit: u32,

    /// Concurrent wallet polls in a poll-all run.
    #[serde(default = "default_poll_concurrency")]
    pub poll_concurrency: usize,

    /// Alert threshold applied to wallets that do not set their own.
    pub default_threshold: Decimal,

    /// Severity banding floors.
    #[serde(default)]
    pub severity_bands: SeverityBands,

    /// Exchange-deposit alerts below this amount route to the general
    /// channel instead of the deposits channel.
    pub exchange_deposit_floor: Decimal,

    /// Trailing window for the trend enrichment attached to alert messages.
    #[serde(
        default = "default_trend_window",
        deserialize_with = "deserialize_duration_from_seconds",
        rename = "trend_window_secs"
    )]
    pub trend_window: Duration,

    /// Upper bound on unsent alerts re-dispatched per cycle.
    #[serde(default = "default_dispatch_batch_limit")]
    pub dispatch_batch_limit: u32,

    /// Transport retry policy for the ledger RPC client.
    #[serde(default)]
    pub http_retry: HttpRetryConfig,

    /// Base HTTP client tuning (timeouts, connection pool).
    #[serde(default)]
    pub http_base: BaseHttpClientConfig,

    /// Delivery retry policy for channel sends.
    #[serde(default, rename = "dispatch_retry")]
    pub dispatch_retry: DispatchRetryConfig,

    /// Outbound channel table.
    pub channels: ChannelsConfig,

    /// Known exchange deposit addresses, address -> exchange label.
    /// Externally maintained; injected into the classifier.
    #[serde(default)]
    pub exchanges: HashMap<String, String>,

    /// Health aggregator tunables.
    #[serde(default)]
    pub health: HealthConfig,

    /// Trigger-surface server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Watched wallets, synced into the store at startup.
    #[serde(default)]
    pub wallets: Vec<WalletSpec>,
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("SPYHOP").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
