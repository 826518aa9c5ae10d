use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration_from_seconds;

fn default_idle_per_host() -> usize {
    10
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Configuration for the base HTTP client shared by all outbound calls.
///
/// Every outbound request (ledger RPC, channel send) runs on a client built
/// from this config, so no call in the pipeline can wait unboundedly.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BaseHttpClientConfig {
    /// Maximum idle connections per host
    #[serde(default = "default_idle_per_host")]
    pub max_idle_per_host: usize,

    /// Timeout for idle connections
    #[serde(
        default = "default_idle_timeout",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub idle_timeout: Duration,

    /// Timeout for establishing connections
    #[serde(
        default = "default_connect_timeout",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub connect_timeout: Duration,

    /// Total timeout for a single request, headers to body
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub request_timeout: Duration,
}

impl Default for BaseHttpClientConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_idle_per_host(),
            idle_timeout: default_idle_timeout(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_http_client_config_default() {
        let config = BaseHttpClientConfig::default();
        assert_eq!(config.max_idle_per_host, 10);
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_base_http_client_config_partial_json_uses_defaults() {
        let json = r#"{
            "max_idle_per_host": 15,
            "request_timeout": 5
        }"#;
        let config: BaseHttpClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_idle_per_host, 15);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }
}
