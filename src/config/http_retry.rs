use serde::{Deserialize, Deserializer};
use std::time::Duration;

// --- Custom deserializer for Duration from milliseconds ---
fn deserialize_duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

// --- Custom deserializer for Duration from seconds ---
fn deserialize_duration_from_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

/// --- Default values for transport retry configuration settings ---
fn default_max_retries() -> u32 {
    1
}

fn default_initial_backoff_ms() -> Duration {
    Duration::from_millis(250)
}

fn default_max_backoff_secs() -> Duration {
    Duration::from_secs(10)
}

fn default_base_for_backoff() -> u32 {
    2
}

/// Serializable setting for jitter in transport retry policies
#[derive(Default, Debug, Clone, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JitterSetting {
    /// No jitter applied to the backoff duration
    None,
    /// Full jitter applied, randomizing the backoff duration
    #[default]
    Full,
}

/// Transport-level retry policy for pooled HTTP clients.
///
/// This covers transient failures inside a single logical request (connection
/// resets, 429/5xx responses). The ledger RPC client uses it per endpoint,
/// below the endpoint fallback chain. The channel sender deliberately runs
/// without transport retries because delivery attempts are counted and
/// audited one level up.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Hash)]
pub struct HttpRetryConfig {
    /// Maximum number of transport-level retries for transient errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base for exponential backoff calculations
    #[serde(default = "default_base_for_backoff")]
    pub base_for_backoff: u32,
    /// Initial backoff duration before the first retry
    #[serde(
        default = "default_initial_backoff_ms",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub initial_backoff_ms: Duration,
    /// Maximum backoff duration for retries
    #[serde(
        default = "default_max_backoff_secs",
        deserialize_with = "deserialize_duration_from_seconds"
    )]
    pub max_backoff_secs: Duration,
    /// Jitter to apply to the backoff duration
    #[serde(default)]
    pub jitter: JitterSetting,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_for_backoff: default_base_for_backoff(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            jitter: JitterSetting::default(),
        }
    }
}

impl HttpRetryConfig {
    /// A policy with no transport retries at all. Used for channel sends,
    /// where each HTTP request must correspond to exactly one recorded
    /// delivery attempt.
    pub fn no_transport_retries() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = HttpRetryConfig::default();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.base_for_backoff, 2);
        assert_eq!(config.initial_backoff_ms, Duration::from_millis(250));
        assert_eq!(config.max_backoff_secs, Duration::from_secs(10));
        assert_eq!(config.jitter, JitterSetting::Full);
    }

    #[test]
    fn test_no_transport_retries() {
        let config = HttpRetryConfig::no_transport_retries();
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let json = r#"{"max_retries": 4}"#;
        let config: HttpRetryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.initial_backoff_ms, Duration::from_millis(250));
    }
}
