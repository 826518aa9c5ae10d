use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration_from_seconds;

fn default_check_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_down_window() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_persistent_down_count() -> u64 {
    3
}

fn default_slow_threshold_ms() -> u64 {
    5_000
}

fn default_slow_window() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_slow_count_threshold() -> u64 {
    10
}

fn default_summary_interval() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_activity_alert_window() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_activity_sample_window() -> Duration {
    Duration::from_secs(60 * 60)
}

/// Tunables for the health aggregator: per-check timeouts, the rolling
/// windows used for trend analysis, and the summary cadence.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HealthConfig {
    /// Timeout applied to each individual check in a sweep.
    #[serde(
        default = "default_check_timeout",
        deserialize_with = "deserialize_duration_from_seconds",
        rename = "check_timeout_secs"
    )]
    pub check_timeout: Duration,

    /// Window over which down samples are counted for persistence detection.
    #[serde(
        default = "default_down_window",
        deserialize_with = "deserialize_duration_from_seconds",
        rename = "down_window_secs"
    )]
    pub down_window: Duration,

    /// Down samples within the window that classify a persistent failure.
    #[serde(default = "default_persistent_down_count")]
    pub persistent_down_count: u64,

    /// Latency above which a sample counts as slow.
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,

    /// Window over which slow samples are counted.
    #[serde(
        default = "default_slow_window",
        deserialize_with = "deserialize_duration_from_seconds",
        rename = "slow_window_secs"
    )]
    pub slow_window: Duration,

    /// Slow samples within the window that signal systemic degradation.
    #[serde(default = "default_slow_count_threshold")]
    pub slow_count_threshold: u64,

    /// Minimum interval between all-healthy summary notifications.
    #[serde(
        default = "default_summary_interval",
        deserialize_with = "deserialize_duration_from_seconds",
        rename = "summary_interval_secs"
    )]
    pub summary_interval: Duration,

    /// How far back to look for any fired alert in the activity check.
    #[serde(
        default = "default_activity_alert_window",
        deserialize_with = "deserialize_duration_from_seconds",
        rename = "activity_alert_window_secs"
    )]
    pub activity_alert_window: Duration,

    /// How far back to look for any recorded health sample; silence here
    /// means the scheduler itself is not running.
    #[serde(
        default = "default_activity_sample_window",
        deserialize_with = "deserialize_duration_from_seconds",
        rename = "activity_sample_window_secs"
    )]
    pub activity_sample_window: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_timeout: default_check_timeout(),
            down_window: default_down_window(),
            persistent_down_count: default_persistent_down_count(),
            slow_threshold_ms: default_slow_threshold_ms(),
            slow_window: default_slow_window(),
            slow_count_threshold: default_slow_count_threshold(),
            summary_interval: default_summary_interval(),
            activity_alert_window: default_activity_alert_window(),
            activity_sample_window: default_activity_sample_window(),
        }
    }
}
