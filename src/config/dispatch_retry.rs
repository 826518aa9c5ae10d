use std::time::Duration;

use serde::Deserialize;

use super::deserialize_duration_from_ms;

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_millis(10_000)
}

/// Delivery-level retry policy for channel sends.
///
/// Unlike the transport retry policy, every attempt governed by this config
/// is individually recorded as a `NotificationAttempt` row, so the attempt
/// count here is the one operators see in the audit trail.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DispatchRetryConfig {
    /// Maximum number of delivery attempts on a channel
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt thereafter
    #[serde(
        default = "default_base_delay",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub base_delay_ms: Duration,
    /// Upper bound on the backoff delay
    #[serde(
        default = "default_max_delay",
        deserialize_with = "deserialize_duration_from_ms"
    )]
    pub max_delay_ms: Duration,
}

impl Default for DispatchRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl DispatchRetryConfig {
    /// Backoff delay after the given (1-based) failed attempt:
    /// `base * 2^(attempt - 1)`, capped at `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay_ms.saturating_mul(factor);
        delay.min(self.max_delay_ms)
    }

    /// The same policy reduced to a single attempt. Used for the escalation
    /// send, which gets exactly one try.
    pub fn single_attempt(&self) -> Self {
        Self {
            max_attempts: 1,
            ..self.clone()
        }
    }
}
