//! Health samples and sweep reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observed status of one component at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Responding normally.
    Healthy,
    /// Responding, but impaired (e.g. no recent activity).
    Degraded,
    /// Not responding or failing.
    Down,
}

impl HealthStatus {
    /// TEXT column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
        }
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(HealthStatus::Healthy),
            "degraded" => Ok(HealthStatus::Degraded),
            "down" => Ok(HealthStatus::Down),
            other => Err(format!("unknown health status: {other}")),
        }
    }
}

/// One row per (service, check time). Append-only; queried in rolling
/// windows for trend detection, never updated or deleted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSample {
    /// Service name the sample describes (e.g. `poller`, `store`,
    /// `poller:<address>`).
    pub service: String,
    /// Observed status.
    pub status: HealthStatus,
    /// Measured response latency in milliseconds.
    pub latency_ms: u64,
    /// Error text for non-healthy samples.
    pub error: Option<String>,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
}

impl HealthSample {
    /// Convenience constructor stamping the current time.
    pub fn now(
        service: impl Into<String>,
        status: HealthStatus,
        latency_ms: u64,
        error: Option<String>,
    ) -> Self {
        Self {
            service: service.into(),
            status,
            latency_ms,
            error,
            checked_at: Utc::now(),
        }
    }
}

/// Result of one health sweep: the four check outcomes plus trend analysis
/// over the rolling sample windows.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Worst status across the sweep's checks.
    pub overall: HealthStatus,
    /// Per-check samples recorded by this sweep.
    pub checks: Vec<HealthSample>,
    /// Services with enough recent down samples to count as persistently
    /// failing rather than flapping.
    pub persistent_failures: Vec<String>,
    /// Slow samples observed in the slow window.
    pub slow_samples: u64,
    /// Whether the slow-sample count crossed the systemic threshold.
    pub systemic_slowdown: bool,
    /// Whether this sweep emitted the periodic all-healthy summary.
    pub summary_sent: bool,
}

impl HealthReport {
    /// Worst status across a set of samples; an empty set is healthy.
    pub fn overall_of(checks: &[HealthSample]) -> HealthStatus {
        let mut overall = HealthStatus::Healthy;
        for check in checks {
            match (check.status, overall) {
                (HealthStatus::Down, _) => return HealthStatus::Down,
                (HealthStatus::Degraded, HealthStatus::Healthy) => {
                    overall = HealthStatus::Degraded;
                }
                _ => {}
            }
        }
        overall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(
            "degraded".parse::<HealthStatus>().unwrap(),
            HealthStatus::Degraded
        );
        assert_eq!(HealthStatus::Down.as_str(), "down");
        assert!("fine".parse::<HealthStatus>().is_err());
    }

    #[test]
    fn test_overall_is_worst_status() {
        let checks = vec![
            HealthSample::now("a", HealthStatus::Healthy, 1, None),
            HealthSample::now("b", HealthStatus::Degraded, 1, None),
        ];
        assert_eq!(HealthReport::overall_of(&checks), HealthStatus::Degraded);

        let checks = vec![
            HealthSample::now("a", HealthStatus::Degraded, 1, None),
            HealthSample::now("b", HealthStatus::Down, 1, None),
        ];
        assert_eq!(HealthReport::overall_of(&checks), HealthStatus::Down);
    }

    #[test]
    fn test_overall_of_empty_is_healthy() {
        assert_eq!(HealthReport::overall_of(&[]), HealthStatus::Healthy);
    }
}
