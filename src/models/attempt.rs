//! Notification attempt audit rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Attempt created but not yet resolved.
    Pending,
    /// Channel accepted the message.
    Success,
    /// Channel rejected the message or the request failed.
    Failed,
}

impl AttemptStatus {
    /// TEXT column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AttemptStatus::Pending),
            "success" => Ok(AttemptStatus::Success),
            "failed" => Ok(AttemptStatus::Failed),
            other => Err(format!("unknown attempt status: {other}")),
        }
    }
}

/// One row per (alert, channel, attempt number). Append-only: rows are
/// inserted per try and never mutated, giving a delivery audit trail
/// independent of in-memory error handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAttempt {
    /// Alert this attempt belongs to.
    pub alert_id: i64,
    /// Channel target id the attempt was sent to.
    pub channel: String,
    /// 1-based attempt number within its delivery sequence.
    pub attempt: u32,
    /// Outcome.
    pub status: AttemptStatus,
    /// Error text for failed attempts.
    pub error: Option<String>,
    /// When the attempt was made.
    pub sent_at: DateTime<Utc>,
}
