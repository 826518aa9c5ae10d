//! The bounded retry-with-backoff delivery primitive.
//!
//! Both the alert dispatcher and the health aggregator deliver through
//! this function; only the dispatcher asks for attempt auditing.

use chrono::Utc;

use super::sender::ChannelSender;
use crate::{
    config::{ChannelConfig, DispatchRetryConfig},
    models::attempt::{AttemptStatus, NotificationAttempt},
    persistence::traits::AppRepository,
};

/// Outcome of a retried delivery sequence.
#[derive(Debug)]
pub struct SendOutcome {
    /// The 1-based attempt that succeeded, if any.
    pub delivered_on: Option<u32>,
    /// Attempts actually made.
    pub attempts: u32,
    /// The last failure, when delivery never succeeded.
    pub last_error: Option<String>,
}

impl SendOutcome {
    /// Whether the message was delivered.
    pub fn delivered(&self) -> bool {
        self.delivered_on.is_some()
    }
}

/// Sends `text` to `channel`, retrying failed attempts with exponential
/// backoff (`base * 2^(attempt-1)`, capped) up to `policy.max_attempts`.
///
/// When `audit_alert_id` is set, every try is recorded as a
/// `NotificationAttempt` row immediately after it resolves; an audit write
/// failure is logged but never masks the delivery outcome.
pub async fn send_with_retry<R: AppRepository + ?Sized>(
    sender: &dyn ChannelSender,
    repo: &R,
    audit_alert_id: Option<i64>,
    channel: &ChannelConfig,
    text: &str,
    policy: &DispatchRetryConfig,
) -> SendOutcome {
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        let result = sender.send(channel, text).await;

        if let Some(alert_id) = audit_alert_id {
            let row = NotificationAttempt {
                alert_id,
                channel: channel.target_id.clone(),
                attempt,
                status: match &result {
                    Ok(()) => AttemptStatus::Success,
                    Err(_) => AttemptStatus::Failed,
                },
                error: result.as_ref().err().map(|e| e.to_string()),
                sent_at: Utc::now(),
            };
            if let Err(e) = repo.record_attempt(&row).await {
                tracing::error!(alert_id, attempt, error = %e, "Failed to record notification attempt.");
            }
        }

        match result {
            Ok(()) => {
                return SendOutcome {
                    delivered_on: Some(attempt),
                    attempts: attempt,
                    last_error: None,
                };
            }
            Err(e) => {
                tracing::warn!(
                    target_id = %channel.target_id,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Channel send attempt failed."
                );
                last_error = Some(e.to_string());
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }

    SendOutcome {
        delivered_on: None,
        attempts: policy.max_attempts,
        last_error,
    }
}
