//! # Alert Dispatcher
//!
//! Delivers whale alerts to their routed channels with bounded retries and
//! a single escalation send to the system channel when the primary channel
//! is exhausted.
//!
//! Delivery is at-least-once: an alert whose delivery fails outright stays
//! `sent = false` and is picked up again by a later run. Duplicate sends
//! after operator-triggered reprocessing are accepted over silent loss.

pub mod error;
pub mod message;
pub mod retry;
pub mod sender;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::{
    alerting::router::route,
    config::{ChannelRoute, ChannelsConfig, DispatchRetryConfig},
    models::{
        RunStatus,
        alert::WhaleAlert,
        transaction::{LedgerTransaction, WalletActivity},
    },
    persistence::traits::AppRepository,
};

use error::DispatchError;
use retry::send_with_retry;
use sender::ChannelSender;

/// Structured result of dispatching one alert.
#[derive(Debug, Serialize)]
pub struct DeliveryResult {
    /// The alert that was dispatched.
    pub alert_id: i64,
    /// Whether any channel accepted the message.
    pub delivered: bool,
    /// Target id of the channel that carried the message, if delivered.
    pub channel: Option<String>,
    /// Whether the escalation path was used.
    pub escalated: bool,
    /// Total attempts made across primary and escalation.
    pub attempts: u32,
    /// The final error when delivery failed everywhere.
    pub error: Option<String>,
}

/// Aggregated result of a reprocessing run over unsent alerts.
#[derive(Debug, Serialize)]
pub struct DispatchSummary {
    /// Overall status derived from per-alert results.
    pub status: RunStatus,
    /// Alerts that reached a channel.
    pub delivered: usize,
    /// Alerts that failed everywhere and remain unsent.
    pub failed: usize,
    /// Per-alert results.
    pub results: Vec<DeliveryResult>,
}

/// Routes, renders, and delivers whale alerts.
pub struct AlertDispatcher<R: AppRepository + ?Sized> {
    repo: Arc<R>,
    sender: Arc<dyn ChannelSender>,
    channels: ChannelsConfig,
    retry: DispatchRetryConfig,
    exchange_deposit_floor: Decimal,
    trend_window: Duration,
}

impl<R: AppRepository + ?Sized> AlertDispatcher<R> {
    /// Creates a new dispatcher. The channel table is injected here; nothing
    /// else in the crate knows where alerts land.
    pub fn new(
        repo: Arc<R>,
        sender: Arc<dyn ChannelSender>,
        channels: ChannelsConfig,
        retry: DispatchRetryConfig,
        exchange_deposit_floor: Decimal,
        trend_window: Duration,
    ) -> Self {
        Self {
            repo,
            sender,
            channels,
            retry,
            exchange_deposit_floor,
            trend_window,
        }
    }

    /// Looks up an alert by id and dispatches it.
    pub async fn dispatch_by_id(
        &self,
        alert_id: i64,
        test_mode: bool,
    ) -> Result<DeliveryResult, DispatchError> {
        let alert = self
            .repo
            .alert_by_id(alert_id)
            .await?
            .ok_or(DispatchError::AlertNotFound(alert_id))?;
        self.dispatch(&alert, test_mode).await
    }

    /// Dispatches one alert: primary channel with bounded retries, then one
    /// escalation send to the system channel.
    ///
    /// In `test_mode` the message is delivered but the alert is left
    /// untouched and no attempt rows are recorded.
    #[tracing::instrument(skip(self, alert), fields(alert_id = alert.id), level = "info")]
    pub async fn dispatch(
        &self,
        alert: &WhaleAlert,
        test_mode: bool,
    ) -> Result<DeliveryResult, DispatchError> {
        let tx = self.transaction_for(alert).await;
        let trend = self.trend_snapshot(tx.as_ref()).await;
        let text = message::render_alert(alert, tx.as_ref(), trend.as_ref());

        let primary_route = route(alert, self.exchange_deposit_floor);
        let primary = self.channels.resolve(primary_route);
        let audit = if test_mode { None } else { Some(alert.id) };

        let outcome = send_with_retry(
            self.sender.as_ref(),
            self.repo.as_ref(),
            audit,
            primary,
            &text,
            &self.retry,
        )
        .await;

        if let Some(attempt) = outcome.delivered_on {
            if !test_mode {
                self.mark_sent(alert, &primary.target_id, false, attempt, trend.as_ref())
                    .await?;
            }
            return Ok(DeliveryResult {
                alert_id: alert.id,
                delivered: true,
                channel: Some(primary.target_id.clone()),
                escalated: false,
                attempts: attempt,
                error: None,
            });
        }

        // Primary exhausted: exactly one escalation send to the system
        // channel, through the same retry primitive.
        tracing::warn!(
            alert_id = alert.id,
            primary = %primary.target_id,
            attempts = outcome.attempts,
            "Primary channel exhausted; escalating to system channel."
        );
        let system = self.channels.resolve(ChannelRoute::System);
        let escalation_text = format!(
            "{}\n{}",
            message::escalation_prefix(&primary.target_id, outcome.attempts),
            text
        );
        let escalation = send_with_retry(
            self.sender.as_ref(),
            self.repo.as_ref(),
            audit,
            system,
            &escalation_text,
            &self.retry.single_attempt(),
        )
        .await;

        let total_attempts = outcome.attempts + escalation.attempts;
        if escalation.delivered() {
            if !test_mode {
                self.mark_sent(alert, &system.target_id, true, total_attempts, trend.as_ref())
                    .await?;
            }
            return Ok(DeliveryResult {
                alert_id: alert.id,
                delivered: true,
                channel: Some(system.target_id.clone()),
                escalated: true,
                attempts: total_attempts,
                error: None,
            });
        }

        // Both paths exhausted: the alert stays unsent and eligible for a
        // later reprocessing run.
        tracing::error!(
            alert_id = alert.id,
            attempts = total_attempts,
            "Alert delivery failed on primary and escalation paths."
        );
        Ok(DeliveryResult {
            alert_id: alert.id,
            delivered: false,
            channel: None,
            escalated: true,
            attempts: total_attempts,
            error: escalation.last_error.or(outcome.last_error),
        })
    }

    /// Re-dispatches unsent alerts, oldest first. Per-alert failures are
    /// collected, not raised.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn dispatch_pending(&self, limit: u32) -> Result<DispatchSummary, DispatchError> {
        let pending = self.repo.unsent_alerts(limit).await?;
        let mut results = Vec::with_capacity(pending.len());
        for alert in &pending {
            match self.dispatch(alert, false).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(alert_id = alert.id, error = %e, "Dispatch failed before delivery.");
                    results.push(DeliveryResult {
                        alert_id: alert.id,
                        delivered: false,
                        channel: None,
                        escalated: false,
                        attempts: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        let delivered = results.iter().filter(|r| r.delivered).count();
        let failed = results.len() - delivered;
        Ok(DispatchSummary {
            status: RunStatus::from_counts(delivered, failed),
            delivered,
            failed,
            results,
        })
    }

    /// No-side-effect probe used by health sweeps: proves the dispatcher
    /// can resolve its channels and reach the store.
    pub async fn health_probe(&self) -> Result<(), DispatchError> {
        self.repo.unsent_alerts(1).await?;
        Ok(())
    }

    async fn transaction_for(&self, alert: &WhaleAlert) -> Option<LedgerTransaction> {
        match self.repo.transaction_by_hash(&alert.transaction_hash).await {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(hash = %alert.transaction_hash, error = %e, "Could not load transaction for alert message.");
                None
            }
        }
    }

    /// Trailing-window activity for the alert's wallet. Informational only:
    /// any failure here degrades the message, never the dispatch.
    async fn trend_snapshot(&self, tx: Option<&LedgerTransaction>) -> Option<WalletActivity> {
        let tx = tx?;
        let since = Utc::now()
            - chrono::Duration::from_std(self.trend_window).unwrap_or(chrono::Duration::hours(1));
        match self.repo.wallet_activity(&tx.wallet_address, since).await {
            Ok(activity) => Some(activity),
            Err(e) => {
                tracing::warn!(address = %tx.wallet_address, error = %e, "Trend enrichment unavailable.");
                None
            }
        }
    }

    async fn mark_sent(
        &self,
        alert: &WhaleAlert,
        channel: &str,
        escalated: bool,
        attempts: u32,
        trend: Option<&WalletActivity>,
    ) -> Result<(), DispatchError> {
        let metadata = json!({
            "channel": channel,
            "escalated": escalated,
            "attempts": attempts,
            "trend": trend,
        });
        self.repo
            .mark_alert_sent(alert.id, Utc::now(), &metadata)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::alert::{AlertCategory, AlertSeverity},
        notification::{error::NotificationError, sender::MockChannelSender},
        persistence::traits::MockAppRepository,
    };
    use rust_decimal_macros::dec;
    use url::Url;

    fn channels() -> ChannelsConfig {
        let channel = |target: &str| crate::config::ChannelConfig {
            url: Url::parse("https://notify.example.com/send").unwrap(),
            target_id: target.to_string(),
        };
        ChannelsConfig {
            critical: channel("critical-alerts"),
            exchange_deposits: channel("exchange-deposits"),
            whale_movements: channel("whale-movements"),
            system: channel("system-events"),
        }
    }

    fn fast_retry() -> DispatchRetryConfig {
        DispatchRetryConfig {
            max_attempts: 3,
            base_delay_ms: std::time::Duration::from_millis(1),
            max_delay_ms: std::time::Duration::from_millis(2),
        }
    }

    fn alert() -> WhaleAlert {
        WhaleAlert {
            id: 7,
            owner: "Treasury".to_string(),
            amount: dec!(75000),
            currency: "XRP".to_string(),
            transaction_hash: "H1".to_string(),
            category: AlertCategory::WhaleMovement,
            severity: AlertSeverity::Medium,
            sent: false,
            sent_at: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    fn dispatcher(
        repo: MockAppRepository,
        sender: MockChannelSender,
    ) -> AlertDispatcher<MockAppRepository> {
        AlertDispatcher::new(
            Arc::new(repo),
            Arc::new(sender),
            channels(),
            fast_retry(),
            dec!(100000),
            Duration::from_secs(3600),
        )
    }

    fn repo_without_trend() -> MockAppRepository {
        let mut repo = MockAppRepository::new();
        repo.expect_transaction_by_hash().returning(|_| Ok(None));
        repo
    }

    #[tokio::test]
    async fn test_first_attempt_success_marks_sent() {
        let mut repo = repo_without_trend();
        repo.expect_record_attempt().times(1).returning(|_| Ok(()));
        repo.expect_mark_alert_sent()
            .withf(|id, _, metadata| {
                *id == 7
                    && metadata["channel"] == "whale-movements"
                    && metadata["escalated"] == false
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut sender = MockChannelSender::new();
        sender
            .expect_send()
            .withf(|channel, _| channel.target_id == "whale-movements")
            .times(1)
            .returning(|_, _| Ok(()));

        let result = dispatcher(repo, sender).dispatch(&alert(), false).await.unwrap();

        assert!(result.delivered);
        assert!(!result.escalated);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.channel.as_deref(), Some("whale-movements"));
    }

    #[tokio::test]
    async fn test_primary_exhaustion_escalates_once_to_system() {
        let mut repo = repo_without_trend();
        // 3 primary attempts + 1 escalation attempt, all audited.
        repo.expect_record_attempt().times(4).returning(|_| Ok(()));
        repo.expect_mark_alert_sent()
            .withf(|_, _, metadata| metadata["escalated"] == true)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut sender = MockChannelSender::new();
        sender
            .expect_send()
            .withf(|channel, _| channel.target_id == "whale-movements")
            .times(3)
            .returning(|_, _| Err(NotificationError::SendFailed(500)));
        sender
            .expect_send()
            .withf(|channel, text| {
                channel.target_id == "system-events" && text.contains("failed after 3 attempts")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let result = dispatcher(repo, sender).dispatch(&alert(), false).await.unwrap();

        assert!(result.delivered);
        assert!(result.escalated);
        assert_eq!(result.attempts, 4);
        assert_eq!(result.channel.as_deref(), Some("system-events"));
    }

    #[tokio::test]
    async fn test_total_failure_leaves_alert_unsent() {
        let mut repo = repo_without_trend();
        repo.expect_record_attempt().times(4).returning(|_| Ok(()));
        repo.expect_mark_alert_sent().times(0);

        let mut sender = MockChannelSender::new();
        sender
            .expect_send()
            .times(4)
            .returning(|_, _| Err(NotificationError::SendFailed(500)));

        let result = dispatcher(repo, sender).dispatch(&alert(), false).await.unwrap();

        assert!(!result.delivered);
        assert!(result.escalated);
        assert_eq!(result.attempts, 4);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_test_mode_neither_audits_nor_marks() {
        let mut repo = repo_without_trend();
        repo.expect_record_attempt().times(0);
        repo.expect_mark_alert_sent().times(0);

        let mut sender = MockChannelSender::new();
        sender.expect_send().times(1).returning(|_, _| Ok(()));

        let result = dispatcher(repo, sender).dispatch(&alert(), true).await.unwrap();

        assert!(result.delivered);
    }

    #[tokio::test]
    async fn test_critical_alert_routes_to_critical_channel() {
        let mut repo = repo_without_trend();
        repo.expect_record_attempt().returning(|_| Ok(()));
        repo.expect_mark_alert_sent().returning(|_, _, _| Ok(()));

        let mut sender = MockChannelSender::new();
        sender
            .expect_send()
            .withf(|channel, _| channel.target_id == "critical-alerts")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut critical = alert();
        critical.amount = dec!(2000000);
        critical.severity = AlertSeverity::Critical;

        let result = dispatcher(repo, sender)
            .dispatch(&critical, false)
            .await
            .unwrap();
        assert_eq!(result.channel.as_deref(), Some("critical-alerts"));
    }

    #[tokio::test]
    async fn test_dispatch_by_id_unknown_alert() {
        let mut repo = MockAppRepository::new();
        repo.expect_alert_by_id().returning(|_| Ok(None));
        let sender = MockChannelSender::new();

        let result = dispatcher(repo, sender).dispatch_by_id(99, false).await;
        assert!(matches!(result, Err(DispatchError::AlertNotFound(99))));
    }
}
