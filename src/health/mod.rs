//! # Health Aggregator
//!
//! Periodically exercises the pipeline's stages, records samples, detects
//! sustained degradation over rolling windows, and notifies through the
//! same delivery primitive the dispatcher uses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    config::{ChannelRoute, ChannelsConfig, DispatchRetryConfig, HealthConfig},
    ledger::traits::LedgerDataSource,
    models::health::{HealthReport, HealthSample, HealthStatus},
    notification::{AlertDispatcher, retry::send_with_retry, sender::ChannelSender},
    persistence::{error::PersistenceError, traits::AppRepository},
};

/// Service name for the poller probe.
pub const SERVICE_POLLER: &str = "poller";
/// Service name for the notifier probe.
pub const SERVICE_NOTIFIER: &str = "notifier";
/// Service name for the store probe.
pub const SERVICE_STORE: &str = "store";
/// Service name for the recent-activity probe.
pub const SERVICE_ACTIVITY: &str = "activity";
/// Service name under which summary emissions are recorded, used to gate
/// the summary cadence.
pub const SERVICE_SUMMARY: &str = "health:summary";

/// Errors that can abort a sweep (as opposed to failing one check).
#[derive(Debug, Error)]
pub enum HealthError {
    /// The store rejected a trend query or sample write.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Outcome of one check, before it becomes a sample.
enum CheckOutcome {
    Pass,
    Degraded(String),
    Down(String),
}

/// Runs health sweeps over the pipeline.
pub struct HealthAggregator<R: AppRepository + ?Sized> {
    repo: Arc<R>,
    ledger: Arc<dyn LedgerDataSource>,
    dispatcher: Arc<AlertDispatcher<R>>,
    sender: Arc<dyn ChannelSender>,
    channels: ChannelsConfig,
    retry: DispatchRetryConfig,
    config: HealthConfig,
}

fn cutoff(window: Duration) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::seconds(window.as_secs() as i64)
}

impl<R: AppRepository + ?Sized> HealthAggregator<R> {
    /// Creates a new aggregator.
    pub fn new(
        repo: Arc<R>,
        ledger: Arc<dyn LedgerDataSource>,
        dispatcher: Arc<AlertDispatcher<R>>,
        sender: Arc<dyn ChannelSender>,
        channels: ChannelsConfig,
        retry: DispatchRetryConfig,
        config: HealthConfig,
    ) -> Self {
        Self {
            repo,
            ledger,
            dispatcher,
            sender,
            channels,
            retry,
            config,
        }
    }

    /// Runs one sweep: four concurrent checks (each with its own timeout
    /// and error boundary), trend analysis over the sample windows, and the
    /// notification policy.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_sweep(&self) -> Result<HealthReport, HealthError> {
        let sweep_started = Utc::now();
        let (poller, notifier, store, activity) = tokio::join!(
            self.guarded(SERVICE_POLLER, self.check_poller()),
            self.guarded(SERVICE_NOTIFIER, self.check_notifier()),
            self.guarded(SERVICE_STORE, self.check_store()),
            self.guarded(SERVICE_ACTIVITY, self.check_activity(sweep_started)),
        );
        let checks = vec![poller, notifier, store, activity];
        let overall = HealthReport::overall_of(&checks);

        // Trend analysis over the rolling windows. A service seen down
        // repeatedly within the window is a persistent failure, not a blip.
        let down_counts = self
            .repo
            .down_counts_since(cutoff(self.config.down_window))
            .await?;
        let persistent_failures: Vec<String> = down_counts
            .into_iter()
            .filter(|(_, count)| *count >= self.config.persistent_down_count)
            .map(|(service, _)| service)
            .collect();

        let slow_samples = self
            .repo
            .slow_sample_count_since(self.config.slow_threshold_ms, cutoff(self.config.slow_window))
            .await?;
        let systemic_slowdown = slow_samples > self.config.slow_count_threshold;

        let summary_sent = self
            .notify(&checks, &persistent_failures, systemic_slowdown)
            .await?;

        Ok(HealthReport {
            overall,
            checks,
            persistent_failures,
            slow_samples,
            systemic_slowdown,
            summary_sent,
        })
    }

    /// Applies the notification policy. Returns whether the periodic
    /// all-healthy summary was emitted.
    async fn notify(
        &self,
        checks: &[HealthSample],
        persistent_failures: &[String],
        systemic_slowdown: bool,
    ) -> Result<bool, HealthError> {
        let down: Vec<&HealthSample> = checks
            .iter()
            .filter(|c| c.status == HealthStatus::Down)
            .collect();
        let degraded: Vec<&HealthSample> = checks
            .iter()
            .filter(|c| c.status == HealthStatus::Degraded)
            .collect();

        if !down.is_empty() || !persistent_failures.is_empty() {
            // Immediate critical alert, no dedup across sweeps; operators
            // silence at the channel level. The persistent flag separates
            // flapping from real outages.
            let mut lines = vec!["🚨 *Health sweep: services down*".to_string()];
            for check in &down {
                lines.push(format!(
                    "- {}: {}",
                    check.service,
                    check.error.as_deref().unwrap_or("no detail")
                ));
            }
            if !persistent_failures.is_empty() {
                lines.push(format!(
                    "Persistent failures (≥{} down samples in window): {}",
                    self.config.persistent_down_count,
                    persistent_failures.join(", ")
                ));
            }
            let outcome = send_with_retry(
                self.sender.as_ref(),
                self.repo.as_ref(),
                None,
                self.channels.resolve(ChannelRoute::Critical),
                &lines.join("\n"),
                &self.retry,
            )
            .await;
            if !outcome.delivered() {
                tracing::error!("Failed to deliver critical health notification.");
            }
            return Ok(false);
        }

        if !degraded.is_empty() || systemic_slowdown {
            let mut lines = vec!["⚠️ *Health sweep: degraded*".to_string()];
            for check in &degraded {
                lines.push(format!(
                    "- {}: {}",
                    check.service,
                    check.error.as_deref().unwrap_or("no detail")
                ));
            }
            if systemic_slowdown {
                lines.push(format!(
                    "Slow responses above {} ms are accumulating.",
                    self.config.slow_threshold_ms
                ));
            }
            let outcome = send_with_retry(
                self.sender.as_ref(),
                self.repo.as_ref(),
                None,
                self.channels.resolve(ChannelRoute::System),
                &lines.join("\n"),
                &self.retry,
            )
            .await;
            if !outcome.delivered() {
                tracing::error!("Failed to deliver degraded health notification.");
            }
            return Ok(false);
        }

        self.maybe_send_summary().await
    }

    /// Sends the periodic all-healthy summary, gated on the timestamp of
    /// the last summary sample.
    async fn maybe_send_summary(&self) -> Result<bool, HealthError> {
        let due = match self.repo.last_sample_for(SERVICE_SUMMARY).await? {
            None => true,
            Some(last) => last.checked_at <= cutoff(self.config.summary_interval),
        };
        if !due {
            return Ok(false);
        }

        let text = "✅ *Health sweep: all services healthy*";
        let outcome = send_with_retry(
            self.sender.as_ref(),
            self.repo.as_ref(),
            None,
            self.channels.resolve(ChannelRoute::System),
            text,
            &self.retry,
        )
        .await;
        if !outcome.delivered() {
            tracing::warn!("Failed to deliver health summary.");
            return Ok(false);
        }

        let marker = HealthSample::now(SERVICE_SUMMARY, HealthStatus::Healthy, 0, None);
        self.repo.record_health_sample(&marker).await?;
        Ok(true)
    }

    /// Wraps one check with its timeout and error boundary, and records the
    /// resulting sample immediately.
    async fn guarded<F>(&self, service: &str, check: F) -> HealthSample
    where
        F: std::future::Future<Output = CheckOutcome>,
    {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.config.check_timeout, check).await {
            Ok(outcome) => outcome,
            Err(_) => CheckOutcome::Down(format!(
                "check timed out after {:?}",
                self.config.check_timeout
            )),
        };
        let latency_ms = started.elapsed().as_millis() as u64;
        let (status, error) = match outcome {
            CheckOutcome::Pass => (HealthStatus::Healthy, None),
            CheckOutcome::Degraded(detail) => (HealthStatus::Degraded, Some(detail)),
            CheckOutcome::Down(detail) => (HealthStatus::Down, Some(detail)),
        };
        let sample = HealthSample::now(service, status, latency_ms, error);
        if let Err(e) = self.repo.record_health_sample(&sample).await {
            tracing::error!(service, error = %e, "Failed to record health sample.");
        }
        sample
    }

    async fn check_poller(&self) -> CheckOutcome {
        match self.ledger.ping().await {
            Ok(()) => CheckOutcome::Pass,
            Err(e) => CheckOutcome::Down(e.to_string()),
        }
    }

    async fn check_notifier(&self) -> CheckOutcome {
        match self.dispatcher.health_probe().await {
            Ok(()) => CheckOutcome::Pass,
            Err(e) => CheckOutcome::Down(e.to_string()),
        }
    }

    async fn check_store(&self) -> CheckOutcome {
        match self.repo.ping().await {
            Ok(()) => CheckOutcome::Pass,
            Err(e) => CheckOutcome::Down(e.to_string()),
        }
    }

    /// Recent-activity probe. Sample silence means the scheduler itself is
    /// not running checks, which is a different failure from an unhealthy
    /// service; alert silence is merely notable. Samples written by this
    /// sweep's own sibling checks are excluded via the upper bound.
    async fn check_activity(&self, sweep_started: DateTime<Utc>) -> CheckOutcome {
        let samples = match self
            .repo
            .sample_count_between(cutoff(self.config.activity_sample_window), sweep_started)
            .await
        {
            Ok(count) => count,
            Err(e) => return CheckOutcome::Down(e.to_string()),
        };
        if samples == 0 {
            return CheckOutcome::Down(
                "no health samples recorded recently; scheduler appears stalled".to_string(),
            );
        }

        let alerts = match self
            .repo
            .recent_alert_count(cutoff(self.config.activity_alert_window))
            .await
        {
            Ok(count) => count,
            Err(e) => return CheckOutcome::Down(e.to_string()),
        };
        if alerts == 0 {
            return CheckOutcome::Degraded("no alerts fired in the last day".to_string());
        }

        CheckOutcome::Pass
    }
}
