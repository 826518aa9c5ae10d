//! Integration tests for alert delivery: retry bounds, escalation
//! accounting, and the audit trail.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use spyhop::{
    config::{ChannelConfig, ChannelsConfig, DispatchRetryConfig},
    models::{
        alert::{AlertCategory, AlertSeverity, WhaleAlert},
        attempt::AttemptStatus,
        transaction::{Direction, LedgerTransaction},
        wallet::WalletSpec,
    },
    notification::{AlertDispatcher, error::NotificationError, sender::ChannelSender},
    persistence::{sqlite::SqliteRepository, traits::AppRepository},
};
use tempfile::TempDir;
use url::Url;

const WALLET: &str = "rWatchedWallet1234567890";

/// A sender that fails the first `fail_first` calls per run, succeeding
/// afterwards. `fail_targets` restricts failures to specific channels.
struct ScriptedSender {
    fail_first: u32,
    fail_target: Option<String>,
    calls: AtomicU32,
}

impl ScriptedSender {
    fn failing() -> Self {
        Self {
            fail_first: u32::MAX,
            fail_target: None,
            calls: AtomicU32::new(0),
        }
    }

    fn failing_times(n: u32) -> Self {
        Self {
            fail_first: n,
            fail_target: None,
            calls: AtomicU32::new(0),
        }
    }

    fn failing_only(target: &str) -> Self {
        Self {
            fail_first: u32::MAX,
            fail_target: Some(target.to_string()),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ChannelSender for ScriptedSender {
    async fn send(&self, channel: &ChannelConfig, _text: &str) -> Result<(), NotificationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let targeted = self
            .fail_target
            .as_deref()
            .map_or(true, |t| t == channel.target_id);
        if targeted && call < self.fail_first {
            Err(NotificationError::SendFailed(500))
        } else {
            Ok(())
        }
    }
}

fn channels() -> ChannelsConfig {
    let channel = |target: &str| ChannelConfig {
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
        base_delay_ms: Duration::from_millis(1),
        max_delay_ms: Duration::from_millis(2),
    }
}

async fn fresh_repo(dir: &TempDir) -> Arc<SqliteRepository> {
    let url = format!("sqlite:{}/test.db", dir.path().display());
    let repo = SqliteRepository::connect(&url).await.unwrap();
    repo.run_migrations().await.unwrap();
    Arc::new(repo)
}

/// Seeds a wallet, a transaction, and an unsent alert; returns the alert.
async fn seed_alert(repo: &SqliteRepository) -> WhaleAlert {
    repo.sync_wallets(&[WalletSpec {
        address: WALLET.to_string(),
        owner: "Treasury".to_string(),
        threshold: Some(dec!(50000)),
        active: true,
    }])
    .await
    .unwrap();

    let tx = LedgerTransaction {
        hash: "HASH-1".to_string(),
        wallet_address: WALLET.to_string(),
        amount: dec!(75000),
        currency: "XRP".to_string(),
        direction: Direction::Incoming,
        destination: Some(WALLET.to_string()),
        destination_tag: None,
        ledger_index: 101,
        executed_at: Utc::now(),
    };
    assert!(repo.upsert_transaction(&tx).await.unwrap());

    let mut alert = WhaleAlert::from_transaction(
        &tx,
        "Treasury",
        AlertCategory::WhaleMovement,
        AlertSeverity::Medium,
    );
    alert.id = repo.insert_alert(&alert).await.unwrap().unwrap();
    alert
}

fn dispatcher(
    repo: Arc<SqliteRepository>,
    sender: Arc<dyn ChannelSender>,
) -> AlertDispatcher<SqliteRepository> {
    AlertDispatcher::new(
        repo,
        sender,
        channels(),
        fast_retry(),
        dec!(100000),
        Duration::from_secs(3600),
    )
}

#[tokio::test]
async fn test_always_failing_channel_hits_retry_bound_with_one_escalation() {
    let dir = TempDir::new().unwrap();
    let repo = fresh_repo(&dir).await;
    let alert = seed_alert(&repo).await;

    let result = dispatcher(Arc::clone(&repo), Arc::new(ScriptedSender::failing()))
        .dispatch(&alert, false)
        .await
        .unwrap();

    assert!(!result.delivered);
    assert_eq!(result.attempts, 4, "3 primary attempts + 1 escalation");

    let attempts = repo.attempts_for_alert(alert.id).await.unwrap();
    assert_eq!(attempts.len(), 4);
    let primary: Vec<_> = attempts
        .iter()
        .filter(|a| a.channel == "whale-movements")
        .collect();
    let escalation: Vec<_> = attempts
        .iter()
        .filter(|a| a.channel == "system-events")
        .collect();
    assert_eq!(primary.len(), 3, "exactly max_attempts primary rows");
    assert_eq!(escalation.len(), 1, "exactly one escalation row");
    assert_eq!(
        primary.iter().map(|a| a.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(attempts.iter().all(|a| a.status == AttemptStatus::Failed));

    let stored = repo.alert_by_id(alert.id).await.unwrap().unwrap();
    assert!(!stored.sent, "alert stays eligible for reprocessing");
}

#[tokio::test]
async fn test_success_on_third_attempt_needs_no_escalation() {
    let dir = TempDir::new().unwrap();
    let repo = fresh_repo(&dir).await;
    let alert = seed_alert(&repo).await;

    let result = dispatcher(Arc::clone(&repo), Arc::new(ScriptedSender::failing_times(2)))
        .dispatch(&alert, false)
        .await
        .unwrap();

    assert!(result.delivered);
    assert!(!result.escalated);
    assert_eq!(result.attempts, 3);

    let attempts = repo.attempts_for_alert(alert.id).await.unwrap();
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|a| a.channel == "whale-movements"));
    assert_eq!(attempts[2].status, AttemptStatus::Success);

    let stored = repo.alert_by_id(alert.id).await.unwrap().unwrap();
    assert!(stored.sent);
}

#[tokio::test]
async fn test_escalation_delivery_marks_alert_sent_via_system_channel() {
    let dir = TempDir::new().unwrap();
    let repo = fresh_repo(&dir).await;
    let alert = seed_alert(&repo).await;

    let sender = Arc::new(ScriptedSender::failing_only("whale-movements"));
    let result = dispatcher(Arc::clone(&repo), sender)
        .dispatch(&alert, false)
        .await
        .unwrap();

    assert!(result.delivered);
    assert!(result.escalated);
    assert_eq!(result.channel.as_deref(), Some("system-events"));

    let stored = repo.alert_by_id(alert.id).await.unwrap().unwrap();
    assert!(stored.sent);
    assert_eq!(stored.metadata["escalated"], true);
    assert_eq!(stored.metadata["channel"], "system-events");
}

#[tokio::test]
async fn test_dispatch_pending_redelivers_unsent_alerts() {
    let dir = TempDir::new().unwrap();
    let repo = fresh_repo(&dir).await;
    let alert = seed_alert(&repo).await;

    // First run fails everywhere; the alert stays unsent.
    let failing = dispatcher(Arc::clone(&repo), Arc::new(ScriptedSender::failing()));
    failing.dispatch(&alert, false).await.unwrap();
    assert!(!repo.alert_by_id(alert.id).await.unwrap().unwrap().sent);

    // A later run with a healthy channel picks it back up.
    let healthy = dispatcher(Arc::clone(&repo), Arc::new(ScriptedSender::failing_times(0)));
    let summary = healthy.dispatch_pending(50).await.unwrap();

    assert_eq!(summary.delivered, 1);
    assert_eq!(summary.failed, 0);
    assert!(repo.alert_by_id(alert.id).await.unwrap().unwrap().sent);
}

#[tokio::test]
async fn test_test_mode_leaves_no_trace() {
    let dir = TempDir::new().unwrap();
    let repo = fresh_repo(&dir).await;
    let alert = seed_alert(&repo).await;

    let result = dispatcher(Arc::clone(&repo), Arc::new(ScriptedSender::failing_times(0)))
        .dispatch_by_id(alert.id, true)
        .await
        .unwrap();

    assert!(result.delivered);
    assert!(repo.attempts_for_alert(alert.id).await.unwrap().is_empty());
    assert!(!repo.alert_by_id(alert.id).await.unwrap().unwrap().sent);
}

#[tokio::test]
async fn test_trend_metadata_recorded_on_delivery() {
    let dir = TempDir::new().unwrap();
    let repo = fresh_repo(&dir).await;
    let alert = seed_alert(&repo).await;

    // A second recent transaction makes the trailing window interesting.
    let tx = LedgerTransaction {
        hash: "HASH-2".to_string(),
        wallet_address: WALLET.to_string(),
        amount: dec!(30000),
        currency: "XRP".to_string(),
        direction: Direction::Incoming,
        destination: Some(WALLET.to_string()),
        destination_tag: None,
        ledger_index: 102,
        executed_at: Utc::now(),
    };
    repo.upsert_transaction(&tx).await.unwrap();

    dispatcher(Arc::clone(&repo), Arc::new(ScriptedSender::failing_times(0)))
        .dispatch(&alert, false)
        .await
        .unwrap();

    let stored = repo.alert_by_id(alert.id).await.unwrap().unwrap();
    assert_eq!(stored.metadata["trend"]["transactions"], 2);
}
