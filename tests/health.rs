//! Integration tests for the health aggregator over a real store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use spyhop::{
    config::{ChannelConfig, ChannelsConfig, DispatchRetryConfig, HealthConfig},
    health::{HealthAggregator, SERVICE_ACTIVITY, SERVICE_POLLER, SERVICE_SUMMARY},
    ledger::{
        envelope::AccountTxEnvelope,
        traits::{LedgerDataSource, LedgerSourceError},
    },
    models::health::{HealthSample, HealthStatus},
    notification::{AlertDispatcher, error::NotificationError, sender::ChannelSender},
    persistence::{sqlite::SqliteRepository, traits::AppRepository},
};
use tempfile::TempDir;
use url::Url;

/// Ledger stub with a switchable probe result.
struct StubLedger {
    healthy: bool,
}

#[async_trait]
impl LedgerDataSource for StubLedger {
    async fn account_transactions(
        &self,
        _address: &str,
        _ledger_index_min: Option<u64>,
    ) -> Result<Vec<AccountTxEnvelope>, LedgerSourceError> {
        Ok(vec![])
    }

    async fn ping(&self) -> Result<(), LedgerSourceError> {
        if self.healthy {
            Ok(())
        } else {
            Err(LedgerSourceError::AllEndpointsFailed(
                "connection refused".to_string(),
            ))
        }
    }
}

/// Sender that records what it was asked to deliver.
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
    async fn send(&self, channel: &ChannelConfig, text: &str) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .unwrap()
            .push((channel.target_id.clone(), text.to_string()));
        Ok(())
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
        max_attempts: 1,
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

struct Fixture {
    repo: Arc<SqliteRepository>,
    sender: Arc<RecordingSender>,
    aggregator: HealthAggregator<SqliteRepository>,
}

async fn fixture(dir: &TempDir, ledger_healthy: bool) -> Fixture {
    let repo = fresh_repo(dir).await;
    let sender = Arc::new(RecordingSender::default());
    let ledger: Arc<dyn LedgerDataSource> = Arc::new(StubLedger {
        healthy: ledger_healthy,
    });
    let dispatcher = Arc::new(AlertDispatcher::new(
        Arc::clone(&repo),
        Arc::clone(&sender) as Arc<dyn ChannelSender>,
        channels(),
        fast_retry(),
        dec!(100000),
        Duration::from_secs(3600),
    ));
    let aggregator = HealthAggregator::new(
        Arc::clone(&repo),
        ledger,
        dispatcher,
        Arc::clone(&sender) as Arc<dyn ChannelSender>,
        channels(),
        fast_retry(),
        HealthConfig::default(),
    );
    Fixture {
        repo,
        sender,
        aggregator,
    }
}

/// Gives the activity check something to find so a healthy fixture reports
/// healthy: one recent sample and one recent alert.
async fn seed_activity(repo: &SqliteRepository) {
    repo.record_health_sample(&HealthSample::now(
        "poller:rSeed",
        HealthStatus::Healthy,
        5,
        None,
    ))
    .await
    .unwrap();

    repo.sync_wallets(&[spyhop::models::wallet::WalletSpec {
        address: "rSeed".to_string(),
        owner: "Seed".to_string(),
        threshold: None,
        active: true,
    }])
    .await
    .unwrap();
    let tx = spyhop::models::transaction::LedgerTransaction {
        hash: "SEED-HASH".to_string(),
        wallet_address: "rSeed".to_string(),
        amount: dec!(75000),
        currency: "XRP".to_string(),
        direction: spyhop::models::transaction::Direction::Incoming,
        destination: Some("rSeed".to_string()),
        destination_tag: None,
        ledger_index: 1,
        executed_at: Utc::now(),
    };
    repo.upsert_transaction(&tx).await.unwrap();
    let alert = spyhop::models::alert::WhaleAlert::from_transaction(
        &tx,
        "Seed",
        spyhop::models::alert::AlertCategory::WhaleMovement,
        spyhop::models::alert::AlertSeverity::Medium,
    );
    repo.insert_alert(&alert).await.unwrap();
}

#[tokio::test]
async fn test_sweep_records_a_sample_per_check() {
    let dir = TempDir::new().unwrap();
    let fixture = fixture(&dir, true).await;
    seed_activity(&fixture.repo).await;

    let report = fixture.aggregator.run_sweep().await.unwrap();
    assert_eq!(report.checks.len(), 4);

    let recorded: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM health_samples WHERE service IN ('poller', 'notifier', 'store', 'activity')",
    )
    .fetch_one(fixture.repo.pool())
    .await
    .unwrap();
    assert_eq!(recorded, 4, "each check writes its sample immediately");
}

#[tokio::test]
async fn test_ledger_outage_reports_poller_down_and_sends_critical() {
    let dir = TempDir::new().unwrap();
    let fixture = fixture(&dir, false).await;
    seed_activity(&fixture.repo).await;

    let report = fixture.aggregator.run_sweep().await.unwrap();

    assert_eq!(report.overall, HealthStatus::Down);
    let poller = report
        .checks
        .iter()
        .find(|c| c.service == SERVICE_POLLER)
        .unwrap();
    assert_eq!(poller.status, HealthStatus::Down);

    let messages = fixture.sender.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "critical-alerts");
    assert!(messages[0].1.contains("poller"));
}

#[tokio::test]
async fn test_three_down_samples_within_window_are_persistent() {
    let dir = TempDir::new().unwrap();
    let fixture = fixture(&dir, true).await;
    seed_activity(&fixture.repo).await;

    for _ in 0..3 {
        fixture
            .repo
            .record_health_sample(&HealthSample::now(
                "poller:rFlappy",
                HealthStatus::Down,
                9000,
                Some("timeout".to_string()),
            ))
            .await
            .unwrap();
    }

    let report = fixture.aggregator.run_sweep().await.unwrap();

    assert_eq!(report.persistent_failures, vec!["poller:rFlappy"]);
    let messages = fixture.sender.messages();
    assert_eq!(messages[0].0, "critical-alerts");
    assert!(messages[0].1.contains("rFlappy"));
}

#[tokio::test]
async fn test_two_down_samples_within_window_are_not_persistent() {
    let dir = TempDir::new().unwrap();
    let fixture = fixture(&dir, true).await;
    seed_activity(&fixture.repo).await;

    for _ in 0..2 {
        fixture
            .repo
            .record_health_sample(&HealthSample::now(
                "poller:rFlappy",
                HealthStatus::Down,
                9000,
                Some("timeout".to_string()),
            ))
            .await
            .unwrap();
    }

    let report = fixture.aggregator.run_sweep().await.unwrap();

    assert!(report.persistent_failures.is_empty());
    assert_eq!(report.overall, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_summary_sent_once_then_gated() {
    let dir = TempDir::new().unwrap();
    let fixture = fixture(&dir, true).await;
    seed_activity(&fixture.repo).await;

    let first = fixture.aggregator.run_sweep().await.unwrap();
    assert!(first.summary_sent);

    let marker = fixture
        .repo
        .last_sample_for(SERVICE_SUMMARY)
        .await
        .unwrap();
    assert!(marker.is_some(), "summary emission leaves a marker sample");

    let second = fixture.aggregator.run_sweep().await.unwrap();
    assert!(!second.summary_sent, "summary is gated by the marker");

    let summaries: Vec<_> = fixture
        .sender
        .messages()
        .into_iter()
        .filter(|(_, text)| text.contains("all services healthy"))
        .collect();
    assert_eq!(summaries.len(), 1);
}

#[tokio::test]
async fn test_empty_store_reports_scheduler_stall() {
    let dir = TempDir::new().unwrap();
    let fixture = fixture(&dir, true).await;
    // No seeding: no samples at all in the store.

    let report = fixture.aggregator.run_sweep().await.unwrap();

    let activity = report
        .checks
        .iter()
        .find(|c| c.service == SERVICE_ACTIVITY)
        .unwrap();
    assert_eq!(activity.status, HealthStatus::Down);
    assert!(
        activity
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("scheduler")
    );
}
