//! The storage interface shared by every pipeline stage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::models::{
    alert::WhaleAlert,
    attempt::NotificationAttempt,
    health::HealthSample,
    transaction::{LedgerTransaction, WalletActivity},
    wallet::{WalletSpec, WatchedWallet},
};
use crate::persistence::error::PersistenceError;

/// Repository interface over the persistent store.
///
/// One implementation backs the whole pipeline; the trait exists so unit
/// tests can mock storage per stage.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AppRepository: Send + Sync {
    // Wallet registry operations:

    /// Inserts or updates the declared wallets by address. Registry edits
    /// never touch a stored cursor.
    async fn sync_wallets(&self, specs: &[WalletSpec]) -> Result<(), PersistenceError>;

    /// All wallets with the active flag set.
    async fn active_wallets(&self) -> Result<Vec<WatchedWallet>, PersistenceError>;

    /// Looks up one wallet by address.
    async fn wallet_by_address(
        &self,
        address: &str,
    ) -> Result<Option<WatchedWallet>, PersistenceError>;

    /// Advances a wallet's cursor. The write is conditional: a cursor only
    /// ever moves forward, so a stale caller is a silent no-op.
    async fn advance_cursor(&self, address: &str, cursor: u64) -> Result<(), PersistenceError>;

    // Transaction operations:

    /// Inserts a transaction by hash; returns `false` when the hash already
    /// existed (overlapping poll windows are expected).
    async fn upsert_transaction(&self, tx: &LedgerTransaction) -> Result<bool, PersistenceError>;

    /// Looks up one transaction by hash.
    async fn transaction_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<LedgerTransaction>, PersistenceError>;

    /// Transaction count and volume for a wallet since the cutoff.
    async fn wallet_activity(
        &self,
        address: &str,
        since: DateTime<Utc>,
    ) -> Result<WalletActivity, PersistenceError>;

    // Alert operations:

    /// Inserts an alert unless one already exists for its transaction hash.
    /// Returns the new row id, or `None` on the dedup no-op.
    async fn insert_alert(&self, alert: &WhaleAlert) -> Result<Option<i64>, PersistenceError>;

    /// Looks up one alert by id.
    async fn alert_by_id(&self, id: i64) -> Result<Option<WhaleAlert>, PersistenceError>;

    /// Alerts not yet delivered, oldest first.
    async fn unsent_alerts(&self, limit: u32) -> Result<Vec<WhaleAlert>, PersistenceError>;

    /// Marks an alert delivered. Idempotent; re-marking is harmless under
    /// at-least-once delivery.
    async fn mark_alert_sent(
        &self,
        id: i64,
        sent_at: DateTime<Utc>,
        metadata: &serde_json::Value,
    ) -> Result<(), PersistenceError>;

    /// Alerts created since the cutoff, for the recent-activity check.
    async fn recent_alert_count(&self, since: DateTime<Utc>) -> Result<u64, PersistenceError>;

    // Delivery audit operations:

    /// Appends one notification attempt row.
    async fn record_attempt(&self, attempt: &NotificationAttempt) -> Result<(), PersistenceError>;

    /// All attempt rows for one alert, in attempt order.
    async fn attempts_for_alert(
        &self,
        alert_id: i64,
    ) -> Result<Vec<NotificationAttempt>, PersistenceError>;

    // Health sample operations:

    /// Appends one health sample.
    async fn record_health_sample(&self, sample: &HealthSample) -> Result<(), PersistenceError>;

    /// Down samples per service since the cutoff.
    async fn down_counts_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(String, u64)>, PersistenceError>;

    /// Samples slower than the threshold since the cutoff.
    async fn slow_sample_count_since(
        &self,
        threshold_ms: u64,
        since: DateTime<Utc>,
    ) -> Result<u64, PersistenceError>;

    /// Latest sample for one service, if any.
    async fn last_sample_for(
        &self,
        service: &str,
    ) -> Result<Option<HealthSample>, PersistenceError>;

    /// Samples of any service within `[since, until)`; zero over a recent
    /// window means the scheduler has not been running checks. The upper
    /// bound lets a sweep exclude the samples it is writing itself.
    async fn sample_count_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, PersistenceError>;

    /// Trivial read proving the store is reachable.
    async fn ping(&self) -> Result<(), PersistenceError>;
}
