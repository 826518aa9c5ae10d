//! `AppRepository` implementation for `SqliteRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    models::{
        alert::WhaleAlert,
        attempt::NotificationAttempt,
        health::HealthSample,
        transaction::{LedgerTransaction, WalletActivity},
        wallet::{WalletSpec, WatchedWallet},
    },
    persistence::{error::PersistenceError, sqlite::SqliteRepository, traits::AppRepository},
};

// Helper structs for mapping from database rows.

#[derive(sqlx::FromRow)]
struct WalletRow {
    wallet_id: i64,
    address: String,
    owner: String,
    threshold: Option<String>,
    active: bool,
    cursor: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    hash: String,
    wallet_address: String,
    amount: String,
    currency: String,
    direction: String,
    destination: Option<String>,
    destination_tag: Option<i64>,
    ledger_index: i64,
    executed_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    alert_id: i64,
    owner: String,
    amount: String,
    currency: String,
    transaction_hash: String,
    category: String,
    severity: String,
    sent: bool,
    sent_at: Option<DateTime<Utc>>,
    metadata: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    alert_id: i64,
    channel: String,
    attempt: i64,
    status: String,
    error: Option<String>,
    sent_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct HealthSampleRow {
    service: String,
    status: String,
    latency_ms: i64,
    error: Option<String>,
    checked_at: DateTime<Utc>,
}

fn parse_decimal(raw: &str, context: &str) -> Result<Decimal, PersistenceError> {
    raw.parse::<Decimal>()
        .map_err(|e| PersistenceError::Corrupt(format!("{context}: {e}")))
}

impl TryFrom<WalletRow> for WatchedWallet {
    type Error = PersistenceError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        let threshold = row
            .threshold
            .as_deref()
            .map(|raw| parse_decimal(raw, "wallet threshold"))
            .transpose()?;
        let cursor = row
            .cursor
            .map(|c| {
                u64::try_from(c)
                    .map_err(|e| PersistenceError::Corrupt(format!("wallet cursor: {e}")))
            })
            .transpose()?;
        Ok(WatchedWallet {
            id: row.wallet_id,
            address: row.address,
            owner: row.owner,
            threshold,
            active: row.active,
            cursor,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<TransactionRow> for LedgerTransaction {
    type Error = PersistenceError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let amount = parse_decimal(&row.amount, "transaction amount")?;
        let direction = row
            .direction
            .parse()
            .map_err(PersistenceError::Corrupt)?;
        let ledger_index = u64::try_from(row.ledger_index)
            .map_err(|e| PersistenceError::Corrupt(format!("ledger index: {e}")))?;
        let destination_tag = row
            .destination_tag
            .map(|t| {
                u32::try_from(t)
                    .map_err(|e| PersistenceError::Corrupt(format!("destination tag: {e}")))
            })
            .transpose()?;
        Ok(LedgerTransaction {
            hash: row.hash,
            wallet_address: row.wallet_address,
            amount,
            currency: row.currency,
            direction,
            destination: row.destination,
            destination_tag,
            ledger_index,
            executed_at: row.executed_at,
        })
    }
}

impl TryFrom<AlertRow> for WhaleAlert {
    type Error = PersistenceError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let amount = parse_decimal(&row.amount, "alert amount")?;
        let category = row.category.parse().map_err(PersistenceError::Corrupt)?;
        let severity = row.severity.parse().map_err(PersistenceError::Corrupt)?;
        let metadata = serde_json::from_str(&row.metadata)
            .map_err(|e| PersistenceError::Corrupt(format!("alert metadata: {e}")))?;
        Ok(WhaleAlert {
            id: row.alert_id,
            owner: row.owner,
            amount,
            currency: row.currency,
            transaction_hash: row.transaction_hash,
            category,
            severity,
            sent: row.sent,
            sent_at: row.sent_at,
            metadata,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<AttemptRow> for NotificationAttempt {
    type Error = PersistenceError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(PersistenceError::Corrupt)?;
        let attempt = u32::try_from(row.attempt)
            .map_err(|e| PersistenceError::Corrupt(format!("attempt number: {e}")))?;
        Ok(NotificationAttempt {
            alert_id: row.alert_id,
            channel: row.channel,
            attempt,
            status,
            error: row.error,
            sent_at: row.sent_at,
        })
    }
}

impl TryFrom<HealthSampleRow> for HealthSample {
    type Error = PersistenceError;

    fn try_from(row: HealthSampleRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(PersistenceError::Corrupt)?;
        let latency_ms = u64::try_from(row.latency_ms)
            .map_err(|e| PersistenceError::Corrupt(format!("sample latency: {e}")))?;
        Ok(HealthSample {
            service: row.service,
            status,
            latency_ms,
            error: row.error,
            checked_at: row.checked_at,
        })
    }
}

#[async_trait]
impl AppRepository for SqliteRepository {
    #[tracing::instrument(skip(self, specs), level = "debug")]
    async fn sync_wallets(&self, specs: &[WalletSpec]) -> Result<(), PersistenceError> {
        let now = Utc::now();
        for spec in specs {
            sqlx::query(
                r#"
                INSERT INTO watched_wallets (address, owner, threshold, active, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                ON CONFLICT (address) DO UPDATE SET
                    owner = excluded.owner,
                    threshold = excluded.threshold,
                    active = excluded.active,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&spec.address)
            .bind(&spec.owner)
            .bind(spec.threshold.map(|t| t.to_string()))
            .bind(spec.active)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }
        tracing::info!(count = specs.len(), "Wallet registry synced.");
        Ok(())
    }

    async fn active_wallets(&self) -> Result<Vec<WatchedWallet>, PersistenceError> {
        let rows = sqlx::query_as::<_, WalletRow>(
            "SELECT wallet_id, address, owner, threshold, active, cursor, created_at, updated_at
             FROM watched_wallets WHERE active = 1 ORDER BY wallet_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WatchedWallet::try_from).collect()
    }

    async fn wallet_by_address(
        &self,
        address: &str,
    ) -> Result<Option<WatchedWallet>, PersistenceError> {
        let row = sqlx::query_as::<_, WalletRow>(
            "SELECT wallet_id, address, owner, threshold, active, cursor, created_at, updated_at
             FROM watched_wallets WHERE address = ?1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        row.map(WatchedWallet::try_from).transpose()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn advance_cursor(&self, address: &str, cursor: u64) -> Result<(), PersistenceError> {
        let cursor_i64 = i64::try_from(cursor)
            .map_err(|e| PersistenceError::InvalidInput(format!("cursor: {e}")))?;
        // Conditional write: the cursor never moves backwards, even if a
        // stale poll result lands after a newer one.
        let result = sqlx::query(
            "UPDATE watched_wallets SET cursor = ?1, updated_at = ?2
             WHERE address = ?3 AND (cursor IS NULL OR cursor < ?1)",
        )
        .bind(cursor_i64)
        .bind(Utc::now())
        .bind(address)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            tracing::debug!(address, cursor, "Cursor not advanced (already at or past value).");
        }
        Ok(())
    }

    async fn upsert_transaction(&self, tx: &LedgerTransaction) -> Result<bool, PersistenceError> {
        let ledger_index = i64::try_from(tx.ledger_index)
            .map_err(|e| PersistenceError::InvalidInput(format!("ledger index: {e}")))?;
        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (hash, wallet_address, amount, currency, direction, destination,
                 destination_tag, ledger_index, executed_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (hash) DO NOTHING
            "#,
        )
        .bind(&tx.hash)
        .bind(&tx.wallet_address)
        .bind(tx.amount.to_string())
        .bind(&tx.currency)
        .bind(tx.direction.as_str())
        .bind(&tx.destination)
        .bind(tx.destination_tag.map(i64::from))
        .bind(ledger_index)
        .bind(tx.executed_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn transaction_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<LedgerTransaction>, PersistenceError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT hash, wallet_address, amount, currency, direction, destination,
                    destination_tag, ledger_index, executed_at
             FROM transactions WHERE hash = ?1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(LedgerTransaction::try_from).transpose()
    }

    async fn wallet_activity(
        &self,
        address: &str,
        since: DateTime<Utc>,
    ) -> Result<WalletActivity, PersistenceError> {
        // Amounts are TEXT decimals; summing happens here rather than in
        // SQL to avoid float rounding.
        let amounts = sqlx::query_scalar::<_, String>(
            "SELECT amount FROM transactions WHERE wallet_address = ?1 AND executed_at >= ?2",
        )
        .bind(address)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        let mut volume = Decimal::ZERO;
        for raw in &amounts {
            volume += parse_decimal(raw, "transaction amount")?;
        }
        Ok(WalletActivity {
            transactions: amounts.len() as u64,
            volume,
        })
    }

    async fn insert_alert(&self, alert: &WhaleAlert) -> Result<Option<i64>, PersistenceError> {
        let metadata = serde_json::to_string(&alert.metadata)
            .map_err(|e| PersistenceError::InvalidInput(format!("alert metadata: {e}")))?;
        let result = sqlx::query(
            r#"
            INSERT INTO whale_alerts
                (owner, amount, currency, transaction_hash, category, severity,
                 sent, sent_at, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (transaction_hash) DO NOTHING
            "#,
        )
        .bind(&alert.owner)
        .bind(alert.amount.to_string())
        .bind(&alert.currency)
        .bind(&alert.transaction_hash)
        .bind(alert.category.as_str())
        .bind(alert.severity.as_str())
        .bind(alert.sent)
        .bind(alert.sent_at)
        .bind(metadata)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    async fn alert_by_id(&self, id: i64) -> Result<Option<WhaleAlert>, PersistenceError> {
        let row = sqlx::query_as::<_, AlertRow>(
            "SELECT alert_id, owner, amount, currency, transaction_hash, category,
                    severity, sent, sent_at, metadata, created_at
             FROM whale_alerts WHERE alert_id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(WhaleAlert::try_from).transpose()
    }

    async fn unsent_alerts(&self, limit: u32) -> Result<Vec<WhaleAlert>, PersistenceError> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT alert_id, owner, amount, currency, transaction_hash, category,
                    severity, sent, sent_at, metadata, created_at
             FROM whale_alerts WHERE sent = 0 ORDER BY created_at, alert_id LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WhaleAlert::try_from).collect()
    }

    #[tracing::instrument(skip(self, metadata), level = "debug")]
    async fn mark_alert_sent(
        &self,
        id: i64,
        sent_at: DateTime<Utc>,
        metadata: &serde_json::Value,
    ) -> Result<(), PersistenceError> {
        let metadata = serde_json::to_string(metadata)
            .map_err(|e| PersistenceError::InvalidInput(format!("alert metadata: {e}")))?;
        sqlx::query(
            "UPDATE whale_alerts SET sent = 1, sent_at = ?1, metadata = ?2 WHERE alert_id = ?3",
        )
        .bind(sent_at)
        .bind(metadata)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_alert_count(&self, since: DateTime<Utc>) -> Result<u64, PersistenceError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM whale_alerts WHERE created_at >= ?1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn record_attempt(&self, attempt: &NotificationAttempt) -> Result<(), PersistenceError> {
        sqlx::query(
            "INSERT INTO notification_attempts (alert_id, channel, attempt, status, error, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(attempt.alert_id)
        .bind(&attempt.channel)
        .bind(i64::from(attempt.attempt))
        .bind(attempt.status.as_str())
        .bind(&attempt.error)
        .bind(attempt.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn attempts_for_alert(
        &self,
        alert_id: i64,
    ) -> Result<Vec<NotificationAttempt>, PersistenceError> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            "SELECT alert_id, channel, attempt, status, error, sent_at
             FROM notification_attempts WHERE alert_id = ?1 ORDER BY attempt_id",
        )
        .bind(alert_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(NotificationAttempt::try_from).collect()
    }

    async fn record_health_sample(&self, sample: &HealthSample) -> Result<(), PersistenceError> {
        let latency = i64::try_from(sample.latency_ms)
            .map_err(|e| PersistenceError::InvalidInput(format!("sample latency: {e}")))?;
        sqlx::query(
            "INSERT INTO health_samples (service, status, latency_ms, error, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&sample.service)
        .bind(sample.status.as_str())
        .bind(latency)
        .bind(&sample.error)
        .bind(sample.checked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn down_counts_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<(String, u64)>, PersistenceError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT service, COUNT(*) FROM health_samples
             WHERE status = 'down' AND checked_at >= ?1
             GROUP BY service",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(service, count)| (service, count as u64))
            .collect())
    }

    async fn slow_sample_count_since(
        &self,
        threshold_ms: u64,
        since: DateTime<Utc>,
    ) -> Result<u64, PersistenceError> {
        let threshold = i64::try_from(threshold_ms)
            .map_err(|e| PersistenceError::InvalidInput(format!("slow threshold: {e}")))?;
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM health_samples WHERE latency_ms > ?1 AND checked_at >= ?2",
        )
        .bind(threshold)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn last_sample_for(
        &self,
        service: &str,
    ) -> Result<Option<HealthSample>, PersistenceError> {
        let row = sqlx::query_as::<_, HealthSampleRow>(
            "SELECT service, status, latency_ms, error, checked_at
             FROM health_samples WHERE service = ?1
             ORDER BY checked_at DESC, sample_id DESC LIMIT 1",
        )
        .bind(service)
        .fetch_optional(&self.pool)
        .await?;
        row.map(HealthSample::try_from).transpose()
    }

    async fn sample_count_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, PersistenceError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM health_samples WHERE checked_at >= ?1 AND checked_at < ?2",
        )
        .bind(since)
        .bind(until)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
