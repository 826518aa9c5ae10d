//! The ledger poller: fetches transactions newer than each wallet's cursor,
//! normalizes and stores them, and advances the cursor.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;

use crate::{
    ledger::{
        normalize::{NormalizeError, normalize},
        traits::{LedgerDataSource, LedgerSourceError},
    },
    models::{
        RunStatus,
        health::{HealthSample, HealthStatus},
        transaction::LedgerTransaction,
        wallet::WatchedWallet,
    },
    persistence::{error::PersistenceError, traits::AppRepository},
};

/// Errors that can abort a single wallet poll.
#[derive(Debug, Error)]
pub enum PollerError {
    /// The ledger read failed on every endpoint.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerSourceError),

    /// The store rejected a write.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result of polling one wallet. Errors are carried as data, not raised:
/// a failed wallet never aborts the rest of a poll-all run.
#[derive(Debug, Serialize)]
pub struct WalletPollOutcome {
    /// The wallet's address.
    pub address: String,
    /// Newly stored transactions (duplicates absorbed by the upsert are not
    /// counted).
    pub ingested: u64,
    /// The cursor after this poll.
    pub cursor: Option<u64>,
    /// The failure, if the poll failed.
    pub error: Option<String>,
    /// The newly stored transactions themselves, for downstream
    /// classification within the same cycle.
    #[serde(skip)]
    pub transactions: Vec<LedgerTransaction>,
}

/// Aggregated result of a poll-all run.
#[derive(Debug, Serialize)]
pub struct PollSummary {
    /// Overall status derived from per-wallet outcomes.
    pub status: RunStatus,
    /// Wallets polled without error.
    pub succeeded: usize,
    /// Wallets whose poll failed.
    pub failed: usize,
    /// Per-wallet outcomes.
    pub outcomes: Vec<WalletPollOutcome>,
}

/// Polls watched wallets against the ledger and persists what it finds.
pub struct WalletPoller<R: AppRepository + ?Sized, L: LedgerDataSource + ?Sized> {
    repo: Arc<R>,
    ledger: Arc<L>,
    concurrency: usize,
}

impl<R: AppRepository + ?Sized, L: LedgerDataSource + ?Sized> WalletPoller<R, L> {
    /// Creates a new poller.
    pub fn new(repo: Arc<R>, ledger: Arc<L>, concurrency: usize) -> Self {
        Self {
            repo,
            ledger,
            concurrency: concurrency.max(1),
        }
    }

    /// Polls every active wallet with bounded concurrency. Per-wallet
    /// failures are collected into the summary.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn poll_all(&self) -> Result<PollSummary, PollerError> {
        let wallets = self.repo.active_wallets().await?;
        tracing::info!(wallets = wallets.len(), "Polling watched wallets.");

        let outcomes: Vec<WalletPollOutcome> = futures::stream::iter(wallets)
            .map(|wallet| async move { self.poll_wallet(&wallet).await })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        let succeeded = outcomes.len() - failed;
        Ok(PollSummary {
            status: RunStatus::from_counts(succeeded, failed),
            succeeded,
            failed,
            outcomes,
        })
    }

    /// Polls one wallet. Always records a health sample for the attempt,
    /// success or failure, with the measured latency.
    #[tracing::instrument(skip(self, wallet), fields(address = %wallet.address), level = "debug")]
    pub async fn poll_wallet(&self, wallet: &WatchedWallet) -> WalletPollOutcome {
        let started = Instant::now();
        let result = self.poll_inner(wallet).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (status, error) = match &result {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => (HealthStatus::Down, Some(e.to_string())),
        };
        let sample = HealthSample::now(
            format!("poller:{}", wallet.address),
            status,
            latency_ms,
            error.clone(),
        );
        // A sample-write failure must never fail the poll itself.
        if let Err(e) = self.repo.record_health_sample(&sample).await {
            tracing::warn!(address = %wallet.address, error = %e, "Failed to record poll health sample.");
        }

        match result {
            Ok((transactions, cursor)) => WalletPollOutcome {
                address: wallet.address.clone(),
                ingested: transactions.len() as u64,
                cursor,
                error: None,
                transactions,
            },
            Err(e) => {
                tracing::error!(address = %wallet.address, error = %e, "Wallet poll failed.");
                WalletPollOutcome {
                    address: wallet.address.clone(),
                    ingested: 0,
                    cursor: wallet.cursor,
                    error,
                    transactions: Vec::new(),
                }
            }
        }
    }

    async fn poll_inner(
        &self,
        wallet: &WatchedWallet,
    ) -> Result<(Vec<LedgerTransaction>, Option<u64>), PollerError> {
        // Strictly newer than the cursor; with no cursor, the most recent
        // page only -- backfill is deliberately not attempted.
        let ledger_index_min = wallet.cursor.map(|c| c + 1);
        let envelopes = self
            .ledger
            .account_transactions(&wallet.address, ledger_index_min)
            .await?;

        let mut ingested = Vec::new();
        let mut highest_seen = wallet.cursor;

        for envelope in &envelopes {
            // Every entry returned counts as observed for cursor purposes,
            // including non-payments and entries we skip as malformed.
            highest_seen = Some(highest_seen.unwrap_or(0).max(envelope.tx.ledger_index));

            match normalize(envelope, &wallet.address) {
                Ok(tx) => {
                    if self.repo.upsert_transaction(&tx).await? {
                        ingested.push(tx);
                    } else {
                        tracing::debug!(hash = %tx.hash, "Transaction already stored; overlapping window absorbed.");
                    }
                }
                Err(NormalizeError::NotAPayment(_)) => {}
                Err(e) => {
                    tracing::warn!(address = %wallet.address, error = %e, "Skipping unusable ledger entry.");
                }
            }
        }

        if !envelopes.is_empty() {
            if let Some(new_cursor) = highest_seen {
                if Some(new_cursor) != wallet.cursor {
                    self.repo.advance_cursor(&wallet.address, new_cursor).await?;
                }
            }
        }

        tracing::debug!(
            address = %wallet.address,
            ingested = ingested.len(),
            cursor = ?highest_seen,
            "Wallet poll complete."
        );
        Ok((ingested, highest_seen))
    }
}
