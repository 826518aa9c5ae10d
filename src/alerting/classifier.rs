//! Classification of stored transactions into whale alerts.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::{
    alerting::ExchangeDirectory,
    config::SeverityBands,
    models::{
        alert::{AlertCategory, AlertSeverity, WhaleAlert},
        transaction::LedgerTransaction,
    },
    persistence::{error::PersistenceError, traits::AppRepository},
};

/// Errors from classification. Unknown wallets and duplicate alerts are not
/// errors; only store failures surface here.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The store rejected a read or write.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result of classifying a batch of transactions.
#[derive(Debug, Default, Serialize)]
pub struct ClassifySummary {
    /// Transactions evaluated.
    pub evaluated: usize,
    /// Alerts created.
    pub created: usize,
    /// Per-item errors, as strings.
    pub errors: Vec<String>,
}

/// Evaluates transactions against wallet thresholds and creates alerts.
pub struct AlertClassifier<R: AppRepository + ?Sized> {
    repo: Arc<R>,
    exchanges: ExchangeDirectory,
    default_threshold: Decimal,
    bands: SeverityBands,
}

impl<R: AppRepository + ?Sized> AlertClassifier<R> {
    /// Creates a new classifier.
    pub fn new(
        repo: Arc<R>,
        exchanges: ExchangeDirectory,
        default_threshold: Decimal,
        bands: SeverityBands,
    ) -> Self {
        Self {
            repo,
            exchanges,
            default_threshold,
            bands,
        }
    }

    /// Classifies one transaction. Returns the created alert, or `None`
    /// when the amount is below threshold, the wallet is unknown, or an
    /// alert already exists for the hash (the dedup no-op).
    #[tracing::instrument(skip(self, tx), fields(hash = %tx.hash), level = "debug")]
    pub async fn classify(
        &self,
        tx: &LedgerTransaction,
    ) -> Result<Option<WhaleAlert>, ClassifierError> {
        let wallet = match self.repo.wallet_by_address(&tx.wallet_address).await? {
            Some(wallet) => wallet,
            None => {
                // Data error: log and skip the item, never abort the batch.
                tracing::warn!(
                    address = %tx.wallet_address,
                    hash = %tx.hash,
                    "Transaction references a wallet missing from the registry; skipping."
                );
                return Ok(None);
            }
        };

        let threshold = wallet.threshold_or(self.default_threshold);
        if tx.amount < threshold {
            return Ok(None);
        }

        let category = self.categorize(tx);
        let severity = AlertSeverity::for_amount(tx.amount, &self.bands);
        let mut alert = WhaleAlert::from_transaction(tx, &wallet.owner, category, severity);

        match self.repo.insert_alert(&alert).await? {
            Some(id) => {
                alert.id = id;
                tracing::info!(
                    alert_id = id,
                    hash = %tx.hash,
                    amount = %tx.amount,
                    severity = severity.as_str(),
                    category = category.as_str(),
                    "Whale alert created."
                );
                Ok(Some(alert))
            }
            None => {
                // Polling windows overlap and classification can re-run over
                // the same data; an existing alert is a normal outcome.
                tracing::debug!(hash = %tx.hash, "Alert already exists for transaction; skipping.");
                Ok(None)
            }
        }
    }

    /// Classifies a batch. Per-item failures are collected, not raised.
    pub async fn classify_batch(&self, txs: &[LedgerTransaction]) -> ClassifySummary {
        let mut summary = ClassifySummary {
            evaluated: txs.len(),
            ..Default::default()
        };
        for tx in txs {
            match self.classify(tx).await {
                Ok(Some(_)) => summary.created += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(hash = %tx.hash, error = %e, "Classification failed for transaction.");
                    summary.errors.push(format!("{}: {e}", tx.hash));
                }
            }
        }
        summary
    }

    fn categorize(&self, tx: &LedgerTransaction) -> AlertCategory {
        let to_known_exchange = tx
            .destination
            .as_deref()
            .and_then(|d| self.exchanges.lookup(d))
            .is_some();
        if tx.destination_tag.is_some() && to_known_exchange {
            AlertCategory::ExchangeDeposit
        } else {
            AlertCategory::WhaleMovement
        }
    }
}
