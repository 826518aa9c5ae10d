//! Composition of the pipeline stages and the operations behind the
//! trigger surface.
//!
//! There is no long-running loop here: every operation is a single
//! invocation driven by an external scheduler or an operator, and every
//! operation reports a structured result rather than raising per-item
//! failures.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::{
    alerting::{ExchangeDirectory, classifier::AlertClassifier},
    config::{AppConfig, HttpRetryConfig},
    health::{HealthAggregator, HealthError},
    http_client::{HttpClientPool, HttpClientPoolError},
    ledger::{
        rpc::JsonRpcLedgerSource,
        traits::{LedgerDataSource, LedgerSourceError},
    },
    models::{RunStatus, health::HealthReport},
    notification::{
        AlertDispatcher, DeliveryResult, DispatchSummary, error::DispatchError,
        sender::HttpChannelSender,
    },
    persistence::{error::PersistenceError, sqlite::SqliteRepository, traits::AppRepository},
    poller::{PollSummary, PollerError, WalletPoller},
};

/// Errors surfaced by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The requested wallet is not in the registry.
    #[error("Wallet not registered: {0}")]
    UnknownWallet(String),

    /// The store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// A poll failed outright (the per-wallet path records errors instead).
    #[error("Poller error: {0}")]
    Poller(#[from] PollerError),

    /// The dispatcher failed.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A health sweep failed.
    #[error("Health error: {0}")]
    Health(#[from] HealthError),

    /// The HTTP client pool could not supply a client.
    #[error("HTTP client error: {0}")]
    Pool(#[from] HttpClientPoolError),

    /// The ledger source could not be constructed.
    #[error("Ledger source error: {0}")]
    Ledger(#[from] LedgerSourceError),
}

/// Report for one full poll cycle: poll, classify, dispatch.
#[derive(Debug, Serialize)]
pub struct PollCycleReport {
    /// Overall status across all three stages.
    pub status: RunStatus,
    /// Per-wallet poll results.
    pub poll: PollSummary,
    /// Transactions evaluated by the classifier.
    pub evaluated: usize,
    /// Alerts created this cycle.
    pub alerts_created: usize,
    /// Dispatch results, covering fresh and previously-unsent alerts.
    pub dispatch: DispatchSummary,
    /// Classification errors, as strings.
    pub errors: Vec<String>,
}

/// The wired pipeline: poller, classifier, dispatcher, health aggregator
/// over one shared repository.
pub struct Pipeline<R: AppRepository + ?Sized> {
    repo: Arc<R>,
    poller: WalletPoller<R, dyn LedgerDataSource>,
    classifier: AlertClassifier<R>,
    dispatcher: Arc<AlertDispatcher<R>>,
    health: HealthAggregator<R>,
    dispatch_batch_limit: u32,
}

impl Pipeline<SqliteRepository> {
    /// Wires the production pipeline from configuration: HTTP client pool,
    /// ledger source with its fallback chain, channel sender, and the three
    /// stages, all over the given repository.
    pub async fn bootstrap(
        config: &AppConfig,
        repo: Arc<SqliteRepository>,
    ) -> Result<Self, PipelineError> {
        let pool = HttpClientPool::new(config.http_base.clone());

        let rpc_client = pool.get_or_create(&config.http_retry).await?;
        let ledger: Arc<dyn LedgerDataSource> = Arc::new(JsonRpcLedgerSource::new(
            config.ledger_rpc_urls.clone(),
            rpc_client,
            config.ledger_page_limit,
        )?);

        // Channel sends run without transport retries: the dispatcher's
        // audited attempt loop owns retry behavior for deliveries.
        let send_client = pool
            .get_or_create(&HttpRetryConfig::no_transport_retries())
            .await?;
        let sender = Arc::new(HttpChannelSender::new(send_client));

        Ok(Self::assemble(repo, ledger, sender, config))
    }

    /// Assembles the stages from already-built collaborators. Split out of
    /// `bootstrap` so tests can inject their own ledger source and sender.
    pub fn assemble(
        repo: Arc<SqliteRepository>,
        ledger: Arc<dyn LedgerDataSource>,
        sender: Arc<crate::notification::sender::HttpChannelSender>,
        config: &AppConfig,
    ) -> Self {
        let poller = WalletPoller::new(
            Arc::clone(&repo),
            Arc::clone(&ledger),
            config.poll_concurrency,
        );
        let classifier = AlertClassifier::new(
            Arc::clone(&repo),
            ExchangeDirectory::new(config.exchanges.clone()),
            config.default_threshold,
            config.severity_bands.clone(),
        );
        let dispatcher = Arc::new(AlertDispatcher::new(
            Arc::clone(&repo),
            Arc::clone(&sender) as Arc<dyn crate::notification::sender::ChannelSender>,
            config.channels.clone(),
            config.dispatch_retry.clone(),
            config.exchange_deposit_floor,
            config.trend_window,
        ));
        let health = HealthAggregator::new(
            Arc::clone(&repo),
            Arc::clone(&ledger),
            Arc::clone(&dispatcher),
            sender as Arc<dyn crate::notification::sender::ChannelSender>,
            config.channels.clone(),
            config.dispatch_retry.clone(),
            config.health.clone(),
        );
        Self {
            repo,
            poller,
            classifier,
            dispatcher,
            health,
            dispatch_batch_limit: config.dispatch_batch_limit,
        }
    }
}

impl<R: AppRepository + ?Sized> Pipeline<R> {
    /// Runs a full poll cycle: poll the wallet (or all wallets), classify
    /// the newly ingested transactions, then dispatch every unsent alert.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_poll_cycle(
        &self,
        address: Option<&str>,
    ) -> Result<PollCycleReport, PipelineError> {
        let poll = match address {
            Some(address) => {
                let wallet = self
                    .repo
                    .wallet_by_address(address)
                    .await?
                    .ok_or_else(|| PipelineError::UnknownWallet(address.to_string()))?;
                let outcome = self.poller.poll_wallet(&wallet).await;
                let failed = usize::from(outcome.error.is_some());
                PollSummary {
                    status: RunStatus::from_counts(1 - failed, failed),
                    succeeded: 1 - failed,
                    failed,
                    outcomes: vec![outcome],
                }
            }
            None => self.poller.poll_all().await?,
        };

        let fresh: Vec<_> = poll
            .outcomes
            .iter()
            .flat_map(|o| o.transactions.iter().cloned())
            .collect();
        let classify = self.classifier.classify_batch(&fresh).await;

        // Dispatch picks up this cycle's alerts and anything unsent from
        // earlier runs (the at-least-once reprocessing path).
        let dispatch = self.dispatcher.dispatch_pending(self.dispatch_batch_limit).await?;

        let any_failure = poll.failed > 0 || !classify.errors.is_empty() || dispatch.failed > 0;
        let any_success = poll.succeeded > 0 || dispatch.delivered > 0;
        let status = match (any_success, any_failure) {
            (_, false) => RunStatus::Ok,
            (true, true) => RunStatus::Partial,
            (false, true) => RunStatus::Failed,
        };

        Ok(PollCycleReport {
            status,
            poll,
            evaluated: classify.evaluated,
            alerts_created: classify.created,
            dispatch,
            errors: classify.errors,
        })
    }

    /// Dispatches one alert by id, optionally in test mode.
    pub async fn dispatch_alert(
        &self,
        alert_id: i64,
        test_mode: bool,
    ) -> Result<DeliveryResult, PipelineError> {
        Ok(self.dispatcher.dispatch_by_id(alert_id, test_mode).await?)
    }

    /// Runs one health sweep.
    pub async fn run_health_sweep(&self) -> Result<HealthReport, PipelineError> {
        Ok(self.health.run_sweep().await?)
    }
}
