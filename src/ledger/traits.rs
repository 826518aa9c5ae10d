//! The read-only data source interface over the ledger.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::http_client::HttpClientPoolError;
use crate::ledger::envelope::AccountTxEnvelope;

/// Errors from the ledger read API.
#[derive(Debug, Error)]
pub enum LedgerSourceError {
    /// No endpoints were configured.
    #[error("Ledger endpoint list cannot be empty")]
    NoEndpoints,

    /// A transport-level failure talking to one endpoint.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    /// An endpoint answered with a non-success HTTP status.
    #[error("Ledger endpoint returned HTTP {0}")]
    Http(u16),

    /// The ledger reported an application-level error.
    #[error("Ledger RPC error: {0}")]
    Rpc(String),

    /// The response body could not be parsed.
    #[error("Malformed ledger response: {0}")]
    Malformed(String),

    /// Every endpoint in the fallback chain failed.
    #[error("All ledger endpoints failed; last error: {0}")]
    AllEndpointsFailed(String),

    /// The HTTP client pool could not supply a client.
    #[error("HTTP client error: {0}")]
    Pool(#[from] HttpClientPoolError),
}

/// A read-only source of account transaction history.
///
/// Implementations are expected to be eventually consistent across
/// endpoints; callers handle overlap by upserting on the transaction hash.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LedgerDataSource: Send + Sync {
    /// Fetches transactions for an account, strictly newer than
    /// `ledger_index_min` when given, most recent page otherwise.
    async fn account_transactions(
        &self,
        address: &str,
        ledger_index_min: Option<u64>,
    ) -> Result<Vec<AccountTxEnvelope>, LedgerSourceError>;

    /// Lightweight liveness probe with no side effects.
    async fn ping(&self) -> Result<(), LedgerSourceError>;
}
