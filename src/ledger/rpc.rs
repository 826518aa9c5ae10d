//! JSON-RPC ledger client with a sequential endpoint fallback chain.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::json;
use url::Url;

use super::{
    envelope::AccountTxEnvelope,
    traits::{LedgerDataSource, LedgerSourceError},
};

/// A `LedgerDataSource` speaking JSON-RPC over HTTPS POST against an ordered
/// list of equivalent read endpoints.
///
/// Endpoints are tried strictly in order: on any transport or non-success
/// failure the next endpoint is tried immediately, and a request only fails
/// once every endpoint has failed. Transient blips within a single endpoint
/// are absorbed by the retry middleware on the pooled client; the chain here
/// handles whole-node outages.
pub struct JsonRpcLedgerSource {
    endpoints: Vec<Url>,
    client: Arc<ClientWithMiddleware>,
    page_limit: u32,
}

impl JsonRpcLedgerSource {
    /// Creates a new source over the given endpoints.
    pub fn new(
        endpoints: Vec<Url>,
        client: Arc<ClientWithMiddleware>,
        page_limit: u32,
    ) -> Result<Self, LedgerSourceError> {
        if endpoints.is_empty() {
            return Err(LedgerSourceError::NoEndpoints);
        }
        Ok(Self {
            endpoints,
            client,
            page_limit,
        })
    }

    /// POSTs the request body to each endpoint in turn, returning the first
    /// successfully parsed `result` object.
    async fn call(&self, body: &serde_json::Value) -> Result<serde_json::Value, LedgerSourceError> {
        let mut last_error = String::new();

        for endpoint in &self.endpoints {
            let response = match self.client.post(endpoint.clone()).json(body).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Ledger endpoint unreachable, trying next.");
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                tracing::warn!(endpoint = %endpoint, %status, "Ledger endpoint returned error status, trying next.");
                last_error = LedgerSourceError::Http(status.as_u16()).to_string();
                continue;
            }

            let payload: serde_json::Value = match response.json().await {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Ledger endpoint returned unparseable body, trying next.");
                    last_error = e.to_string();
                    continue;
                }
            };

            let result = match payload.get("result") {
                Some(result) => result,
                None => {
                    last_error = "response missing result object".to_string();
                    continue;
                }
            };

            if result.get("status").and_then(|s| s.as_str()) == Some("error") {
                let message = result
                    .get("error_message")
                    .or_else(|| result.get("error"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown ledger error");
                return Err(LedgerSourceError::Rpc(message.to_string()));
            }

            return Ok(result.clone());
        }

        Err(LedgerSourceError::AllEndpointsFailed(last_error))
    }
}

#[async_trait]
impl LedgerDataSource for JsonRpcLedgerSource {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn account_transactions(
        &self,
        address: &str,
        ledger_index_min: Option<u64>,
    ) -> Result<Vec<AccountTxEnvelope>, LedgerSourceError> {
        let ledger_index_min = ledger_index_min
            .map(|min| json!(min))
            .unwrap_or_else(|| json!(-1));
        let body = json!({
            "method": "account_tx",
            "params": [{
                "account": address,
                "limit": self.page_limit,
                "ledger_index_min": ledger_index_min,
                "ledger_index_max": -1,
                "forward": false,
            }]
        });

        let result = self.call(&body).await?;

        let entries = result
            .get("transactions")
            .and_then(|t| t.as_array())
            .ok_or_else(|| {
                LedgerSourceError::Malformed("result missing transactions array".to_string())
            })?;

        // Tolerant per-entry parsing: one malformed envelope is a data
        // error for that entry, not for the whole page.
        let mut envelopes = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<AccountTxEnvelope>(entry.clone()) {
                Ok(envelope) => envelopes.push(envelope),
                Err(e) => {
                    tracing::warn!(address, error = %e, "Skipping malformed ledger entry.");
                }
            }
        }

        tracing::debug!(address, count = envelopes.len(), "Fetched account transactions.");
        Ok(envelopes)
    }

    async fn ping(&self) -> Result<(), LedgerSourceError> {
        let body = json!({ "method": "ping", "params": [{}] });
        self.call(&body).await?;
        Ok(())
    }
}
