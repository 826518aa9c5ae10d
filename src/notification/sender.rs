//! The outbound channel send operation.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::json;

use super::error::NotificationError;
use crate::config::ChannelConfig;

/// A single channel send. The retry primitive and the dispatcher sit on
/// top of this; implementations perform exactly one delivery per call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Sends one message to one channel. Success is a 2xx response.
    async fn send(&self, channel: &ChannelConfig, text: &str) -> Result<(), NotificationError>;
}

/// HTTP implementation of `ChannelSender`: POSTs a
/// `{target_id, text, format}` payload to the channel endpoint.
///
/// The client comes from the shared pool with transport retries disabled,
/// so each call maps to exactly one HTTP request and one audit row.
pub struct HttpChannelSender {
    client: Arc<ClientWithMiddleware>,
}

impl HttpChannelSender {
    /// Creates a new sender over a pooled client.
    pub fn new(client: Arc<ClientWithMiddleware>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChannelSender for HttpChannelSender {
    async fn send(&self, channel: &ChannelConfig, text: &str) -> Result<(), NotificationError> {
        let payload = json!({
            "target_id": channel.target_id,
            "text": text,
            "format": "markdown",
        });

        let response = self
            .client
            .post(channel.url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::SendFailed(status.as_u16()));
        }

        tracing::debug!(target_id = %channel.target_id, "Channel send accepted.");
        Ok(())
    }
}
