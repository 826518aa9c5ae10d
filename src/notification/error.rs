//! Error types for the notification layer.

use thiserror::Error;

use crate::{http_client::HttpClientPoolError, persistence::error::PersistenceError};

/// Defines the possible errors that can occur while sending notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// An error related to invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The channel rejected the message.
    #[error("Channel send failed with status: {0}")]
    SendFailed(u16),

    /// An error from the underlying `reqwest` or `reqwest_middleware`
    /// libraries.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest_middleware::Error),

    /// An error originating from the HTTP client pool.
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] HttpClientPoolError),
}

/// Errors from the dispatcher itself, as opposed to a single send.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The requested alert does not exist.
    #[error("Alert not found: {0}")]
    AlertNotFound(i64),

    /// The store rejected a read or write.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
