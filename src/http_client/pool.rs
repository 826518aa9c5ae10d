//! A reusable, thread-safe pool for managing HTTP clients.
//!
//! Both outbound paths (ledger RPC, channel sends) draw their clients from
//! one shared pool, keyed by transport retry policy, so each policy maps to
//! exactly one connection-pooled client.

use super::client::create_retryable_http_client;
use crate::config::{BaseHttpClientConfig, HttpRetryConfig};
use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors that can occur within the `HttpClientPool`.
#[derive(Debug, Error)]
pub enum HttpClientPoolError {
    /// An error occurred while building the underlying `reqwest::Client`.
    #[error("Failed to create HTTP client: {0}")]
    HttpClientBuildError(String),
}

/// A pool for managing and reusing HTTP clients for various services.
///
/// Clients are keyed by their `HttpRetryConfig` so that different retry
/// strategies result in different, isolated clients. All clients share the
/// base tuning (connection pool sizes, connect and request timeouts), which
/// guarantees a bounded timeout on every outbound call.
pub struct HttpClientPool {
    base: BaseHttpClientConfig,
    clients: Arc<RwLock<HashMap<String, Arc<ClientWithMiddleware>>>>,
}

impl HttpClientPool {
    /// Creates a new, empty `HttpClientPool` with the given base tuning.
    pub fn new(base: BaseHttpClientConfig) -> Self {
        Self {
            base,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Gets an existing HTTP client from the pool or creates a new one if
    /// none exists for the given retry policy.
    ///
    /// Uses a double-checked locking pattern to minimize contention.
    pub async fn get_or_create(
        &self,
        retry_policy: &HttpRetryConfig,
    ) -> Result<Arc<ClientWithMiddleware>, HttpClientPoolError> {
        let key = format!("{retry_policy:?}");

        // Fast path: Check if the client already exists with a read lock.
        if let Some(client) = self.clients.read().await.get(&key) {
            return Ok(client.clone());
        }

        // Slow path: If not found, acquire a write lock to create it.
        let mut clients = self.clients.write().await;
        // Double-check: Another task might have created the client while we
        // were waiting for the write lock.
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let base_client = ReqwestClient::builder()
            .pool_max_idle_per_host(self.base.max_idle_per_host)
            .pool_idle_timeout(Some(self.base.idle_timeout))
            .connect_timeout(self.base.connect_timeout)
            .timeout(self.base.request_timeout)
            .build()
            .map_err(|e| HttpClientPoolError::HttpClientBuildError(e.to_string()))?;

        let new_client = Arc::new(create_retryable_http_client(retry_policy, base_client));
        clients.insert(key, new_client.clone());

        Ok(new_client)
    }

    /// Returns the number of active HTTP clients in the pool.
    #[cfg(test)]
    pub async fn get_active_client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

impl Default for HttpClientPool {
    fn default() -> Self {
        Self::new(BaseHttpClientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_pool() -> HttpClientPool {
        HttpClientPool::default()
    }

    #[tokio::test]
    async fn test_pool_init_empty() {
        let pool = create_pool();
        assert_eq!(pool.get_active_client_count().await, 0);
    }

    #[tokio::test]
    async fn test_pool_get_or_create_http_client() {
        let pool = create_pool();
        let retry_config = HttpRetryConfig::default();
        let client = pool.get_or_create(&retry_config).await;

        assert!(client.is_ok(), "Should successfully create or get HTTP client");
        assert_eq!(pool.get_active_client_count().await, 1);
    }

    #[tokio::test]
    async fn test_pool_returns_same_client_for_same_config() {
        let pool = create_pool();
        let retry_config = HttpRetryConfig::default();
        let client1 = pool.get_or_create(&retry_config).await.unwrap();
        let client2 = pool.get_or_create(&retry_config).await.unwrap();

        assert!(
            Arc::ptr_eq(&client1, &client2),
            "Should return the same client instance"
        );
        assert_eq!(pool.get_active_client_count().await, 1);
    }

    #[tokio::test]
    async fn test_pool_returns_different_clients_for_different_configs() {
        let pool = create_pool();
        let retry_config_1 = HttpRetryConfig::default();
        let retry_config_2 = HttpRetryConfig::no_transport_retries();

        let client1 = pool.get_or_create(&retry_config_1).await.unwrap();
        let client2 = pool.get_or_create(&retry_config_2).await.unwrap();

        assert!(
            !Arc::ptr_eq(&client1, &client2),
            "Should return different client instances for different configurations"
        );
        assert_eq!(pool.get_active_client_count().await, 2);
    }

    #[tokio::test]
    async fn test_pool_concurrent_access() {
        let pool = Arc::new(create_pool());
        let retry_config = HttpRetryConfig::default();

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let pool_clone = Arc::clone(&pool);
            let retry_config = retry_config.clone();
            tasks.push(tokio::spawn(async move {
                pool_clone.get_or_create(&retry_config).await.is_ok()
            }));
        }

        for result in futures::future::join_all(tasks).await {
            assert!(result.unwrap(), "All tasks should complete successfully");
        }
        assert_eq!(pool.get_active_client_count().await, 1);
    }
}
