//! SQLite implementation of the application repository.

use std::str::FromStr;

use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};

pub mod repository;

use crate::persistence::error::PersistenceError;

/// A concrete implementation of `AppRepository` backed by SQLite.
pub struct SqliteRepository {
    /// The SQLite connection pool used for database operations.
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Connects to the SQLite database at the given URL, creating the file
    /// if it does not exist.
    #[tracing::instrument(level = "info")]
    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        tracing::debug!(database_url, "Connecting to SQLite database.");
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| PersistenceError::InvalidInput(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            PersistenceError::OperationFailed(format!("Failed to connect to database: {}", e))
        })?;
        tracing::info!(database_url, "Connected to SQLite database.");
        Ok(Self { pool })
    }

    /// Runs database migrations.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run database migrations.");
            PersistenceError::MigrationError(e.to_string())
        })?;
        tracing::info!("Database migrations completed.");
        Ok(())
    }

    /// Gets access to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite connection pool closed.");
    }
}
