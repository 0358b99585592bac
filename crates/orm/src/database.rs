//! Connection pool creation for PostgreSQL

use std::time::Duration;
use sqlx::{postgres::PgPoolOptions, PgPool};
use crate::config::{DatabaseConfig, PoolConfig};
use crate::error::ModelError;

/// Database connection pool error types
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Connection acquisition failed: {0}")]
    AcquisitionFailed(#[from] sqlx::Error),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

impl From<PoolError> for ModelError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::AcquisitionFailed(sqlx_err) => {
                ModelError::Connection(format!("Database connection failed: {}", sqlx_err))
            }
            PoolError::ConfigurationError { message } => {
                ModelError::Connection(format!("Database configuration error: {}", message))
            }
        }
    }
}

/// Pool options derived from the pool configuration
pub fn pool_options(config: &PoolConfig) -> PgPoolOptions {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .test_before_acquire(config.test_before_acquire);

    if let Some(idle_timeout) = config.idle_timeout {
        options = options.idle_timeout(Duration::from_secs(idle_timeout));
    }

    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(Duration::from_secs(max_lifetime));
    }

    options
}

/// Create a PostgreSQL pool from the database configuration
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, PoolError> {
    config.validate().map_err(|e| PoolError::ConfigurationError {
        message: e.to_string(),
    })?;

    let pool_config = &config.pool;
    tracing::debug!(
        max = pool_config.max_connections,
        min = pool_config.min_connections,
        acquire_timeout = pool_config.acquire_timeout,
        test_before_acquire = pool_config.test_before_acquire,
        "creating database pool"
    );

    let pool = pool_options(pool_config)
        .connect(&config.url())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create database pool: {}", e);
            PoolError::AcquisitionFailed(e)
        })?;

    tracing::info!(
        "Database pool created with {} max connections",
        pool_config.max_connections
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_maps_to_connection() {
        let err: ModelError = PoolError::ConfigurationError {
            message: "bad".to_string(),
        }
        .into();
        assert!(matches!(err, ModelError::Connection(ref msg) if msg.contains("bad")));
    }

    #[tokio::test]
    async fn test_create_pool_rejects_invalid_config() {
        let mut config = DatabaseConfig::default();
        config.pool.max_connections = 0;

        let err = create_pool(&config).await.unwrap_err();
        assert!(matches!(err, PoolError::ConfigurationError { .. }));
    }
}
