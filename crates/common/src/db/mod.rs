//! Database layer for Peptrack
//!
//! Provides:
//! - SeaORM entity models for the catalog tables
//! - The Postgres `Repository` implementing `CatalogStore`
//! - Connection pool management

pub mod models;
mod repository;

pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pub primary: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(AppError::configuration("database.url is not set"));
        }

        info!("Connecting to database...");

        let url = with_statement_timeout(&config.url, config.statement_timeout_secs);
        let mut opts = ConnectOptions::new(url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let primary = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { primary })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// Attach a server-side statement timeout to a Postgres URL so a stuck query
/// cannot hold an entity past its own deadline.
fn with_statement_timeout(url: &str, secs: u64) -> String {
    if secs == 0 || url.contains("statement_timeout") {
        return url.to_string();
    }
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}options=-c%20statement_timeout%3D{}", url, sep, secs * 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_timeout_appended() {
        assert_eq!(
            with_statement_timeout("postgres://localhost/peptrack", 20),
            "postgres://localhost/peptrack?options=-c%20statement_timeout%3D20000"
        );
        assert_eq!(
            with_statement_timeout("postgres://localhost/peptrack?sslmode=disable", 5),
            "postgres://localhost/peptrack?sslmode=disable&options=-c%20statement_timeout%3D5000"
        );
    }

    #[test]
    fn test_statement_timeout_disabled() {
        assert_eq!(
            with_statement_timeout("postgres://localhost/peptrack", 0),
            "postgres://localhost/peptrack"
        );
    }

    #[tokio::test]
    async fn test_empty_url_is_configuration_error() {
        let config = DatabaseConfig::default();
        let result = DbPool::new(&config).await;
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }
}
