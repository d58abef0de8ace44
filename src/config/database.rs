use super::{optional_var, parsed_var};
use crate::core::{AppError, Result};
use serde::Deserialize;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;

/// MySQL connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    /// How long a webhook may wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        let url = optional_var("DATABASE_URL")
            .ok_or_else(|| AppError::Configuration("DATABASE_URL not set".to_string()))?;

        let config = DatabaseConfig {
            url,
            min_connections: parsed_var("DATABASE_MIN_CONNECTIONS", 2)?,
            max_connections: parsed_var("DATABASE_MAX_CONNECTIONS", 20)?,
            acquire_timeout_secs: parsed_var("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?,
        };

        if config.max_connections == 0 || config.min_connections > config.max_connections {
            return Err(AppError::Configuration(format!(
                "Invalid pool bounds: min {} max {}",
                config.min_connections, config.max_connections
            )));
        }

        Ok(config)
    }

    /// Placeholder used when running on the in-memory store
    pub fn unused() -> Self {
        DatabaseConfig {
            url: String::new(),
            min_connections: 0,
            max_connections: 0,
            acquire_timeout_secs: 0,
        }
    }

    /// Connect to MySQL and bring the schema up to date
    pub async fn connect_and_migrate(&self) -> Result<MySqlPool> {
        let pool = MySqlPoolOptions::new()
            .min_connections(self.min_connections)
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(&self.url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Configuration(format!("Migration failed: {}", e)))?;

        Ok(pool)
    }
}
