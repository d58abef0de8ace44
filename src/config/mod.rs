use crate::core::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub processor: ProcessorConfig,
    pub webhooks: WebhookConfig,
    pub invoicing: InvoicingConfig,
    pub notifications: NotificationConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    /// "json" switches the tracing output to JSON lines
    pub log_format: String,
    /// "mysql" (default) or "memory"
    pub storage_backend: String,
}

/// Payment processor API and webhook settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    pub api_key: String,
    pub webhook_secret: String,
    pub base_url: String,
    pub signature_tolerance_secs: i64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub payout_page_size: u32,
    pub payout_max_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Upper bound on business processing per delivery
    pub processing_timeout_secs: u64,
    /// A claim still "processing" after this long may be taken over
    pub stale_claim_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicingConfig {
    pub number_floor: i64,
    pub sync_url: Option<String>,
    pub sync_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub url: Option<String>,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub attempt_timeout_secs: u64,
    pub ops_alert_recipient: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Argon2 hash of the admin API key
    pub admin_api_key_hash: Option<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            webhook_secret: String::new(),
            base_url: "https://api.stripe.com".to_string(),
            signature_tolerance_secs: 300,
            request_timeout_secs: 10,
            max_retries: 2,
            payout_page_size: 100,
            payout_max_pages: 1000,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            processing_timeout_secs: 20,
            stale_claim_minutes: 30,
        }
    }
}

impl Default for InvoicingConfig {
    fn default() -> Self {
        Self {
            number_floor: 100001,
            sync_url: None,
            sync_timeout_secs: 5,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_attempts: 4,
            base_delay_ms: 500,
            attempt_timeout_secs: 5,
            ops_alert_recipient: None,
        }
    }
}

/// Read an optional environment variable, treating blank values as unset
fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an environment variable, falling back to `default`
fn parsed_var<T: FromStr>(key: &str, default: T) -> Result<T> {
    match optional_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}", key))),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let processor_defaults = ProcessorConfig::default();
        let webhook_defaults = WebhookConfig::default();
        let invoicing_defaults = InvoicingConfig::default();
        let notification_defaults = NotificationConfig::default();

        let storage_backend =
            env::var("STORAGE_BACKEND").unwrap_or_else(|_| "mysql".to_string());

        let database = if storage_backend == "memory" {
            DatabaseConfig::unused()
        } else {
            DatabaseConfig::from_env()?
        };

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
                storage_backend,
            },
            database,
            server: ServerConfig::from_env()?,
            processor: ProcessorConfig {
                api_key: env::var("PROCESSOR_API_KEY").map_err(|_| {
                    AppError::Configuration("PROCESSOR_API_KEY not set".to_string())
                })?,
                webhook_secret: env::var("PROCESSOR_WEBHOOK_SECRET").map_err(|_| {
                    AppError::Configuration("PROCESSOR_WEBHOOK_SECRET not set".to_string())
                })?,
                base_url: optional_var("PROCESSOR_BASE_URL")
                    .unwrap_or(processor_defaults.base_url),
                signature_tolerance_secs: parsed_var(
                    "PROCESSOR_SIGNATURE_TOLERANCE_SECS",
                    processor_defaults.signature_tolerance_secs,
                )?,
                request_timeout_secs: parsed_var(
                    "PROCESSOR_REQUEST_TIMEOUT_SECS",
                    processor_defaults.request_timeout_secs,
                )?,
                max_retries: parsed_var("PROCESSOR_MAX_RETRIES", processor_defaults.max_retries)?,
                payout_page_size: parsed_var(
                    "PAYOUT_PAGE_SIZE",
                    processor_defaults.payout_page_size,
                )?,
                payout_max_pages: parsed_var(
                    "PAYOUT_MAX_PAGES",
                    processor_defaults.payout_max_pages,
                )?,
            },
            webhooks: WebhookConfig {
                processing_timeout_secs: parsed_var(
                    "WEBHOOK_PROCESSING_TIMEOUT_SECS",
                    webhook_defaults.processing_timeout_secs,
                )?,
                stale_claim_minutes: parsed_var(
                    "WEBHOOK_STALE_CLAIM_MINUTES",
                    webhook_defaults.stale_claim_minutes,
                )?,
            },
            invoicing: InvoicingConfig {
                number_floor: parsed_var("INVOICE_NUMBER_FLOOR", invoicing_defaults.number_floor)?,
                sync_url: optional_var("INVOICING_SYNC_URL"),
                sync_timeout_secs: parsed_var(
                    "INVOICING_SYNC_TIMEOUT_SECS",
                    invoicing_defaults.sync_timeout_secs,
                )?,
            },
            notifications: NotificationConfig {
                url: optional_var("NOTIFICATION_URL"),
                max_attempts: parsed_var(
                    "NOTIFICATION_MAX_ATTEMPTS",
                    notification_defaults.max_attempts,
                )?,
                base_delay_ms: parsed_var(
                    "NOTIFICATION_BASE_DELAY_MS",
                    notification_defaults.base_delay_ms,
                )?,
                attempt_timeout_secs: parsed_var(
                    "NOTIFICATION_ATTEMPT_TIMEOUT_SECS",
                    notification_defaults.attempt_timeout_secs,
                )?,
                ops_alert_recipient: optional_var("OPS_ALERT_EMAIL"),
            },
            security: SecurityConfig {
                admin_api_key_hash: optional_var("ADMIN_API_KEY_HASH"),
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.processor.webhook_secret.trim().is_empty() {
            return Err(AppError::Configuration(
                "Webhook secret cannot be empty".to_string(),
            ));
        }

        if self.processor.payout_page_size == 0 || self.processor.payout_page_size > 100 {
            return Err(AppError::Configuration(
                "Payout page size must be between 1 and 100".to_string(),
            ));
        }

        if self.processor.payout_max_pages == 0 {
            return Err(AppError::Configuration(
                "Payout max pages must be greater than 0".to_string(),
            ));
        }

        if self.processor.request_timeout_secs == 0 || self.webhooks.processing_timeout_secs == 0
        {
            return Err(AppError::Configuration(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.notifications.max_attempts == 0 {
            return Err(AppError::Configuration(
                "Notification attempts must be at least 1".to_string(),
            ));
        }

        if self.invoicing.number_floor <= 0 {
            return Err(AppError::Configuration(
                "Invoice number floor must be positive".to_string(),
            ));
        }

        if !matches!(self.app.storage_backend.as_str(), "mysql" | "memory") {
            return Err(AppError::Configuration(format!(
                "Unknown STORAGE_BACKEND '{}'",
                self.app.storage_backend
            )));
        }

        Ok(())
    }
}
