// Test Application
//
// Builds the full service graph on the in-memory store with fake
// collaborators, so HTTP-level tests run without MySQL or network access.

use super::fakes::{FakeProcessor, RecordingNotifier};
use actix_web::web;
use std::sync::Arc;
use tuitionsync::config::{
    AppConfig, Config, DatabaseConfig, InvoicingConfig, NotificationConfig, ProcessorConfig,
    SecurityConfig, ServerConfig, WebhookConfig,
};
use tuitionsync::core::MemoryStore;
use tuitionsync::modules::billing::NoopInvoicePublisher;
use tuitionsync::webhooks::WebhookDispatcher;
use tuitionsync::{app, AppState, Collaborators, Storage};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const OPS_EMAIL: &str = "ops@school.test";
pub const ADMIN_KEY: &str = "admin_test_key";

/// Configuration tuned for tests: tiny retry delays, two-item payout pages
pub fn test_config() -> Config {
    Config {
        app: AppConfig {
            env: "test".into(),
            log_level: "debug".into(),
            log_format: "text".into(),
            storage_backend: "memory".into(),
        },
        database: DatabaseConfig::unused(),
        server: ServerConfig::new("127.0.0.1".into(), 0),
        processor: ProcessorConfig {
            webhook_secret: WEBHOOK_SECRET.into(),
            payout_page_size: 2,
            payout_max_pages: 50,
            request_timeout_secs: 2,
            ..ProcessorConfig::default()
        },
        webhooks: WebhookConfig {
            processing_timeout_secs: 5,
            stale_claim_minutes: 30,
        },
        invoicing: InvoicingConfig::default(),
        notifications: NotificationConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            attempt_timeout_secs: 1,
            ops_alert_recipient: Some(OPS_EMAIL.into()),
            ..NotificationConfig::default()
        },
        security: SecurityConfig {
            admin_api_key_hash: None,
        },
    }
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub processor: Arc<FakeProcessor>,
    pub notifier: Arc<RecordingNotifier>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Application whose admin scope accepts `ADMIN_KEY`
    pub fn with_admin_key() -> Self {
        let mut config = test_config();
        config.security.admin_api_key_hash = Some(
            tuitionsync::middleware::hash_api_key(ADMIN_KEY).expect("Failed to hash admin key"),
        );
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let processor = Arc::new(FakeProcessor::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let collaborators = Collaborators {
            customers: processor.clone(),
            charges: processor.clone(),
            notifier: notifier.clone(),
            invoices: Arc::new(NoopInvoicePublisher),
        };
        let state = AppState::build(&config, Storage::Memory(store.clone()), collaborators);

        Self {
            store,
            processor,
            notifier,
            state,
        }
    }

    /// Route configuration for `App::configure`
    pub fn routes(&self) -> impl FnOnce(&mut web::ServiceConfig) + '_ {
        move |cfg| app::configure(cfg, &self.state)
    }

    pub fn dispatcher(&self) -> &WebhookDispatcher {
        &self.state.dispatcher
    }
}
