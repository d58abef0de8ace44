//! Service wiring shared by the binary and the integration tests

use crate::config::Config;
use crate::core::{AppError, MemoryStore, Result};
use crate::middleware::{json_config, path_config, query_config, AdminKeyAuth};
use crate::modules::billing::{
    controllers as billing_controllers, HttpInvoicePublisher, InvoiceNumbering,
    InvoicePublisher, InvoiceSequenceRepository, MySqlInvoiceSequenceRepository,
    MySqlTransactionRepository, NoopInvoicePublisher, ReconciliationService, ScheduleGenerator,
    TransactionRepository,
};
use crate::modules::classes::{ClassRepository, MySqlClassRepository};
use crate::modules::health;
use crate::modules::notifications::{
    HttpNotifier, LogNotifier, NotificationService, Notifier, RetryPolicy,
};
use crate::modules::payouts::{controllers as payout_controllers, PayoutMatcher};
use crate::modules::processor::{BillingCustomerGateway, SettledChargeSource, StripeClient};
use crate::modules::students::repositories::{MySqlEnrollmentRepository, MySqlStudentRepository};
use crate::modules::students::{EnrollmentRepository, PartyResolver, StudentRepository};
use crate::modules::webhooks::{
    controllers as webhook_controllers, DispatcherDeps, IdempotencyLedger, IdempotencyRepository,
    MySqlIdempotencyRepository, SignatureVerifier, WebhookDispatcher,
};
use actix_web::web;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

/// Backing store the repositories were built on
#[derive(Clone)]
pub enum Storage {
    MySql(MySqlPool),
    Memory(Arc<MemoryStore>),
}

impl Storage {
    /// Check that the store can serve queries
    pub async fn ping(&self) -> Result<()> {
        match self {
            Storage::MySql(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            Storage::Memory(_) => Ok(()),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Storage::MySql(_) => "mysql",
            Storage::Memory(_) => "memory",
        }
    }
}

/// Every repository the services depend on
#[derive(Clone)]
pub struct Repositories {
    pub students: Arc<dyn StudentRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub classes: Arc<dyn ClassRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub sequences: Arc<dyn InvoiceSequenceRepository>,
    pub idempotency: Arc<dyn IdempotencyRepository>,
}

impl Repositories {
    pub fn for_storage(storage: &Storage) -> Self {
        match storage {
            Storage::MySql(pool) => Self::mysql(pool.clone()),
            Storage::Memory(store) => Self::memory(store.clone()),
        }
    }

    pub fn mysql(pool: MySqlPool) -> Self {
        Self {
            students: Arc::new(MySqlStudentRepository::new(pool.clone())),
            enrollments: Arc::new(MySqlEnrollmentRepository::new(pool.clone())),
            classes: Arc::new(MySqlClassRepository::new(pool.clone())),
            transactions: Arc::new(MySqlTransactionRepository::new(pool.clone())),
            sequences: Arc::new(MySqlInvoiceSequenceRepository::new(pool.clone())),
            idempotency: Arc::new(MySqlIdempotencyRepository::new(pool)),
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            students: store.clone(),
            enrollments: store.clone(),
            classes: store.clone(),
            transactions: store.clone(),
            sequences: store.clone(),
            idempotency: store,
        }
    }
}

/// Outbound integrations: processor API, notification transport, invoicing sync
#[derive(Clone)]
pub struct Collaborators {
    pub customers: Arc<dyn BillingCustomerGateway>,
    pub charges: Arc<dyn SettledChargeSource>,
    pub notifier: Arc<dyn Notifier>,
    pub invoices: Arc<dyn InvoicePublisher>,
}

impl Collaborators {
    /// Build the production integrations from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let stripe = Arc::new(StripeClient::new(&config.processor)?);

        let notifier: Arc<dyn Notifier> = match &config.notifications.url {
            Some(url) => Arc::new(
                HttpNotifier::new(
                    url.clone(),
                    Duration::from_secs(config.notifications.attempt_timeout_secs),
                )
                .map_err(|e| AppError::Configuration(format!("Notification client: {}", e)))?,
            ),
            None => Arc::new(LogNotifier),
        };

        let invoices: Arc<dyn InvoicePublisher> = match &config.invoicing.sync_url {
            Some(url) => Arc::new(HttpInvoicePublisher::new(
                url.clone(),
                Duration::from_secs(config.invoicing.sync_timeout_secs),
            )?),
            None => Arc::new(NoopInvoicePublisher),
        };

        Ok(Self {
            customers: stripe.clone(),
            charges: stripe,
            notifier,
            invoices,
        })
    }
}

/// Shared application state handed to every worker
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub payouts: Arc<PayoutMatcher>,
    pub reconciliation: Arc<ReconciliationService>,
    pub admin_key_hash: Option<String>,
}

impl AppState {
    pub fn build(config: &Config, storage: Storage, collaborators: Collaborators) -> Self {
        let repos = Repositories::for_storage(&storage);
        let call_timeout = Duration::from_secs(config.processor.request_timeout_secs);

        let numbering = InvoiceNumbering::new(repos.sequences.clone(), config.invoicing.number_floor);
        let schedules = ScheduleGenerator::new(
            repos.enrollments.clone(),
            repos.transactions.clone(),
            numbering,
        );
        let payouts = PayoutMatcher::new(
            repos.transactions.clone(),
            collaborators.charges.clone(),
            config.processor.payout_page_size,
            config.processor.payout_max_pages,
        );
        let notifications = NotificationService::new(
            collaborators.notifier.clone(),
            RetryPolicy::new(
                config.notifications.max_attempts,
                Duration::from_millis(config.notifications.base_delay_ms),
                Duration::from_secs(config.notifications.attempt_timeout_secs),
            ),
            config.notifications.ops_alert_recipient.clone(),
        );

        let dispatcher = WebhookDispatcher::new(DispatcherDeps {
            verifier: SignatureVerifier::new(
                config.processor.webhook_secret.clone(),
                config.processor.signature_tolerance_secs,
            ),
            ledger: IdempotencyLedger::new(
                repos.idempotency.clone(),
                config.webhooks.stale_claim_minutes,
            ),
            resolver: PartyResolver::new(
                repos.students.clone(),
                collaborators.customers.clone(),
                call_timeout,
            ),
            classes: repos.classes.clone(),
            schedules,
            payouts: payouts.clone(),
            notifications,
            invoices: collaborators.invoices.clone(),
            processing_timeout: Duration::from_secs(config.webhooks.processing_timeout_secs),
        });

        Self {
            storage,
            dispatcher: Arc::new(dispatcher),
            payouts: Arc::new(payouts),
            reconciliation: Arc::new(ReconciliationService::new(repos.transactions)),
            admin_key_hash: config.security.admin_api_key_hash.clone(),
        }
    }
}

/// Register every route and its shared data
///
/// `/webhooks` is public and authenticated by signature, `/admin` requires the
/// operator API key.
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(web::Data::new(state.storage.clone()))
        .app_data(web::Data::new(state.dispatcher.clone()))
        .app_data(web::Data::new(state.payouts.clone()))
        .app_data(web::Data::new(state.reconciliation.clone()))
        .app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .configure(health::configure)
        .configure(webhook_controllers::configure)
        .service(
            web::scope("/admin")
                .wrap(AdminKeyAuth::new(state.admin_key_hash.clone()))
                .configure(webhook_controllers::configure_admin)
                .configure(payout_controllers::configure)
                .configure(billing_controllers::configure),
        );
}
