use super::super::models::{
    EnrollmentEvent, EventEnvelope, IdempotencyStatus, LedgerKey, PayoutEvent, RoutedEvent,
};
use super::idempotency_ledger::{stored_outcome, Claim, IdempotencyLedger, Reservation};
use super::signature::SignatureVerifier;
use crate::core::{AppError, Result};
use crate::modules::billing::{
    ChargeDetails, GeneratedSchedule, InvoicePublisher, ScheduleGenerator, ScheduleKind,
    Transaction,
};
use crate::modules::classes::ClassRepository;
use crate::modules::notifications::models::{ENROLLMENT_CONFIRMATION, PAYOUT_RECONCILED};
use crate::modules::notifications::{Notification, NotificationService};
use crate::modules::payouts::{PayoutMatcher, PayoutOutcome};
use crate::modules::students::{Enrollment, PartyResolver, PaymentContext};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How an authenticated event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// Handled now or earlier; `result` carries the outcome
    Processed,
    /// Another delivery of the same event is being handled
    InProgress,
    /// Business processing failed or timed out and awaits manual follow-up
    Deferred,
    /// Event type or state the engine does not act on
    Ignored,
}

/// Body returned to the processor for every authenticated event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub received: bool,
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Answered from the idempotency ledger without reprocessing
    #[serde(skip)]
    pub replayed: bool,
}

impl Acknowledgement {
    fn processed(result: Value, replayed: bool) -> Self {
        Self {
            received: true,
            status: AckStatus::Processed,
            result: Some(result),
            reason: None,
            replayed,
        }
    }

    fn with_reason(status: AckStatus, reason: impl Into<String>) -> Self {
        Self {
            received: true,
            status,
            result: None,
            reason: Some(reason.into()),
            replayed: false,
        }
    }
}

/// Summary stored for a processed enrollment event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentOutcome {
    pub student_id: String,
    pub email: String,
    pub billing_customer_ref: Option<String>,
    pub enrollment: Enrollment,
    pub schedule: ScheduleKind,
    pub transactions: Vec<Transaction>,
}

/// Collaborators of the dispatcher
pub struct DispatcherDeps {
    pub verifier: SignatureVerifier,
    pub ledger: IdempotencyLedger,
    pub resolver: PartyResolver,
    pub classes: Arc<dyn ClassRepository>,
    pub schedules: ScheduleGenerator,
    pub payouts: PayoutMatcher,
    pub notifications: NotificationService,
    pub invoices: Arc<dyn InvoicePublisher>,
    pub processing_timeout: Duration,
}

/// Verifies, classifies and routes processor events
///
/// Every authenticated event is acknowledged with 200 except when storage
/// fails or a payout scan aborts; those return an error so the processor
/// retries, which the idempotency ledger makes safe.
pub struct WebhookDispatcher {
    verifier: SignatureVerifier,
    ledger: IdempotencyLedger,
    resolver: PartyResolver,
    classes: Arc<dyn ClassRepository>,
    schedules: ScheduleGenerator,
    payouts: PayoutMatcher,
    notifications: NotificationService,
    invoices: Arc<dyn InvoicePublisher>,
    processing_timeout: Duration,
}

impl WebhookDispatcher {
    pub fn new(deps: DispatcherDeps) -> Self {
        Self {
            verifier: deps.verifier,
            ledger: deps.ledger,
            resolver: deps.resolver,
            classes: deps.classes,
            schedules: deps.schedules,
            payouts: deps.payouts,
            notifications: deps.notifications,
            invoices: deps.invoices,
            processing_timeout: deps.processing_timeout,
        }
    }

    pub fn ledger(&self) -> &IdempotencyLedger {
        &self.ledger
    }

    /// Entry point for a signed delivery
    ///
    /// # Arguments
    /// * `signature` - Value of the signature header, if present
    /// * `body` - Raw request body, exactly as received
    ///
    /// # Errors
    /// * `AppError::Authentication` - Signature missing or invalid, nothing was touched
    /// * `AppError::Json` / `AppError::Validation` - Malformed event
    /// * `AppError::Database` / `AppError::ReconciliationAbort` - Retry invited
    pub async fn handle(&self, signature: Option<&str>, body: &[u8]) -> Result<Acknowledgement> {
        self.verifier.verify(signature, body)?;
        self.dispatch(body).await
    }

    /// Route an already authenticated event body
    pub async fn dispatch(&self, body: &[u8]) -> Result<Acknowledgement> {
        let envelope: EventEnvelope = serde_json::from_slice(body)?;
        let payload = std::str::from_utf8(body)
            .map_err(|_| AppError::validation("Event body is not valid UTF-8"))?;

        match envelope.route()? {
            RoutedEvent::Ignored { event_type, reason } => {
                info!(event_id = %envelope.id, %event_type, %reason, "Event ignored");
                Ok(Acknowledgement::with_reason(AckStatus::Ignored, reason))
            }
            RoutedEvent::Enrollment(event) => {
                let key = LedgerKey::payment_intent(&event.payment_reference);
                self.run_once(&key, payload, self.enroll(&event)).await
            }
            RoutedEvent::Payout(event) => {
                let key = LedgerKey::payout(&event.payout_id);
                self.run_once(&key, payload, self.reconcile_payout(&event)).await
            }
        }
    }

    /// Re-run a stored event that failed or stalled
    ///
    /// Completed events answer with their stored outcome.
    pub async fn replay(&self, raw_key: &str) -> Result<Acknowledgement> {
        let key = LedgerKey::parse(raw_key)?;
        let record = self
            .ledger
            .find(&key)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Webhook event {}", key)))?;

        if record.status == IdempotencyStatus::Completed {
            return Ok(Acknowledgement::processed(stored_outcome(&record)?, true));
        }

        let payload = record
            .payload
            .ok_or_else(|| AppError::validation(format!("No payload stored for {}", key)))?;

        info!(key = %key, status = %record.status, "Replaying webhook event");
        self.dispatch(payload.as_bytes()).await
    }

    /// Run `work` at most once per key
    async fn run_once<F>(&self, key: &LedgerKey, payload: &str, work: F) -> Result<Acknowledgement>
    where
        F: Future<Output = Result<Value>>,
    {
        let claim = match self.ledger.check_and_reserve(key, payload).await? {
            Reservation::Reserved(claim) => claim,
            Reservation::AlreadyProcessed(outcome) => {
                info!(key = %key, "Duplicate delivery acknowledged with stored outcome");
                return Ok(Acknowledgement::processed(outcome, true));
            }
            Reservation::InProgress => {
                info!(key = %key, "Event already being processed by another delivery");
                return Ok(Acknowledgement::with_reason(
                    AckStatus::InProgress,
                    "event is being processed",
                ));
            }
        };

        let failure = match tokio::time::timeout(self.processing_timeout, work).await {
            Ok(Ok(outcome)) => {
                if let Err(e) = self.ledger.record_outcome(&claim, &outcome).await {
                    self.release(&claim, &e.to_string()).await;
                    return Err(e);
                }
                return Ok(Acknowledgement::processed(outcome, false));
            }
            Ok(Err(e)) => e,
            Err(_) => AppError::downstream(format!(
                "Processing exceeded {}s",
                self.processing_timeout.as_secs()
            )),
        };

        warn!(key = %key, error = %failure, "Webhook processing failed");
        self.release(&claim, &failure.to_string()).await;

        if failure.is_retryable_by_processor() {
            return Err(failure);
        }

        self.notifications.alert_deferred(&claim.key, &failure.to_string());
        Ok(Acknowledgement::with_reason(AckStatus::Deferred, failure.to_string()))
    }

    async fn release(&self, claim: &Claim, reason: &str) {
        if let Err(e) = self.ledger.record_failure(claim, reason).await {
            error!(key = %claim.key, error = %e, "Could not mark idempotency record failed");
        }
    }

    /// Enrollment path: resolve the student, then enroll and bill
    async fn enroll(&self, event: &EnrollmentEvent) -> Result<Value> {
        let class = self
            .classes
            .find_by_id(&event.class_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Class {}", event.class_id)))?;

        let student = self.resolver.resolve(&event.email, event.name.clone()).await?;
        let context = PaymentContext {
            payment_reference: Some(event.payment_reference.clone()),
            processor_customer_ref: event.processor_customer_ref.clone(),
        };
        let billing_customer_ref = self
            .resolver
            .ensure_billing_customer(&student, &event.email, &context)
            .await;

        let charge = ChargeDetails {
            payment_reference: event.payment_reference.clone(),
            amount_charged: event.amount_charged,
            paid_at: Utc::now(),
        };
        let schedule = self.schedules.generate(&student, &class, &charge).await?;

        if schedule.created {
            self.after_enrollment(&student.email, &class.name, &schedule);
        }

        let outcome = EnrollmentOutcome {
            student_id: student.id,
            email: student.email,
            billing_customer_ref,
            enrollment: schedule.enrollment,
            schedule: schedule.kind,
            transactions: schedule.transactions,
        };

        Ok(serde_json::to_value(outcome)?)
    }

    /// Confirmation email and invoicing sync, both off the request path
    fn after_enrollment(&self, email: &str, class_name: &str, schedule: &GeneratedSchedule) {
        self.notifications.spawn(Notification::new(
            email,
            ENROLLMENT_CONFIRMATION,
            json!({
                "class_name": class_name,
                "enrollment_id": schedule.enrollment.id,
                "invoice_numbers": schedule
                    .transactions
                    .iter()
                    .map(|t| t.invoice_number)
                    .collect::<Vec<_>>(),
            }),
            "enrollment",
        ));

        let invoices = self.invoices.clone();
        let enrollment = schedule.enrollment.clone();
        let transactions = schedule.transactions.clone();
        tokio::spawn(async move {
            if let Err(e) = invoices.publish(&enrollment, &transactions).await {
                warn!(
                    enrollment_id = %enrollment.id,
                    error = %e,
                    "Invoicing sync failed"
                );
            }
        });
    }

    /// Payout path
    async fn reconcile_payout(&self, event: &PayoutEvent) -> Result<Value> {
        let outcome: PayoutOutcome = self
            .payouts
            .reconcile(&event.payout_id, event.arrival_date)
            .await?;

        if !outcome.already_linked && outcome.matched_count > 0 {
            if let Some(recipient) = self.notifications.ops_recipient() {
                self.notifications.spawn(Notification::new(
                    recipient,
                    PAYOUT_RECONCILED,
                    json!({
                        "payout_id": outcome.payout_id,
                        "arrival_date": event.arrival_date,
                        "matched_count": outcome.matched_count,
                    }),
                    "ops",
                ));
            }
        }

        Ok(serde_json::to_value(outcome)?)
    }
}
