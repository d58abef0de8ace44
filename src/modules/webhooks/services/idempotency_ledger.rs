use super::super::models::{IdempotencyRecord, IdempotencyStatus, LedgerKey};
use super::super::repositories::IdempotencyRepository;
use crate::core::{AppError, Result};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ownership of a ledger record for the current delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub key: String,
    pub token: String,
}

/// Result of `check_and_reserve`
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// This delivery owns the key and must process the event
    Reserved(Claim),
    /// The event was already handled; carries the stored outcome
    AlreadyProcessed(Value),
    /// Another delivery is processing the same key right now
    InProgress,
}

/// Detects duplicate delivery of payment events
///
/// Arbitration happens in storage: the claim is a single insert-or-reclaim
/// statement against the unique key, and ownership is decided by comparing
/// the stored claim token with the one this delivery generated.
#[derive(Clone)]
pub struct IdempotencyLedger {
    records: Arc<dyn IdempotencyRepository>,
    stale_after: Duration,
}

impl IdempotencyLedger {
    pub fn new(records: Arc<dyn IdempotencyRepository>, stale_after_minutes: i64) -> Self {
        Self {
            records,
            stale_after: Duration::minutes(stale_after_minutes),
        }
    }

    /// Claim `key` for this delivery unless it was already handled
    ///
    /// # Arguments
    /// * `key` - Namespaced external reference
    /// * `payload` - Raw event body, stored for operator replay
    pub async fn check_and_reserve(&self, key: &LedgerKey, payload: &str) -> Result<Reservation> {
        let token = uuid::Uuid::new_v4().to_string();
        let stale_before = Utc::now() - self.stale_after;

        let record = self.records.claim(key, &token, payload, stale_before).await?;

        if record.claim_token == token {
            if record.attempts > 1 {
                info!(key = %key, attempts = record.attempts, "Reclaimed idempotency record");
            }
            return Ok(Reservation::Reserved(Claim {
                key: record.idempotency_key,
                token,
            }));
        }

        match record.status {
            IdempotencyStatus::Completed => {
                debug!(key = %key, "Duplicate delivery, returning stored outcome");
                Ok(Reservation::AlreadyProcessed(stored_outcome(&record)?))
            }
            IdempotencyStatus::Processing => Ok(Reservation::InProgress),
            // A failed record is always reclaimed by the statement above
            IdempotencyStatus::Failed => Err(AppError::internal(format!(
                "Idempotency record {} is failed but could not be reclaimed",
                key
            ))),
        }
    }

    /// Store the outcome of a successful run
    pub async fn record_outcome(&self, claim: &Claim, outcome: &Value) -> Result<()> {
        let serialized = serde_json::to_string(outcome)?;
        if !self
            .records
            .complete(&claim.key, &claim.token, &serialized)
            .await?
        {
            warn!(key = %claim.key, "Claim lost before outcome was recorded");
        }
        Ok(())
    }

    /// Release the claim so a retry or replay can take the key again
    pub async fn record_failure(&self, claim: &Claim, error: &str) -> Result<()> {
        if !self.records.fail(&claim.key, &claim.token, error).await? {
            warn!(key = %claim.key, "Claim lost before failure was recorded");
        }
        Ok(())
    }

    pub async fn find(&self, key: &LedgerKey) -> Result<Option<IdempotencyRecord>> {
        self.records.find(&key.to_string()).await
    }

    pub async fn list(&self, status: IdempotencyStatus, limit: u32) -> Result<Vec<IdempotencyRecord>> {
        self.records.list_by_status(status, limit).await
    }
}

/// Parse the outcome stored on a completed record
pub fn stored_outcome(record: &IdempotencyRecord) -> Result<Value> {
    match record.outcome.as_deref() {
        Some(raw) => Ok(serde_json::from_str(raw)?),
        None => Ok(Value::Null),
    }
}
