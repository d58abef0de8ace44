use crate::core::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// What kind of external reference a ledger key is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    PaymentIntent,
    Payout,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::PaymentIntent => "payment_intent",
            LedgerKind::Payout => "payout",
        }
    }
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LedgerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "payment_intent" => Ok(LedgerKind::PaymentIntent),
            "payout" => Ok(LedgerKind::Payout),
            _ => Err(format!("Invalid ledger kind: {}", s)),
        }
    }
}

impl TryFrom<String> for LedgerKind {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Namespaced idempotency key, e.g. `payment_intent:pi_123`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub kind: LedgerKind,
    pub reference: String,
}

impl LedgerKey {
    pub fn payment_intent(reference: &str) -> Self {
        Self {
            kind: LedgerKind::PaymentIntent,
            reference: reference.to_string(),
        }
    }

    pub fn payout(reference: &str) -> Self {
        Self {
            kind: LedgerKind::Payout,
            reference: reference.to_string(),
        }
    }

    /// Parse the stored `<kind>:<reference>` form
    pub fn parse(raw: &str) -> Result<Self> {
        let (kind, reference) = raw
            .split_once(':')
            .ok_or_else(|| AppError::validation(format!("Invalid idempotency key: {}", raw)))?;
        let kind = kind.parse::<LedgerKind>().map_err(AppError::Validation)?;

        if reference.is_empty() {
            return Err(AppError::validation(format!("Invalid idempotency key: {}", raw)));
        }

        Ok(Self {
            kind,
            reference: reference.to_string(),
        })
    }
}

impl std::fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.reference)
    }
}

/// Processing state of a ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyStatus {
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdempotencyStatus::Processing => write!(f, "processing"),
            IdempotencyStatus::Completed => write!(f, "completed"),
            IdempotencyStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for IdempotencyStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "processing" => Ok(IdempotencyStatus::Processing),
            "completed" => Ok(IdempotencyStatus::Completed),
            "failed" => Ok(IdempotencyStatus::Failed),
            _ => Err(format!("Invalid idempotency status: {}", s)),
        }
    }
}

impl TryFrom<String> for IdempotencyStatus {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// One row of the idempotency ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct IdempotencyRecord {
    pub idempotency_key: String,
    #[sqlx(try_from = "String")]
    pub kind: LedgerKind,
    #[sqlx(try_from = "String")]
    pub status: IdempotencyStatus,
    /// Token of the delivery currently owning the record
    #[serde(skip_serializing)]
    pub claim_token: String,
    /// Raw event body, kept for operator replay
    #[serde(skip_serializing)]
    pub payload: Option<String>,
    /// JSON outcome summary, set once completed
    pub outcome: Option<String>,
    pub last_error: Option<String>,
    pub attempts: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// A fresh record claimed by `claim_token`
    pub fn claimed(key: &LedgerKey, claim_token: &str, payload: &str, now: DateTime<Utc>) -> Self {
        Self {
            idempotency_key: key.to_string(),
            kind: key.kind,
            status: IdempotencyStatus::Processing,
            claim_token: claim_token.to_string(),
            payload: Some(payload.to_string()),
            outcome: None,
            last_error: None,
            attempts: 1,
            started_at: now,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a new delivery may take the record over
    pub fn is_reclaimable(&self, stale_before: DateTime<Utc>) -> bool {
        match self.status {
            IdempotencyStatus::Failed => true,
            IdempotencyStatus::Processing => self.started_at < stale_before,
            IdempotencyStatus::Completed => false,
        }
    }
}
