use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of billing line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    RegistrationFee,
    TuitionA,
    TuitionB,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::RegistrationFee => write!(f, "registration_fee"),
            TransactionType::TuitionA => write!(f, "tuition_a"),
            TransactionType::TuitionB => write!(f, "tuition_b"),
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "registration_fee" => Ok(TransactionType::RegistrationFee),
            "tuition_a" => Ok(TransactionType::TuitionA),
            "tuition_b" => Ok(TransactionType::TuitionB),
            _ => Err(format!("Invalid transaction type: {}", s)),
        }
    }
}

impl TryFrom<String> for TransactionType {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Installment not yet paid
    Pending,

    /// Money received
    Paid,

    /// Obligation withdrawn by an administrator
    Cancelled,

    /// Payment returned to the student
    Refunded,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Pending
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Paid => write!(f, "paid"),
            TransactionStatus::Cancelled => write!(f, "cancelled"),
            TransactionStatus::Refunded => write!(f, "refunded"),
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "paid" => Ok(TransactionStatus::Paid),
            "cancelled" => Ok(TransactionStatus::Cancelled),
            "refunded" => Ok(TransactionStatus::Refunded),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Where a transaction stands against bank payouts
///
/// Moves only forward: unlinked -> linked -> reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutState {
    Unlinked,
    Linked,
    Reconciled,
}

/// Billing obligation or receipt tied to an enrollment
///
/// Created once per schedule generation. Afterwards only payout matching,
/// manual reconciliation and administrative status overrides touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: String,
    pub enrollment_id: String,
    pub class_id: String,
    pub student_id: String,
    #[sqlx(try_from = "String")]
    pub transaction_type: TransactionType,
    /// Fractional multiplier, 0.5 for a half installment
    pub quantity: Decimal,
    /// Minor currency units
    pub amount_due: i64,
    pub amount_paid: Option<i64>,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub due_date: Option<NaiveDate>,
    pub payment_date: Option<DateTime<Utc>>,
    /// Processor payment intent id, unique when present
    pub payment_reference: Option<String>,
    pub invoice_number: i64,
    pub payout_id: Option<String>,
    pub payout_date: Option<NaiveDate>,
    pub reconciled: bool,
    pub reconciliation_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn payout_state(&self) -> PayoutState {
        if self.reconciled {
            PayoutState::Reconciled
        } else if self.payout_id.is_some() {
            PayoutState::Linked
        } else {
            PayoutState::Unlinked
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == TransactionStatus::Paid
    }
}
