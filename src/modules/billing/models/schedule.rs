use super::transaction::{Transaction, TransactionStatus, TransactionType};
use crate::modules::classes::{ClassOffering, ProductType};
use crate::modules::students::Enrollment;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Days before class start when the first tuition installment falls due
pub const TUITION_A_DAYS_BEFORE_START: i64 = 21;

/// Days after class start when the second tuition installment falls due
pub const TUITION_B_DAYS_AFTER_START: i64 = 7;

/// The charge that triggered schedule generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeDetails {
    /// Processor payment intent id
    pub payment_reference: String,
    /// Amount actually charged, minor units
    pub amount_charged: i64,
    pub paid_at: DateTime<Utc>,
}

/// One billing line before it is numbered and persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub amount_due: i64,
    pub amount_paid: Option<i64>,
    pub status: TransactionStatus,
    pub due_date: Option<NaiveDate>,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
}

impl TransactionDraft {
    /// The paid registration fee line shared by every schedule
    fn registration_fee(class: &ClassOffering, charge: &ChargeDetails) -> Self {
        Self {
            transaction_type: TransactionType::RegistrationFee,
            quantity: Decimal::ONE,
            amount_due: class.registration_fee,
            amount_paid: Some(charge.amount_charged),
            status: TransactionStatus::Paid,
            due_date: None,
            payment_date: Some(charge.paid_at),
            payment_reference: Some(charge.payment_reference.clone()),
        }
    }

    /// A pending half-installment of the program price
    fn tuition(transaction_type: TransactionType, class: &ClassOffering, due_date: Option<NaiveDate>) -> Self {
        Self {
            transaction_type,
            quantity: Decimal::new(5, 1),
            amount_due: class.price,
            amount_paid: None,
            status: TransactionStatus::Pending,
            due_date,
            payment_date: None,
            payment_reference: None,
        }
    }

    /// Materialize the draft as a transaction row for `enrollment`
    pub fn into_transaction(self, enrollment: &Enrollment, invoice_number: i64) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            enrollment_id: enrollment.id.clone(),
            class_id: enrollment.class_id.clone(),
            student_id: enrollment.student_id.clone(),
            transaction_type: self.transaction_type,
            quantity: self.quantity,
            amount_due: self.amount_due,
            amount_paid: self.amount_paid,
            status: self.status,
            due_date: self.due_date,
            payment_date: self.payment_date,
            payment_reference: self.payment_reference,
            invoice_number,
            payout_id: None,
            payout_date: None,
            reconciled: false,
            reconciliation_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Which schedule shape a class gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Course,
    Program,
}

impl ScheduleKind {
    /// Transactions one generation of this schedule writes
    pub fn line_count(self) -> usize {
        match self {
            ScheduleKind::Course => 1,
            ScheduleKind::Program => 3,
        }
    }
}

/// Billing schedule for one enrollment
///
/// Lines are kept in invoice order: registration fee first, then tuition A,
/// then tuition B.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingSchedule {
    Course {
        registration_fee: TransactionDraft,
    },
    Program {
        registration_fee: TransactionDraft,
        tuition_a: TransactionDraft,
        tuition_b: TransactionDraft,
    },
}

impl BillingSchedule {
    /// Schedule shape for a class
    ///
    /// Classes with a missing or unrecognized product type are billed as a
    /// single-payment course.
    pub fn kind_for(class: &ClassOffering) -> ScheduleKind {
        match class.product_type() {
            Some(ProductType::Program) => ScheduleKind::Program,
            Some(ProductType::Course) => ScheduleKind::Course,
            None => {
                tracing::warn!(
                    class_id = %class.id,
                    product_type = ?class.product_type,
                    "Unknown product type, billing as single-payment course"
                );
                ScheduleKind::Course
            }
        }
    }

    /// Lay out the schedule for `class` given the charge that paid the registration fee
    pub fn plan(class: &ClassOffering, charge: &ChargeDetails) -> Self {
        let registration_fee = TransactionDraft::registration_fee(class, charge);

        match Self::kind_for(class) {
            ScheduleKind::Course => BillingSchedule::Course { registration_fee },
            ScheduleKind::Program => {
                let (due_a, due_b) = tuition_due_dates(class.start_date);
                BillingSchedule::Program {
                    registration_fee,
                    tuition_a: TransactionDraft::tuition(TransactionType::TuitionA, class, due_a),
                    tuition_b: TransactionDraft::tuition(TransactionType::TuitionB, class, due_b),
                }
            }
        }
    }

    pub fn kind(&self) -> ScheduleKind {
        match self {
            BillingSchedule::Course { .. } => ScheduleKind::Course,
            BillingSchedule::Program { .. } => ScheduleKind::Program,
        }
    }

    /// Drafts in invoice order
    pub fn into_drafts(self) -> Vec<TransactionDraft> {
        match self {
            BillingSchedule::Course { registration_fee } => vec![registration_fee],
            BillingSchedule::Program {
                registration_fee,
                tuition_a,
                tuition_b,
            } => vec![registration_fee, tuition_a, tuition_b],
        }
    }
}

/// Due dates for the two tuition installments, `None` when the start date is unknown
pub fn tuition_due_dates(start_date: Option<NaiveDate>) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match start_date {
        Some(start) => (
            start.checked_sub_signed(Duration::days(TUITION_A_DAYS_BEFORE_START)),
            start.checked_add_signed(Duration::days(TUITION_B_DAYS_AFTER_START)),
        ),
        None => (None, None),
    }
}
