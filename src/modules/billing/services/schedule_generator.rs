use super::super::models::{BillingSchedule, ChargeDetails, ScheduleKind, Transaction};
use super::super::repositories::TransactionRepository;
use super::invoice_numbering::InvoiceNumbering;
use crate::core::{AppError, Result};
use crate::modules::classes::ClassOffering;
use crate::modules::students::{Enrollment, EnrollmentRepository, Student};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one schedule generation
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSchedule {
    pub enrollment: Enrollment,
    pub kind: ScheduleKind,
    /// Transactions in invoice order
    pub transactions: Vec<Transaction>,
    /// False when the schedule for this payment already existed
    pub created: bool,
}

/// Turns a paid registration into an enrollment and its billing schedule
#[derive(Clone)]
pub struct ScheduleGenerator {
    enrollments: Arc<dyn EnrollmentRepository>,
    transactions: Arc<dyn TransactionRepository>,
    numbering: InvoiceNumbering,
}

impl ScheduleGenerator {
    pub fn new(
        enrollments: Arc<dyn EnrollmentRepository>,
        transactions: Arc<dyn TransactionRepository>,
        numbering: InvoiceNumbering,
    ) -> Self {
        Self {
            enrollments,
            transactions,
            numbering,
        }
    }

    /// Find or create the enrollment of `student` in `class_id`
    pub async fn enroll(&self, student: &Student, class_id: &str) -> Result<Enrollment> {
        if let Some(existing) = self
            .enrollments
            .find_by_student_and_class(&student.id, class_id)
            .await?
        {
            return Ok(existing);
        }

        let candidate = Enrollment::new(&student.id, class_id);
        match self.enrollments.insert(&candidate).await {
            Ok(enrollment) => {
                info!(
                    enrollment_id = %enrollment.id,
                    student_id = %student.id,
                    class_id,
                    "Enrollment created"
                );
                Ok(enrollment)
            }
            Err(AppError::Conflict(_)) => self
                .enrollments
                .find_by_student_and_class(&student.id, class_id)
                .await?
                .ok_or_else(|| {
                    AppError::internal(format!(
                        "Enrollment for student {} in class {} conflicted but cannot be found",
                        student.id, class_id
                    ))
                }),
            Err(e) => Err(e),
        }
    }

    /// Enroll the student and persist the billing schedule for `class`
    ///
    /// # Arguments
    /// * `student` - Resolved student
    /// * `class` - Class the student paid for
    /// * `charge` - The charge that paid the registration fee
    ///
    /// # Returns
    /// * `Result<GeneratedSchedule>` - The enrollment and its transactions
    ///
    /// When a transaction for the same payment reference already exists the
    /// stored schedule is returned and nothing is written.
    pub async fn generate(
        &self,
        student: &Student,
        class: &ClassOffering,
        charge: &ChargeDetails,
    ) -> Result<GeneratedSchedule> {
        let enrollment = self.enroll(student, &class.id).await?;

        if let Some(existing) = self.existing_schedule(class, &charge.payment_reference).await? {
            info!(
                payment_reference = %charge.payment_reference,
                "Schedule already recorded for payment, reusing it"
            );
            return Ok(existing);
        }

        let schedule = BillingSchedule::plan(class, charge);
        let kind = schedule.kind();
        let drafts = schedule.into_drafts();
        let numbers = self.numbering.next_n(drafts.len()).await?;

        let transactions: Vec<Transaction> = drafts
            .into_iter()
            .zip(numbers)
            .map(|(draft, number)| draft.into_transaction(&enrollment, number))
            .collect();

        match self.transactions.insert_schedule(&transactions).await {
            Ok(()) => {}
            Err(AppError::Conflict(msg)) => {
                // A concurrent delivery persisted the same payment first
                warn!(
                    payment_reference = %charge.payment_reference,
                    error = %msg,
                    "Schedule insert conflicted"
                );
                return self
                    .existing_schedule(class, &charge.payment_reference)
                    .await?
                    .ok_or(AppError::Conflict(msg));
            }
            Err(e) => return Err(e),
        }

        info!(
            enrollment_id = %enrollment.id,
            class_id = %class.id,
            kind = ?kind,
            count = transactions.len(),
            first_invoice = transactions.first().map(|t| t.invoice_number),
            "Billing schedule created"
        );

        Ok(GeneratedSchedule {
            enrollment,
            kind,
            transactions,
            created: true,
        })
    }

    /// The schedule written by the generation that recorded `payment_reference`
    ///
    /// One generation owns one contiguous invoice block starting at its
    /// registration fee, so only rows inside that block belong to it. Other
    /// payments for the same enrollment are left out.
    async fn existing_schedule(
        &self,
        class: &ClassOffering,
        payment_reference: &str,
    ) -> Result<Option<GeneratedSchedule>> {
        let anchor = match self
            .transactions
            .find_by_payment_reference(payment_reference)
            .await?
        {
            Some(transaction) => transaction,
            None => return Ok(None),
        };

        let enrollment = self
            .enrollments
            .find_by_id(&anchor.enrollment_id)
            .await?
            .ok_or_else(|| {
                AppError::internal(format!(
                    "Transaction {} references missing enrollment {}",
                    anchor.id, anchor.enrollment_id
                ))
            })?;

        let kind = BillingSchedule::kind_for(class);
        let block = anchor.invoice_number..anchor.invoice_number + kind.line_count() as i64;

        let mut transactions: Vec<Transaction> = self
            .transactions
            .find_by_enrollment(&enrollment.id)
            .await?
            .into_iter()
            .filter(|t| block.contains(&t.invoice_number))
            .collect();
        transactions.sort_by_key(|t| t.invoice_number);

        Ok(Some(GeneratedSchedule {
            enrollment,
            kind,
            transactions,
            created: false,
        }))
    }
}
