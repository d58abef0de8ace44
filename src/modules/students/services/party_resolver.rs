use super::super::models::{clean_name, normalize_email, Student};
use super::super::repositories::StudentRepository;
use crate::core::{AppError, Result};
use crate::modules::processor::{BillingCustomerGateway, CustomerRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Payment details available when attaching a billing customer
#[derive(Debug, Clone, Default)]
pub struct PaymentContext {
    /// Payment intent that triggered enrollment
    pub payment_reference: Option<String>,
    /// Customer id already created by the processor during checkout, if any
    pub processor_customer_ref: Option<String>,
}

/// Maps an email address to the canonical student record
///
/// Concurrent resolution of the same email is arbitrated by the unique index
/// on the stored email: an insert conflict means another request created the
/// student first, so the lookup is retried.
#[derive(Clone)]
pub struct PartyResolver {
    students: Arc<dyn StudentRepository>,
    customers: Arc<dyn BillingCustomerGateway>,
    call_timeout: Duration,
}

impl PartyResolver {
    pub fn new(
        students: Arc<dyn StudentRepository>,
        customers: Arc<dyn BillingCustomerGateway>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            students,
            customers,
            call_timeout,
        }
    }

    /// Find or create the student for `email`
    ///
    /// # Arguments
    /// * `email` - Raw email from the payment event
    /// * `name` - Display name from the payment event, used to fill a missing name
    ///
    /// # Returns
    /// * `Result<Student>` - Existing or newly created student
    pub async fn resolve(&self, email: &str, name: Option<String>) -> Result<Student> {
        let email = normalize_email(email)?;
        let name = clean_name(name);

        if let Some(existing) = self.students.find_by_email(&email).await? {
            return self.fill_missing_name(existing, name).await;
        }

        let candidate = Student::new(&email, name.clone())?;
        match self.students.insert(&candidate).await {
            Ok(student) => {
                info!(student_id = %student.id, email = %student.email, "Student created");
                Ok(student)
            }
            Err(AppError::Conflict(_)) => {
                // Lost the race to a concurrent delivery; the row exists now
                let existing = self
                    .students
                    .find_by_email(&email)
                    .await?
                    .ok_or_else(|| {
                        AppError::internal(format!(
                            "Student '{}' conflicted on insert but cannot be found",
                            email
                        ))
                    })?;
                self.fill_missing_name(existing, name).await
            }
            Err(e) => Err(e),
        }
    }

    async fn fill_missing_name(&self, mut student: Student, name: Option<String>) -> Result<Student> {
        if student.name.is_none() {
            if let Some(name) = name {
                self.students.fill_name(&student.id, &name).await?;
                student.name = Some(name);
            }
        }
        Ok(student)
    }

    /// Make sure the student carries a processor billing-customer reference
    ///
    /// Never fails: an unreachable processor is logged and enrollment carries on
    /// without the reference.
    ///
    /// # Returns
    /// * `Option<String>` - The reference attached to the student, if any
    pub async fn ensure_billing_customer(
        &self,
        student: &Student,
        email: &str,
        context: &PaymentContext,
    ) -> Option<String> {
        if let Some(existing) = &student.billing_customer_ref {
            return Some(existing.clone());
        }

        let customer_ref = match &context.processor_customer_ref {
            Some(reference) => reference.clone(),
            None => match self.create_customer(student, email, context).await {
                Ok(reference) => reference,
                Err(e) => {
                    warn!(
                        student_id = %student.id,
                        gateway = self.customers.name(),
                        error = %e,
                        "Billing customer creation failed, continuing without it"
                    );
                    return None;
                }
            },
        };

        match self
            .students
            .attach_billing_customer(&student.id, &customer_ref)
            .await
        {
            Ok(true) => {
                info!(
                    student_id = %student.id,
                    customer_ref = %customer_ref,
                    "Billing customer attached"
                );
                Some(customer_ref)
            }
            Ok(false) => {
                // Another delivery attached one first; keep theirs
                self.students
                    .find_by_id(&student.id)
                    .await
                    .ok()
                    .flatten()
                    .and_then(|s| s.billing_customer_ref)
            }
            Err(e) => {
                warn!(
                    student_id = %student.id,
                    error = %e,
                    "Failed to store billing customer reference"
                );
                None
            }
        }
    }

    async fn create_customer(
        &self,
        student: &Student,
        email: &str,
        context: &PaymentContext,
    ) -> Result<String> {
        let request = CustomerRequest {
            student_id: student.id.clone(),
            email: normalize_email(email).unwrap_or_else(|_| student.email.clone()),
            name: student.name.clone(),
            payment_reference: context.payment_reference.clone(),
        };

        tokio::time::timeout(self.call_timeout, self.customers.create_customer(&request))
            .await
            .map_err(|_| {
                AppError::downstream(format!(
                    "Billing customer creation timed out after {:?}",
                    self.call_timeout
                ))
            })?
    }
}
