//! In-process storage implementing every repository trait
//!
//! Enforces the same uniqueness rules as the MySQL schema (student email,
//! enrollment per student and class, payment reference, invoice number,
//! idempotency key) so the services behave identically on both backends.
//! Each operation holds the lock for its whole duration, which gives the
//! same atomicity the SQL statements have.

use crate::core::{AppError, Result};
use crate::modules::billing::{
    InvoiceSequenceRepository, Transaction, TransactionRepository, TransactionStatus,
};
use crate::modules::classes::{ClassOffering, ClassRepository};
use crate::modules::students::{Enrollment, EnrollmentRepository, Student, StudentRepository};
use crate::modules::webhooks::{
    IdempotencyRecord, IdempotencyRepository, IdempotencyStatus, LedgerKey,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    students: Vec<Student>,
    enrollments: Vec<Enrollment>,
    classes: HashMap<String, ClassOffering>,
    transactions: Vec<Transaction>,
    invoice_next: Option<i64>,
    idempotency: HashMap<String, IdempotencyRecord>,
}

/// Shared in-memory backend
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::internal("Memory store lock poisoned"))
    }

    /// Add or replace a class in the catalog
    pub fn add_class(&self, class: ClassOffering) {
        if let Ok(mut tables) = self.lock() {
            tables.classes.insert(class.id.clone(), class);
        }
    }

    pub fn student_count(&self) -> usize {
        self.lock().map(|t| t.students.len()).unwrap_or(0)
    }

    pub fn enrollment_count(&self) -> usize {
        self.lock().map(|t| t.enrollments.len()).unwrap_or(0)
    }

    pub fn transaction_count(&self) -> usize {
        self.lock().map(|t| t.transactions.len()).unwrap_or(0)
    }

    /// Snapshot of all transactions ordered by invoice number
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut all = self
            .lock()
            .map(|t| t.transactions.clone())
            .unwrap_or_default();
        all.sort_by_key(|t| t.invoice_number);
        all
    }

    pub fn students(&self) -> Vec<Student> {
        self.lock().map(|t| t.students.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StudentRepository for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Student>> {
        Ok(self.lock()?.students.iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Student>> {
        Ok(self
            .lock()?
            .students
            .iter()
            .find(|s| s.email == email)
            .cloned())
    }

    async fn insert(&self, student: &Student) -> Result<Student> {
        let mut tables = self.lock()?;
        if tables.students.iter().any(|s| s.email == student.email) {
            return Err(AppError::conflict(format!(
                "Student '{}' already exists",
                student.email
            )));
        }
        tables.students.push(student.clone());
        Ok(student.clone())
    }

    async fn attach_billing_customer(&self, id: &str, customer_ref: &str) -> Result<bool> {
        let mut tables = self.lock()?;
        match tables
            .students
            .iter_mut()
            .find(|s| s.id == id && s.billing_customer_ref.is_none())
        {
            Some(student) => {
                student.billing_customer_ref = Some(customer_ref.to_string());
                student.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn fill_name(&self, id: &str, name: &str) -> Result<()> {
        let mut tables = self.lock()?;
        if let Some(student) = tables
            .students
            .iter_mut()
            .find(|s| s.id == id && s.name.as_deref().map_or(true, str::is_empty))
        {
            student.name = Some(name.to_string());
            student.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl EnrollmentRepository for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Enrollment>> {
        Ok(self
            .lock()?
            .enrollments
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn find_by_student_and_class(
        &self,
        student_id: &str,
        class_id: &str,
    ) -> Result<Option<Enrollment>> {
        Ok(self
            .lock()?
            .enrollments
            .iter()
            .find(|e| e.student_id == student_id && e.class_id == class_id)
            .cloned())
    }

    async fn insert(&self, enrollment: &Enrollment) -> Result<Enrollment> {
        let mut tables = self.lock()?;
        if tables
            .enrollments
            .iter()
            .any(|e| e.student_id == enrollment.student_id && e.class_id == enrollment.class_id)
        {
            return Err(AppError::conflict(format!(
                "Enrollment of {} in {} already exists",
                enrollment.student_id, enrollment.class_id
            )));
        }
        tables.enrollments.push(enrollment.clone());
        Ok(enrollment.clone())
    }
}

#[async_trait]
impl ClassRepository for MemoryStore {
    async fn find_by_id(&self, class_id: &str) -> Result<Option<ClassOffering>> {
        Ok(self.lock()?.classes.get(class_id).cloned())
    }
}

#[async_trait]
impl TransactionRepository for MemoryStore {
    async fn insert_schedule(&self, transactions: &[Transaction]) -> Result<()> {
        let mut tables = self.lock()?;

        let mut references: HashSet<&str> = tables
            .transactions
            .iter()
            .filter_map(|t| t.payment_reference.as_deref())
            .collect();
        let mut numbers: HashSet<i64> = tables.transactions.iter().map(|t| t.invoice_number).collect();

        // Validate the whole batch before writing anything
        for transaction in transactions {
            if let Some(reference) = transaction.payment_reference.as_deref() {
                if !references.insert(reference) {
                    return Err(AppError::conflict(format!(
                        "Transaction with payment reference '{}' already exists",
                        reference
                    )));
                }
            }
            if !numbers.insert(transaction.invoice_number) {
                return Err(AppError::conflict(format!(
                    "Invoice number {} already exists",
                    transaction.invoice_number
                )));
            }
        }

        tables.transactions.extend_from_slice(transactions);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .lock()?
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        Ok(self
            .lock()?
            .transactions
            .iter()
            .find(|t| t.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn find_by_enrollment(&self, enrollment_id: &str) -> Result<Vec<Transaction>> {
        let mut found: Vec<Transaction> = self
            .lock()?
            .transactions
            .iter()
            .filter(|t| t.enrollment_id == enrollment_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.invoice_number);
        Ok(found)
    }

    async fn find_by_payout(&self, payout_id: &str) -> Result<Vec<Transaction>> {
        let mut found: Vec<Transaction> = self
            .lock()?
            .transactions
            .iter()
            .filter(|t| t.payout_id.as_deref() == Some(payout_id))
            .cloned()
            .collect();
        found.sort_by_key(|t| t.invoice_number);
        Ok(found)
    }

    async fn count_by_payout(&self, payout_id: &str) -> Result<u64> {
        Ok(self
            .lock()?
            .transactions
            .iter()
            .filter(|t| t.payout_id.as_deref() == Some(payout_id))
            .count() as u64)
    }

    async fn link_payout(
        &self,
        payout_id: &str,
        payout_date: NaiveDate,
        references: &[String],
    ) -> Result<u64> {
        let wanted: HashSet<&str> = references.iter().map(String::as_str).collect();
        let now = Utc::now();
        let mut tables = self.lock()?;
        let mut linked = 0;

        for transaction in tables.transactions.iter_mut() {
            let matches = transaction
                .payment_reference
                .as_deref()
                .map_or(false, |r| wanted.contains(r));
            if matches && transaction.payout_id.is_none() {
                transaction.payout_id = Some(payout_id.to_string());
                transaction.payout_date = Some(payout_date);
                transaction.updated_at = now;
                linked += 1;
            }
        }

        Ok(linked)
    }

    async fn mark_reconciled(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.lock()?;
        match tables
            .transactions
            .iter_mut()
            .find(|t| t.id == id && t.payout_id.is_some() && !t.reconciled)
        {
            Some(transaction) => {
                transaction.reconciled = true;
                transaction.reconciliation_date = Some(at);
                transaction.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_status(&self, id: &str, status: TransactionStatus) -> Result<bool> {
        let mut tables = self.lock()?;
        match tables.transactions.iter_mut().find(|t| t.id == id) {
            Some(transaction) => {
                transaction.status = status;
                transaction.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl InvoiceSequenceRepository for MemoryStore {
    async fn reserve_block(&self, count: u32, floor: i64) -> Result<i64> {
        if count == 0 {
            return Err(AppError::validation("Cannot reserve an empty invoice number block"));
        }

        let mut tables = self.lock()?;
        let next = match tables.invoice_next {
            Some(next) => next,
            None => {
                let highest = tables.transactions.iter().map(|t| t.invoice_number).max();
                floor.max(highest.map_or(0, |n| n + 1))
            }
        };
        tables.invoice_next = Some(next + i64::from(count));

        Ok(next)
    }
}

#[async_trait]
impl IdempotencyRepository for MemoryStore {
    async fn claim(
        &self,
        key: &LedgerKey,
        claim_token: &str,
        payload: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<IdempotencyRecord> {
        let now = Utc::now();
        let mut tables = self.lock()?;

        let record = tables
            .idempotency
            .entry(key.to_string())
            .and_modify(|record| {
                if record.is_reclaimable(stale_before) {
                    record.claim_token = claim_token.to_string();
                    record.status = IdempotencyStatus::Processing;
                    record.attempts += 1;
                    record.started_at = now;
                    record.payload = Some(payload.to_string());
                    record.last_error = None;
                }
                record.updated_at = now;
            })
            .or_insert_with(|| IdempotencyRecord::claimed(key, claim_token, payload, now));

        Ok(record.clone())
    }

    async fn complete(&self, key: &str, claim_token: &str, outcome: &str) -> Result<bool> {
        let now = Utc::now();
        let mut tables = self.lock()?;
        match tables.idempotency.get_mut(key) {
            Some(record) if record.claim_token == claim_token => {
                record.status = IdempotencyStatus::Completed;
                record.outcome = Some(outcome.to_string());
                record.last_error = None;
                record.completed_at = Some(now);
                record.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail(&self, key: &str, claim_token: &str, error: &str) -> Result<bool> {
        let mut tables = self.lock()?;
        match tables.idempotency.get_mut(key) {
            Some(record)
                if record.claim_token == claim_token
                    && record.status == IdempotencyStatus::Processing =>
            {
                record.status = IdempotencyStatus::Failed;
                record.last_error = Some(error.to_string());
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        Ok(self.lock()?.idempotency.get(key).cloned())
    }

    async fn list_by_status(
        &self,
        status: IdempotencyStatus,
        limit: u32,
    ) -> Result<Vec<IdempotencyRecord>> {
        let mut records: Vec<IdempotencyRecord> = self
            .lock()?
            .idempotency
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        records.truncate(limit as usize);
        Ok(records)
    }
}
