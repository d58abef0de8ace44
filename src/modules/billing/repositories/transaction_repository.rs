use super::super::models::{Transaction, TransactionStatus};
use crate::core::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{MySql, MySqlPool, QueryBuilder};

/// Payment references bound per UPDATE when linking a payout
pub const LINK_CHUNK_SIZE: usize = 500;

/// Persistence for billing transactions
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Persist a whole schedule atomically
    ///
    /// Either every row is written or none is. A payment reference or
    /// invoice number that already exists surfaces as `AppError::Conflict`.
    async fn insert_schedule(&self, transactions: &[Transaction]) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Transaction>>;

    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<Transaction>>;

    /// All lines of an enrollment ordered by invoice number
    async fn find_by_enrollment(&self, enrollment_id: &str) -> Result<Vec<Transaction>>;

    /// All lines linked to a payout ordered by invoice number
    async fn find_by_payout(&self, payout_id: &str) -> Result<Vec<Transaction>>;

    async fn count_by_payout(&self, payout_id: &str) -> Result<u64>;

    /// Link unlinked transactions whose payment reference is in `references`
    ///
    /// Transactions already linked to any payout are left untouched. Runs
    /// in a single database transaction and returns the number of rows linked.
    async fn link_payout(
        &self,
        payout_id: &str,
        payout_date: NaiveDate,
        references: &[String],
    ) -> Result<u64>;

    /// Flag a linked transaction as reconciled
    ///
    /// Returns false when the transaction is unlinked or already reconciled.
    async fn mark_reconciled(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;

    async fn update_status(&self, id: &str, status: TransactionStatus) -> Result<bool>;
}

/// MySQL-backed transaction repository
pub struct MySqlTransactionRepository {
    pool: MySqlPool,
}

impl MySqlTransactionRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn insert_with_tx(
        tx: &mut sqlx::Transaction<'_, MySql>,
        transaction: &Transaction,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, enrollment_id, class_id, student_id, transaction_type,
                quantity, amount_due, amount_paid, status, due_date,
                payment_date, payment_reference, invoice_number, payout_id,
                payout_date, reconciled, reconciliation_date, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.enrollment_id)
        .bind(&transaction.class_id)
        .bind(&transaction.student_id)
        .bind(transaction.transaction_type.to_string())
        .bind(transaction.quantity)
        .bind(transaction.amount_due)
        .bind(transaction.amount_paid)
        .bind(transaction.status.to_string())
        .bind(transaction.due_date)
        .bind(transaction.payment_date)
        .bind(&transaction.payment_reference)
        .bind(transaction.invoice_number)
        .bind(&transaction.payout_id)
        .bind(transaction.payout_date)
        .bind(transaction.reconciled)
        .bind(transaction.reconciliation_date)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(tx.as_mut())
        .await
        .map_err(|e| AppError::from_insert(e, &format!("Transaction '{}'", transaction.id)))?;

        Ok(())
    }
}

const TRANSACTION_COLUMNS: &str = "id, enrollment_id, class_id, student_id, transaction_type, \
     quantity, amount_due, amount_paid, status, due_date, payment_date, payment_reference, \
     invoice_number, payout_id, payout_date, reconciled, reconciliation_date, created_at, updated_at";

#[async_trait]
impl TransactionRepository for MySqlTransactionRepository {
    async fn insert_schedule(&self, transactions: &[Transaction]) -> Result<()> {
        if transactions.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for transaction in transactions {
            Self::insert_with_tx(&mut tx, transaction).await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {} FROM transactions WHERE payment_reference = ?",
            TRANSACTION_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn find_by_enrollment(&self, enrollment_id: &str) -> Result<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {} FROM transactions WHERE enrollment_id = ? ORDER BY invoice_number",
            TRANSACTION_COLUMNS
        ))
        .bind(enrollment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn find_by_payout(&self, payout_id: &str) -> Result<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {} FROM transactions WHERE payout_id = ? ORDER BY invoice_number",
            TRANSACTION_COLUMNS
        ))
        .bind(payout_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn count_by_payout(&self, payout_id: &str) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE payout_id = ?")
                .bind(payout_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }

    async fn link_payout(
        &self,
        payout_id: &str,
        payout_date: NaiveDate,
        references: &[String],
    ) -> Result<u64> {
        if references.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut linked = 0u64;

        for chunk in references.chunks(LINK_CHUNK_SIZE) {
            let mut query: QueryBuilder<MySql> =
                QueryBuilder::new("UPDATE transactions SET payout_id = ");
            query.push_bind(payout_id);
            query.push(", payout_date = ");
            query.push_bind(payout_date);
            query.push(
                ", updated_at = NOW() WHERE payout_id IS NULL AND payment_reference IN (",
            );

            let mut refs = query.separated(", ");
            for reference in chunk {
                refs.push_bind(reference.as_str());
            }
            refs.push_unseparated(")");

            let result = query.build().execute(tx.as_mut()).await?;
            linked += result.rows_affected();
        }

        tx.commit().await?;

        Ok(linked)
    }

    async fn mark_reconciled(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET reconciled = TRUE, reconciliation_date = ?, updated_at = NOW()
            WHERE id = ? AND payout_id IS NOT NULL AND reconciled = FALSE
            "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_status(&self, id: &str, status: TransactionStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = ?, updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(status.to_string())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
