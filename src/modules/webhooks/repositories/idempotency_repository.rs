use super::super::models::{IdempotencyRecord, IdempotencyStatus, LedgerKey};
use crate::core::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

/// Durable storage behind the idempotency ledger
#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    /// Insert the record or take over a reclaimable one, in one atomic statement
    ///
    /// The record is reclaimable when it failed or when it is still processing
    /// but started before `stale_before`. Returns the record as stored
    /// afterwards; the claim succeeded only if its token equals `claim_token`.
    async fn claim(
        &self,
        key: &LedgerKey,
        claim_token: &str,
        payload: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<IdempotencyRecord>;

    /// Mark the record completed, only while still owned by `claim_token`
    async fn complete(&self, key: &str, claim_token: &str, outcome: &str) -> Result<bool>;

    /// Mark the record failed, only while still owned by `claim_token`
    async fn fail(&self, key: &str, claim_token: &str, error: &str) -> Result<bool>;

    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>>;

    /// Most recently updated records in `status`
    async fn list_by_status(
        &self,
        status: IdempotencyStatus,
        limit: u32,
    ) -> Result<Vec<IdempotencyRecord>>;
}

/// MySQL-backed idempotency ledger
pub struct MySqlIdempotencyRepository {
    pool: MySqlPool,
}

impl MySqlIdempotencyRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

const RECORD_COLUMNS: &str = "idempotency_key, kind, status, claim_token, payload, outcome, \
     last_error, attempts, started_at, completed_at, created_at, updated_at";

#[async_trait]
impl IdempotencyRepository for MySqlIdempotencyRepository {
    async fn claim(
        &self,
        key: &LedgerKey,
        claim_token: &str,
        payload: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<IdempotencyRecord> {
        let now = Utc::now();
        let key_str = key.to_string();

        // Assignments run left to right: claim_token is swapped first and the
        // remaining columns follow only when the swap happened.
        sqlx::query(
            r#"
            INSERT INTO idempotency_records (
                idempotency_key, kind, status, claim_token, payload,
                attempts, started_at, created_at, updated_at
            ) VALUES (?, ?, 'processing', ?, ?, 1, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                claim_token = IF(
                    status = 'failed' OR (status = 'processing' AND started_at < ?),
                    VALUES(claim_token),
                    claim_token
                ),
                attempts = IF(claim_token = VALUES(claim_token), attempts + 1, attempts),
                status = IF(claim_token = VALUES(claim_token), 'processing', status),
                started_at = IF(claim_token = VALUES(claim_token), VALUES(started_at), started_at),
                payload = IF(claim_token = VALUES(claim_token), VALUES(payload), payload),
                last_error = IF(claim_token = VALUES(claim_token), NULL, last_error),
                updated_at = VALUES(updated_at)
            "#,
        )
        .bind(&key_str)
        .bind(key.kind.as_str())
        .bind(claim_token)
        .bind(payload)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        let record = sqlx::query_as::<_, IdempotencyRecord>(&format!(
            "SELECT {} FROM idempotency_records WHERE idempotency_key = ?",
            RECORD_COLUMNS
        ))
        .bind(&key_str)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn complete(&self, key: &str, claim_token: &str, outcome: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE idempotency_records
            SET status = 'completed', outcome = ?, last_error = NULL,
                completed_at = ?, updated_at = ?
            WHERE idempotency_key = ? AND claim_token = ?
            "#,
        )
        .bind(outcome)
        .bind(Utc::now())
        .bind(Utc::now())
        .bind(key)
        .bind(claim_token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail(&self, key: &str, claim_token: &str, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE idempotency_records
            SET status = 'failed', last_error = ?, updated_at = ?
            WHERE idempotency_key = ? AND claim_token = ? AND status = 'processing'
            "#,
        )
        .bind(error)
        .bind(Utc::now())
        .bind(key)
        .bind(claim_token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(&format!(
            "SELECT {} FROM idempotency_records WHERE idempotency_key = ?",
            RECORD_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_by_status(
        &self,
        status: IdempotencyStatus,
        limit: u32,
    ) -> Result<Vec<IdempotencyRecord>> {
        let records = sqlx::query_as::<_, IdempotencyRecord>(&format!(
            "SELECT {} FROM idempotency_records WHERE status = ? ORDER BY updated_at DESC LIMIT ?",
            RECORD_COLUMNS
        ))
        .bind(status.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
