use crate::core::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

/// Name of the single invoice counter row
pub const INVOICE_SEQUENCE: &str = "invoice";

/// Durable counter backing invoice numbers
#[async_trait]
pub trait InvoiceSequenceRepository: Send + Sync {
    /// Atomically reserve `count` consecutive numbers and return the first
    ///
    /// A counter that does not exist yet is seeded from `floor` or from the
    /// highest invoice number already persisted, whichever is larger.
    async fn reserve_block(&self, count: u32, floor: i64) -> Result<i64>;
}

/// Counter kept in the `invoice_sequences` table
///
/// The increment and the read of the new value happen in one statement via
/// `LAST_INSERT_ID(expr)`, which is connection-scoped, so no row lock is held
/// across round trips and concurrent reservations never overlap.
pub struct MySqlInvoiceSequenceRepository {
    pool: MySqlPool,
}

impl MySqlInvoiceSequenceRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceSequenceRepository for MySqlInvoiceSequenceRepository {
    async fn reserve_block(&self, count: u32, floor: i64) -> Result<i64> {
        if count == 0 {
            return Err(AppError::validation("Cannot reserve an empty invoice number block"));
        }

        let mut conn = self.pool.acquire().await?;

        for _ in 0..2 {
            let bumped = sqlx::query(
                r#"
                UPDATE invoice_sequences
                SET next_value = LAST_INSERT_ID(next_value + ?)
                WHERE name = ?
                "#,
            )
            .bind(i64::from(count))
            .bind(INVOICE_SEQUENCE)
            .execute(&mut *conn)
            .await?;

            if bumped.rows_affected() == 1 {
                let end: u64 = sqlx::query_scalar("SELECT LAST_INSERT_ID()")
                    .fetch_one(&mut *conn)
                    .await?;
                let end = i64::try_from(end)
                    .map_err(|_| AppError::internal("Invoice counter overflowed"))?;

                return Ok(end - i64::from(count));
            }

            tracing::info!(floor, "Seeding invoice number counter");
            sqlx::query(
                r#"
                INSERT IGNORE INTO invoice_sequences (name, next_value)
                SELECT ?, GREATEST(?, COALESCE(MAX(invoice_number), 0) + 1)
                FROM transactions
                "#,
            )
            .bind(INVOICE_SEQUENCE)
            .bind(floor)
            .execute(&mut *conn)
            .await?;
        }

        Err(AppError::internal("Invoice number counter could not be initialized"))
    }
}
