use super::super::repositories::InvoiceSequenceRepository;
use crate::core::{AppError, Result};
use std::sync::Arc;

/// Issues monotonic, unique invoice numbers
///
/// Numbers come from one atomic counter increment per call, so concurrent
/// callers never overlap. Gaps are possible: a block whose schedule fails to
/// persist is not handed out again.
#[derive(Clone)]
pub struct InvoiceNumbering {
    sequences: Arc<dyn InvoiceSequenceRepository>,
    floor: i64,
}

impl InvoiceNumbering {
    pub fn new(sequences: Arc<dyn InvoiceSequenceRepository>, floor: i64) -> Self {
        Self { sequences, floor }
    }

    pub fn floor(&self) -> i64 {
        self.floor
    }

    /// Reserve a single invoice number
    pub async fn next(&self) -> Result<i64> {
        self.next_n(1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::internal("Invoice number reservation returned nothing"))
    }

    /// Reserve `n` contiguous invoice numbers in ascending order
    pub async fn next_n(&self, n: usize) -> Result<Vec<i64>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let count = u32::try_from(n)
            .map_err(|_| AppError::validation(format!("Cannot reserve {} invoice numbers", n)))?;
        let first = self.sequences.reserve_block(count, self.floor).await?;

        tracing::debug!(first, count, "Reserved invoice number block");

        Ok((first..first + i64::from(count)).collect())
    }
}
