use super::super::models::{PayoutState, Transaction, TransactionStatus};
use super::super::repositories::TransactionRepository;
use crate::core::{AppError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Operator actions on individual transactions
#[derive(Clone)]
pub struct ReconciliationService {
    transactions: Arc<dyn TransactionRepository>,
}

impl ReconciliationService {
    pub fn new(transactions: Arc<dyn TransactionRepository>) -> Self {
        Self { transactions }
    }

    pub async fn get(&self, id: &str) -> Result<Transaction> {
        self.transactions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Transaction {}", id)))
    }

    /// Mark a payout-linked transaction as reconciled
    ///
    /// Reconciling an already reconciled transaction returns it unchanged.
    ///
    /// # Errors
    /// * `AppError::NotFound` - Unknown transaction
    /// * `AppError::Conflict` - Transaction is not linked to a payout yet
    pub async fn reconcile(&self, id: &str) -> Result<Transaction> {
        let transaction = self.get(id).await?;

        match transaction.payout_state() {
            PayoutState::Reconciled => return Ok(transaction),
            PayoutState::Unlinked => {
                return Err(AppError::conflict(format!(
                    "Transaction {} is not linked to a payout",
                    id
                )))
            }
            PayoutState::Linked => {}
        }

        if self.transactions.mark_reconciled(id, Utc::now()).await? {
            info!(
                transaction_id = id,
                payout_id = ?transaction.payout_id,
                "Transaction reconciled"
            );
        }

        self.get(id).await
    }

    /// Administrative status override
    pub async fn override_status(&self, id: &str, status: TransactionStatus) -> Result<Transaction> {
        let transaction = self.get(id).await?;
        if transaction.status == status {
            return Ok(transaction);
        }

        self.transactions.update_status(id, status).await?;
        info!(
            transaction_id = id,
            from = %transaction.status,
            to = %status,
            "Transaction status overridden"
        );

        self.get(id).await
    }
}
