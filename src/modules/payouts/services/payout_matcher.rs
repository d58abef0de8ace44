use crate::core::{AppError, Result};
use crate::modules::billing::{Transaction, TransactionRepository};
use crate::modules::processor::SettledChargeSource;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Processor API page size ceiling
const PROCESSOR_PAGE_CAP: u32 = 100;

/// Result of reconciling one payout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutOutcome {
    pub payout_id: String,
    /// Transactions carrying this payout id after the run
    pub matched_count: u64,
    /// True when an earlier run had already linked this payout
    pub already_linked: bool,
}

/// Links settled processor charges in a payout to recorded transactions
///
/// All payment references are collected before anything is written, and the
/// write is one bulk update. A pagination failure therefore leaves no
/// transaction half-linked, and a payout that has any linked transaction is
/// considered fully reconciled.
#[derive(Clone)]
pub struct PayoutMatcher {
    transactions: Arc<dyn TransactionRepository>,
    charges: Arc<dyn SettledChargeSource>,
    page_size: u32,
    max_pages: u32,
}

impl PayoutMatcher {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        charges: Arc<dyn SettledChargeSource>,
        page_size: u32,
        max_pages: u32,
    ) -> Self {
        Self {
            transactions,
            charges,
            page_size: page_size.clamp(1, PROCESSOR_PAGE_CAP),
            max_pages: max_pages.max(1),
        }
    }

    /// Link every transaction paid by a charge in `payout_id`
    ///
    /// # Arguments
    /// * `payout_id` - Processor payout identifier
    /// * `arrival_date` - Date the payout reached the bank account
    ///
    /// # Returns
    /// * `Result<PayoutOutcome>` - Number of linked transactions
    ///
    /// # Errors
    /// * `AppError::ReconciliationAbort` - Pagination failed, nothing was written
    /// * `AppError::Database` - The bulk update failed, nothing was written
    pub async fn reconcile(&self, payout_id: &str, arrival_date: NaiveDate) -> Result<PayoutOutcome> {
        let existing = self.transactions.count_by_payout(payout_id).await?;
        if existing > 0 {
            info!(payout_id, matched_count = existing, "Payout already linked");
            return Ok(PayoutOutcome {
                payout_id: payout_id.to_string(),
                matched_count: existing,
                already_linked: true,
            });
        }

        let references = self.collect_references(payout_id).await?;
        if references.is_empty() {
            info!(payout_id, "Payout carries no payment references");
            return Ok(PayoutOutcome {
                payout_id: payout_id.to_string(),
                matched_count: 0,
                already_linked: false,
            });
        }

        let references: Vec<String> = references.into_iter().collect();
        let matched_count = self
            .transactions
            .link_payout(payout_id, arrival_date, &references)
            .await?;

        info!(
            payout_id,
            %arrival_date,
            references = references.len(),
            matched_count,
            "Payout reconciled"
        );

        Ok(PayoutOutcome {
            payout_id: payout_id.to_string(),
            matched_count,
            already_linked: false,
        })
    }

    /// Transactions currently linked to `payout_id`
    pub async fn linked_transactions(&self, payout_id: &str) -> Result<Vec<Transaction>> {
        self.transactions.find_by_payout(payout_id).await
    }

    /// Walk every page of settled charges and gather their payment references
    async fn collect_references(&self, payout_id: &str) -> Result<BTreeSet<String>> {
        let mut references = BTreeSet::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            if pages >= self.max_pages {
                return Err(AppError::ReconciliationAbort(format!(
                    "Payout {} has more than {} pages of charges",
                    payout_id, self.max_pages
                )));
            }

            let page = self
                .charges
                .list_settled_charges(payout_id, cursor.as_deref(), self.page_size)
                .await
                .map_err(|e| {
                    warn!(payout_id, page = pages + 1, error = %e, "Payout scan failed");
                    AppError::ReconciliationAbort(format!(
                        "Listing charges for payout {} failed on page {}: {}",
                        payout_id,
                        pages + 1,
                        e
                    ))
                })?;
            pages += 1;

            references.extend(
                page.charges
                    .iter()
                    .filter_map(|charge| charge.payment_reference.clone()),
            );

            if !page.has_more {
                break;
            }
            match page.next_cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => {
                    return Err(AppError::ReconciliationAbort(format!(
                        "Processor reported more charges for payout {} but sent an empty page",
                        payout_id
                    )))
                }
            }
        }

        tracing::debug!(payout_id, pages, references = references.len(), "Payout scan complete");

        Ok(references)
    }
}
