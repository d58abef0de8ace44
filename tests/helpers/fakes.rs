// Fake Collaborators
//
// Stand-ins for the payment processor and the notification transport.
// Both record what they were asked to do and support failure injection.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tuitionsync::core::{AppError, Result};
use tuitionsync::modules::notifications::{Notification, Notifier, NotifyError};
use tuitionsync::modules::processor::{
    BillingCustomerGateway, CustomerRequest, SettledCharge, SettledChargePage,
    SettledChargeSource,
};

/// In-memory payment processor
#[derive(Default)]
pub struct FakeProcessor {
    customers_created: AtomicUsize,
    fail_customers: AtomicBool,
    payouts: Mutex<HashMap<String, Vec<SettledCharge>>>,
    list_calls: AtomicUsize,
    fail_listing_from: Mutex<Option<usize>>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_customer_creation(&self, fail: bool) {
        self.fail_customers.store(fail, Ordering::SeqCst);
    }

    pub fn customers_created(&self) -> usize {
        self.customers_created.load(Ordering::SeqCst)
    }

    /// Register the settled charges of a payout, one per payment reference
    pub fn add_payout(&self, payout_id: &str, references: &[&str]) {
        let mut payouts = self.payouts.lock().unwrap();
        let charges = payouts.entry(payout_id.to_string()).or_default();
        for reference in references {
            let id = format!("txn_{}", charges.len() + 1);
            charges.push(SettledCharge {
                id,
                payment_reference: Some(reference.to_string()),
            });
        }
    }

    /// Add a payout item with no originating payment (fees, adjustments)
    pub fn add_unreferenced_item(&self, payout_id: &str) {
        let mut payouts = self.payouts.lock().unwrap();
        let charges = payouts.entry(payout_id.to_string()).or_default();
        let id = format!("txn_{}", charges.len() + 1);
        charges.push(SettledCharge {
            id,
            payment_reference: None,
        });
    }

    /// Make every listing call from the `n`th (1-based) onwards fail
    pub fn fail_listing_from_call(&self, n: usize) {
        *self.fail_listing_from.lock().unwrap() = Some(n);
    }

    pub fn heal_listing(&self) {
        *self.fail_listing_from.lock().unwrap() = None;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillingCustomerGateway for FakeProcessor {
    async fn create_customer(&self, request: &CustomerRequest) -> Result<String> {
        if self.fail_customers.load(Ordering::SeqCst) {
            return Err(AppError::downstream(format!(
                "customer creation for {} refused",
                request.email
            )));
        }
        let n = self.customers_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("cus_{}", n))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[async_trait]
impl SettledChargeSource for FakeProcessor {
    async fn list_settled_charges(
        &self,
        payout_id: &str,
        starting_after: Option<&str>,
        limit: u32,
    ) -> Result<SettledChargePage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(from) = *self.fail_listing_from.lock().unwrap() {
            if call >= from {
                return Err(AppError::downstream("balance transaction listing failed"));
            }
        }

        let payouts = self.payouts.lock().unwrap();
        let charges = payouts.get(payout_id).cloned().unwrap_or_default();

        let start = match starting_after {
            Some(cursor) => charges
                .iter()
                .position(|c| c.id == cursor)
                .map(|i| i + 1)
                .unwrap_or(charges.len()),
            None => 0,
        };
        let end = (start + limit as usize).min(charges.len());

        Ok(SettledChargePage {
            charges: charges[start..end].to_vec(),
            has_more: end < charges.len(),
        })
    }
}

/// Notification transport that records deliveries
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    attempts: AtomicUsize,
    transient_failures: AtomicUsize,
    reject_all: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` attempts with a 503
    pub fn fail_next(&self, n: usize) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Reject every attempt with a non-retryable 400
    pub fn reject_all(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_with_template(&self, template: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.template == template)
            .collect()
    }

    /// Wait until a notification with `template` was delivered
    pub async fn wait_for(&self, template: &str) -> Option<Notification> {
        for _ in 0..200 {
            if let Some(found) = self.sent_with_template(template).into_iter().next() {
                return Some(found);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> std::result::Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.reject_all.load(Ordering::SeqCst) {
            return Err(NotifyError::Status {
                status: 400,
                body: "invalid template".into(),
            });
        }

        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            return Err(NotifyError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }

        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
