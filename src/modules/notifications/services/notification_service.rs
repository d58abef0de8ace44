use super::super::models::{DeliveryReport, Notification, WEBHOOK_DEFERRED};
use super::notifier::Notifier;
use super::retry::{deliver, RetryPolicy};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fire-and-forget front of the notification subsystem
///
/// Deliveries run on their own task so a slow or failing notification never
/// holds up, or rolls back, the request that triggered it.
#[derive(Clone)]
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
    ops_recipient: Option<String>,
}

impl NotificationService {
    pub fn new(notifier: Arc<dyn Notifier>, policy: RetryPolicy, ops_recipient: Option<String>) -> Self {
        Self {
            notifier,
            policy,
            ops_recipient,
        }
    }

    /// Deliver with retries and wait for the report
    pub async fn send(&self, notification: &Notification) -> DeliveryReport {
        deliver(self.notifier.as_ref(), notification, &self.policy).await
    }

    /// Deliver in the background
    pub fn spawn(&self, notification: Notification) -> JoinHandle<DeliveryReport> {
        let service = self.clone();
        tokio::spawn(async move { service.send(&notification).await })
    }

    /// Tell operations about an event that needs manual follow-up
    ///
    /// No-op when no operations recipient is configured.
    pub fn alert_deferred(&self, key: &str, reason: &str) -> Option<JoinHandle<DeliveryReport>> {
        let recipient = self.ops_recipient.as_ref()?;
        Some(self.spawn(Notification::new(
            recipient.clone(),
            WEBHOOK_DEFERRED,
            json!({ "idempotency_key": key, "reason": reason }),
            "ops",
        )))
    }

    pub fn ops_recipient(&self) -> Option<&str> {
        self.ops_recipient.as_deref()
    }
}
