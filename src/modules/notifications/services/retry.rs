use super::super::models::{DeliveryReport, Notification};
use super::notifier::{Notifier, NotifyError};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for a single backoff sleep
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Exponential backoff with a fixed attempt ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            attempt_timeout,
        }
    }

    /// Sleep before retry number `attempt` (1-based count of failures so far)
    ///
    /// The base delay doubles per failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(MAX_DELAY)
            .min(MAX_DELAY)
    }
}

/// Send `notification`, retrying transient failures
///
/// Never returns an error: the report says whether delivery succeeded and how
/// many attempts it took.
pub async fn deliver(
    notifier: &dyn Notifier,
    notification: &Notification,
    policy: &RetryPolicy,
) -> DeliveryReport {
    let mut attempts = 0;

    loop {
        attempts += 1;

        let result = match tokio::time::timeout(policy.attempt_timeout, notifier.send(notification)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(policy.attempt_timeout)),
        };

        match result {
            Ok(()) => {
                debug!(template = %notification.template, attempts, "Notification delivered");
                return DeliveryReport {
                    success: true,
                    attempts,
                };
            }
            Err(e) if e.is_transient() && attempts < policy.max_attempts => {
                let delay = policy.delay_after(attempts);
                debug!(
                    template = %notification.template,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Notification failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(
                    template = %notification.template,
                    tag = %notification.tag,
                    attempts,
                    transient = e.is_transient(),
                    error = %e,
                    "Notification delivery failed"
                );
                return DeliveryReport {
                    success: false,
                    attempts,
                };
            }
        }
    }
}
