use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ENROLLMENT_CONFIRMATION: &str = "enrollment_confirmation";
pub const PAYOUT_RECONCILED: &str = "payout_reconciled";
pub const WEBHOOK_DEFERRED: &str = "webhook_deferred";

/// Message handed to the notification subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub template: String,
    pub data: Value,
    /// Categorization tag, e.g. `enrollment` or `ops`
    pub tag: String,
}

impl Notification {
    pub fn new(
        recipient: impl Into<String>,
        template: impl Into<String>,
        data: Value,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            template: template.into(),
            data,
            tag: tag.into(),
        }
    }
}

/// What happened to one notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub success: bool,
    pub attempts: u32,
}
