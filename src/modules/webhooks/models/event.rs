use crate::core::{AppError, Result};
use crate::modules::students::normalize_email;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_ASYNC_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
pub const PAYOUT_PAID: &str = "payout.paid";

/// Metadata keys that may carry the class identifier on a checkout session
const CLASS_ID_KEYS: [&str; 3] = ["class_id", "classId", "class"];

/// Processor event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: Option<i64>,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The subset of a checkout session the enrollment path needs
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
}

/// The subset of a payout object the payout path needs
#[derive(Debug, Clone, Deserialize)]
pub struct PayoutObject {
    pub id: String,
    /// Unix timestamp of the expected bank arrival
    #[serde(default)]
    pub arrival_date: Option<i64>,
}

/// A paid checkout, validated and ready for enrollment
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentEvent {
    pub event_id: String,
    pub payment_reference: String,
    pub email: String,
    pub name: Option<String>,
    pub class_id: String,
    pub amount_charged: i64,
    pub processor_customer_ref: Option<String>,
}

/// A settled payout, validated and ready for matching
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutEvent {
    pub event_id: String,
    pub payout_id: String,
    pub arrival_date: NaiveDate,
}

/// Where an authenticated event goes
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedEvent {
    Enrollment(EnrollmentEvent),
    Payout(PayoutEvent),
    Ignored { event_type: String, reason: String },
}

impl EventEnvelope {
    /// Classify the event and validate the fields its handler requires
    ///
    /// # Errors
    /// * `AppError::Validation` - A routed event lacks a required field
    pub fn route(&self) -> Result<RoutedEvent> {
        match self.event_type.as_str() {
            CHECKOUT_COMPLETED | CHECKOUT_ASYNC_SUCCEEDED => {
                let session: CheckoutSession = serde_json::from_value(self.data.object.clone())
                    .map_err(|e| AppError::validation(format!("Malformed checkout session: {}", e)))?;

                if !session.is_paid() {
                    return Ok(RoutedEvent::Ignored {
                        event_type: self.event_type.clone(),
                        reason: format!(
                            "payment_status is {}",
                            session.payment_status.as_deref().unwrap_or("missing")
                        ),
                    });
                }

                Ok(RoutedEvent::Enrollment(session.into_enrollment(&self.id)?))
            }
            PAYOUT_PAID => {
                let payout: PayoutObject = serde_json::from_value(self.data.object.clone())
                    .map_err(|e| AppError::validation(format!("Malformed payout: {}", e)))?;

                if payout.id.trim().is_empty() {
                    return Err(AppError::validation("Payout event is missing the payout id"));
                }

                Ok(RoutedEvent::Payout(PayoutEvent {
                    event_id: self.id.clone(),
                    arrival_date: payout
                        .arrival_date
                        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
                        .map(|dt| dt.date_naive())
                        .unwrap_or_else(|| Utc::now().date_naive()),
                    payout_id: payout.id,
                }))
            }
            other => Ok(RoutedEvent::Ignored {
                event_type: other.to_string(),
                reason: "unhandled event type".to_string(),
            }),
        }
    }
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_status.as_deref(),
            Some("paid") | Some("no_payment_required")
        )
    }

    pub fn class_id(&self) -> Option<&str> {
        CLASS_ID_KEYS
            .iter()
            .filter_map(|key| self.metadata.get(*key))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .or(self.customer_email.as_deref())
            .filter(|e| !e.trim().is_empty())
    }

    /// Validate the session into an enrollment event
    ///
    /// Sessions that required no payment carry no payment intent; the session
    /// id stands in as the payment reference for those.
    pub fn into_enrollment(self, event_id: &str) -> Result<EnrollmentEvent> {
        let payment_reference = match self.payment_intent.as_deref().filter(|p| !p.is_empty()) {
            Some(intent) => intent.to_string(),
            None if self.payment_status.as_deref() == Some("no_payment_required") => {
                self.id.clone()
            }
            None => {
                return Err(AppError::validation(format!(
                    "Checkout session {} has no payment intent",
                    self.id
                )))
            }
        };

        let email = self.email().ok_or_else(|| {
            AppError::validation(format!("Checkout session {} has no customer email", self.id))
        })?;
        let email = normalize_email(email)?;

        let class_id = self
            .class_id()
            .ok_or_else(|| {
                AppError::validation(format!(
                    "Checkout session {} has no class id in metadata",
                    self.id
                ))
            })?
            .to_string();

        Ok(EnrollmentEvent {
            event_id: event_id.to_string(),
            payment_reference,
            email,
            name: self.customer_details.and_then(|d| d.name),
            class_id,
            amount_charged: self.amount_total.unwrap_or(0),
            processor_customer_ref: self.customer.filter(|c| !c.is_empty()),
        })
    }
}
