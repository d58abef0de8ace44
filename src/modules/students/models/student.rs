use crate::core::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Student identity record
///
/// Created on the first successful payment for an email address and never
/// deleted by the reconciliation engine. Email is stored normalized and is
/// unique in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Student {
    /// Unique student ID (UUID)
    pub id: String,

    /// Normalized (trimmed, lowercased) email address
    pub email: String,

    /// Display name, filled in from the first event that carries one
    pub name: Option<String>,

    /// Processor-side billing customer reference, attached on first payment
    pub billing_customer_ref: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Build a new student for insertion
    ///
    /// # Arguments
    /// * `email` - Raw email address (normalized here)
    /// * `name` - Optional display name
    pub fn new(email: &str, name: Option<String>) -> Result<Self> {
        let email = normalize_email(email)?;
        let now = Utc::now();

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            name: clean_name(name),
            billing_customer_ref: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn has_billing_customer(&self) -> bool {
        self.billing_customer_ref.is_some()
    }
}

/// Normalize an email address for identity lookups
///
/// Emails are compared case-insensitively, so the canonical form is trimmed
/// and lowercased.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();

    if email.is_empty() {
        return Err(AppError::validation("Email cannot be empty"));
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::validation(format!(
            "Invalid email address: {}",
            raw.trim()
        ))),
    }
}

/// Trim a display name, treating blank names as absent
pub fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}
