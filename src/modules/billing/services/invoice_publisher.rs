use super::super::models::Transaction;
use crate::core::{AppError, Result};
use crate::modules::students::Enrollment;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Pushes newly created invoices to the external invoicing system
///
/// Best-effort: callers log failures, persisted billing state is unaffected.
#[async_trait]
pub trait InvoicePublisher: Send + Sync {
    async fn publish(&self, enrollment: &Enrollment, transactions: &[Transaction]) -> Result<()>;
}

/// Posts invoices to the invoicing sync endpoint
pub struct HttpInvoicePublisher {
    client: reqwest::Client,
    url: String,
}

impl HttpInvoicePublisher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl InvoicePublisher for HttpInvoicePublisher {
    async fn publish(&self, enrollment: &Enrollment, transactions: &[Transaction]) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "enrollment": enrollment,
                "transactions": transactions,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::downstream(format!(
                "Invoicing sync returned {}",
                response.status()
            )));
        }

        tracing::debug!(
            enrollment_id = %enrollment.id,
            count = transactions.len(),
            "Invoices published"
        );
        Ok(())
    }
}

/// Used when no invoicing sync URL is configured
pub struct NoopInvoicePublisher;

#[async_trait]
impl InvoicePublisher for NoopInvoicePublisher {
    async fn publish(&self, _enrollment: &Enrollment, _transactions: &[Transaction]) -> Result<()> {
        Ok(())
    }
}
