use super::capabilities::{
    BillingCustomerGateway, CustomerRequest, SettledCharge, SettledChargePage,
    SettledChargeSource,
};
use crate::config::ProcessorConfig;
use crate::core::{AppError, Result};
use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Processor API page size ceiling
pub const MAX_PAGE_SIZE: u32 = 100;

/// HTTP client for the payment processor's REST API
///
/// Every request carries a client-side timeout, and transient failures are
/// retried a bounded number of times through `reqwest-retry`.
pub struct StripeClient {
    client: ClientWithMiddleware,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(config: &ProcessorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(5)))
            .build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn error_from_response(context: &str, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AppError::downstream(format!("{} failed with {}: {}", context, status, body))
    }
}

#[derive(Debug, Deserialize)]
struct CustomerObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BalanceTransactionList {
    data: Vec<BalanceTransaction>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct BalanceTransaction {
    id: String,
    #[serde(default)]
    source: Option<Value>,
}

/// Pull the payment intent id out of an (expanded) balance transaction source
///
/// The source is the charge object when `data.source` is expanded; its
/// `payment_intent` is either an id string or an expanded object.
fn payment_reference_from_source(source: Option<&Value>) -> Option<String> {
    let intent = source?.get("payment_intent")?;
    match intent {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[async_trait]
impl BillingCustomerGateway for StripeClient {
    async fn create_customer(&self, request: &CustomerRequest) -> Result<String> {
        let url = format!("{}/v1/customers", self.base_url);

        let mut form: Vec<(&str, String)> = vec![
            ("email", request.email.clone()),
            ("metadata[student_id]", request.student_id.clone()),
        ];
        if let Some(name) = &request.name {
            form.push(("name", name.clone()));
        }
        if let Some(reference) = &request.payment_reference {
            form.push(("metadata[payment_intent]", reference.clone()));
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            // Retries of this POST must not create a second customer
            .header("Idempotency-Key", format!("customer-{}", request.student_id))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("Customer creation", response).await);
        }

        let customer: CustomerObject = response.json().await?;
        debug!(customer_id = %customer.id, "Billing customer created");
        Ok(customer.id)
    }

    fn name(&self) -> &str {
        "stripe"
    }
}

#[async_trait]
impl SettledChargeSource for StripeClient {
    async fn list_settled_charges(
        &self,
        payout_id: &str,
        starting_after: Option<&str>,
        limit: u32,
    ) -> Result<SettledChargePage> {
        let url = format!("{}/v1/balance_transactions", self.base_url);

        let mut query: Vec<(&str, String)> = vec![
            ("payout", payout_id.to_string()),
            ("type", "charge".to_string()),
            ("limit", limit.clamp(1, MAX_PAGE_SIZE).to_string()),
            ("expand[]", "data.source".to_string()),
        ];
        if let Some(cursor) = starting_after {
            query.push(("starting_after", cursor.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("Balance transaction listing", response).await);
        }

        let list: BalanceTransactionList = response.json().await?;

        let charges = list
            .data
            .into_iter()
            .map(|item| {
                let payment_reference = payment_reference_from_source(item.source.as_ref());
                if payment_reference.is_none() {
                    warn!(
                        payout_id = %payout_id,
                        item_id = %item.id,
                        "Settled charge has no payment intent"
                    );
                }
                SettledCharge {
                    id: item.id,
                    payment_reference,
                }
            })
            .collect();

        Ok(SettledChargePage {
            charges,
            has_more: list.has_more,
        })
    }
}
