use crate::core::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Creates billing customers on the payment processor
///
/// Best-effort collaborator: callers log failures and carry on.
#[async_trait]
pub trait BillingCustomerGateway: Send + Sync {
    /// Create a customer and return its processor reference
    async fn create_customer(&self, request: &CustomerRequest) -> Result<String>;

    fn name(&self) -> &str;
}

/// Lists the settled charges that make up a payout, one page at a time
#[async_trait]
pub trait SettledChargeSource: Send + Sync {
    /// Fetch one page of settled charges for `payout_id`
    ///
    /// # Arguments
    /// * `payout_id` - Processor payout identifier
    /// * `starting_after` - Opaque cursor: id of the last item already seen
    /// * `limit` - Page size (the processor caps this at 100)
    async fn list_settled_charges(
        &self,
        payout_id: &str,
        starting_after: Option<&str>,
        limit: u32,
    ) -> Result<SettledChargePage>;
}

/// Data sent when creating a billing customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRequest {
    pub student_id: String,
    pub email: String,
    pub name: Option<String>,
    /// Payment that triggered the creation, kept as customer metadata
    pub payment_reference: Option<String>,
}

/// One settled charge inside a payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettledCharge {
    /// Item id, used as the pagination cursor
    pub id: String,
    /// Originating payment reference (payment intent id), when the processor exposes one
    pub payment_reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettledChargePage {
    pub charges: Vec<SettledCharge>,
    pub has_more: bool,
}

impl SettledChargePage {
    /// Cursor for the next page, if the processor reported more items
    pub fn next_cursor(&self) -> Option<&str> {
        if !self.has_more {
            return None;
        }
        self.charges.last().map(|c| c.id.as_str())
    }
}
