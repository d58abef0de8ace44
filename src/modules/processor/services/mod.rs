pub mod capabilities;
pub mod stripe_client;

pub use capabilities::{
    BillingCustomerGateway, CustomerRequest, SettledCharge, SettledChargePage,
    SettledChargeSource,
};
pub use stripe_client::StripeClient;
