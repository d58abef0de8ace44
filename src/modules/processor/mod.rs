pub mod services;

pub use services::{
    BillingCustomerGateway, CustomerRequest, SettledCharge, SettledChargePage,
    SettledChargeSource, StripeClient,
};
