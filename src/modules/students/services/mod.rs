pub mod party_resolver;

pub use party_resolver::{PartyResolver, PaymentContext};
