pub mod controllers;
pub mod services;

pub use services::{PayoutMatcher, PayoutOutcome};
