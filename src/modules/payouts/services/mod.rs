pub mod payout_matcher;

pub use payout_matcher::{PayoutMatcher, PayoutOutcome};
