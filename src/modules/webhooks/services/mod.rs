pub mod dispatcher;
pub mod idempotency_ledger;
pub mod signature;

pub use dispatcher::{
    AckStatus, Acknowledgement, DispatcherDeps, EnrollmentOutcome, WebhookDispatcher,
};
pub use idempotency_ledger::{Claim, IdempotencyLedger, Reservation};
pub use signature::{sign, SignatureVerifier, SIGNATURE_HEADER};
