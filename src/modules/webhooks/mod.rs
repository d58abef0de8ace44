pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{IdempotencyRecord, IdempotencyStatus, LedgerKey, LedgerKind};
pub use repositories::{IdempotencyRepository, MySqlIdempotencyRepository};
pub use services::{
    AckStatus, Acknowledgement, DispatcherDeps, IdempotencyLedger, Reservation,
    SignatureVerifier, WebhookDispatcher,
};
