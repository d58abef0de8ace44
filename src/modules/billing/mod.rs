pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{
    BillingSchedule, ChargeDetails, PayoutState, ScheduleKind, Transaction, TransactionDraft,
    TransactionStatus, TransactionType,
};
pub use repositories::{
    InvoiceSequenceRepository, MySqlInvoiceSequenceRepository, MySqlTransactionRepository,
    TransactionRepository,
};
pub use services::{
    GeneratedSchedule, HttpInvoicePublisher, InvoiceNumbering, InvoicePublisher,
    NoopInvoicePublisher, ReconciliationService, ScheduleGenerator,
};
