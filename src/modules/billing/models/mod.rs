pub mod schedule;
pub mod transaction;

pub use schedule::{
    tuition_due_dates, BillingSchedule, ChargeDetails, ScheduleKind, TransactionDraft,
};
pub use transaction::{PayoutState, Transaction, TransactionStatus, TransactionType};
