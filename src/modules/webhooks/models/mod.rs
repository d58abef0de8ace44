pub mod event;
pub mod idempotency_record;

pub use event::{
    CheckoutSession, EnrollmentEvent, EventEnvelope, PayoutEvent, RoutedEvent,
    CHECKOUT_ASYNC_SUCCEEDED, CHECKOUT_COMPLETED, PAYOUT_PAID,
};
pub use idempotency_record::{IdempotencyRecord, IdempotencyStatus, LedgerKey, LedgerKind};
