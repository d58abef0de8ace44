pub mod notification;

pub use notification::{
    DeliveryReport, Notification, ENROLLMENT_CONFIRMATION, PAYOUT_RECONCILED, WEBHOOK_DEFERRED,
};
