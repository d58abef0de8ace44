pub mod models;
pub mod services;

pub use models::{DeliveryReport, Notification};
pub use services::{
    deliver, HttpNotifier, LogNotifier, NotificationService, Notifier, NotifyError, RetryPolicy,
};
