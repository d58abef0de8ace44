pub mod notification_service;
pub mod notifier;
pub mod retry;

pub use notification_service::NotificationService;
pub use notifier::{HttpNotifier, LogNotifier, Notifier, NotifyError};
pub use retry::{deliver, RetryPolicy};
