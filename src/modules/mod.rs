pub mod billing;
pub mod classes;
pub mod health;
pub mod notifications;
pub mod payouts;
pub mod processor;
pub mod students;
pub mod webhooks;
