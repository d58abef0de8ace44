//! TuitionSync payment reconciliation engine
//!
//! Turns payment processor events into students, enrollments and billing
//! schedules, and matches bank payouts back to the transactions they settle.

pub mod app;
pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

// Re-export commonly used types
pub use app::{AppState, Collaborators, Repositories, Storage};
pub use modules::billing;
pub use modules::payouts;
pub use modules::students;
pub use modules::webhooks;
