pub mod idempotency_repository;

pub use idempotency_repository::{IdempotencyRepository, MySqlIdempotencyRepository};
