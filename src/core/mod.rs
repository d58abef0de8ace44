pub mod error;
pub mod memory_store;

pub use error::{AppError, Result};
pub use memory_store::MemoryStore;
