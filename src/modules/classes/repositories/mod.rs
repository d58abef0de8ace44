pub mod class_repository;

pub use class_repository::{ClassRepository, MySqlClassRepository};
