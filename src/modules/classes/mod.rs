pub mod models;
pub mod repositories;

pub use models::{ClassOffering, ProductType};
pub use repositories::{ClassRepository, MySqlClassRepository};
