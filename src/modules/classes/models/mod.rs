pub mod class_offering;

pub use class_offering::{ClassOffering, ProductType};
