// Test Helper Modules
//
// Shared fixtures for the unit and integration tests: an in-memory
// application, fake processor and notification transports, and event
// payload factories. Include with:
//
//   #[path = "../helpers/mod.rs"]
//   mod helpers;
#![allow(dead_code)]

pub mod fakes;
pub mod test_app;
pub mod test_data;

pub use fakes::*;
pub use test_app::*;
pub use test_data::*;
