pub mod models;
pub mod repositories;
pub mod services;

pub use models::{clean_name, normalize_email, Enrollment, EnrollmentStatus, Student};
pub use repositories::{EnrollmentRepository, StudentRepository};
pub use services::{PartyResolver, PaymentContext};
