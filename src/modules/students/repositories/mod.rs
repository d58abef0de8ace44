pub mod enrollment_repository;
pub mod student_repository;

pub use enrollment_repository::{EnrollmentRepository, MySqlEnrollmentRepository};
pub use student_repository::{MySqlStudentRepository, StudentRepository};
