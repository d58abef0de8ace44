pub mod enrollment;
pub mod student;

pub use enrollment::{Enrollment, EnrollmentStatus};
pub use student::{clean_name, normalize_email, Student};
