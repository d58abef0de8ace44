pub mod invoice_numbering;
pub mod invoice_publisher;
pub mod reconciliation_service;
pub mod schedule_generator;

pub use invoice_numbering::InvoiceNumbering;
pub use invoice_publisher::{HttpInvoicePublisher, InvoicePublisher, NoopInvoicePublisher};
pub use reconciliation_service::ReconciliationService;
pub use schedule_generator::{GeneratedSchedule, ScheduleGenerator};
