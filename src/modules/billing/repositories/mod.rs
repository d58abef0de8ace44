pub mod invoice_sequence_repository;
pub mod transaction_repository;

pub use invoice_sequence_repository::{
    InvoiceSequenceRepository, MySqlInvoiceSequenceRepository, INVOICE_SEQUENCE,
};
pub use transaction_repository::{
    MySqlTransactionRepository, TransactionRepository, LINK_CHUNK_SIZE,
};
