pub mod auth;
pub mod error_handler;
pub mod request_id;

pub use auth::{hash_api_key, verify_api_key, AdminKeyAuth, API_KEY_HEADER};
pub use error_handler::{json_config, json_error_handler, log_error, path_config, query_config};
pub use request_id::{RequestId, RequestIdValue, REQUEST_ID_HEADER};
