use crate::core::AppError;
use actix_web::{error, web, HttpRequest};

/// Extractor configuration that renders payload errors in the `AppError` shape
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(256 * 1024)
        .error_handler(json_error_handler)
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(query_error_handler)
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(path_error_handler)
}

/// Map a JSON body extraction failure to a validation error
pub fn json_error_handler(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    log_error(req, &err);
    AppError::validation(format!("Invalid request body: {}", err)).into()
}

fn query_error_handler(err: error::QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    log_error(req, &err);
    AppError::validation(format!("Invalid query string: {}", err)).into()
}

fn path_error_handler(err: error::PathError, req: &HttpRequest) -> actix_web::Error {
    log_error(req, &err);
    AppError::validation(format!("Invalid path parameter: {}", err)).into()
}

/// Log a rejected request
pub fn log_error(req: &HttpRequest, err: &dyn std::fmt::Display) {
    tracing::debug!(method = %req.method(), path = %req.path(), error = %err, "Rejected request");
}
