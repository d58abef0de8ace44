use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Missing or invalid webhook signature
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Validation errors for business rules and event payloads
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unique constraint violation in storage
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Best-effort collaborator (billing customer, invoicing, notifications) unreachable
    #[error("Downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    /// Payout pagination failed before every charge was collected
    #[error("Reconciliation aborted: {0}")]
    ReconciliationAbort(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unauthorized access
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(serde_json::json!({
            "error": {
                "message": error_message,
                "code": status_code.as_u16(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DownstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::ReconciliationAbort(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest_middleware::Error> for AppError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => AppError::HttpClient(e),
            reqwest_middleware::Error::Middleware(e) => {
                AppError::DownstreamUnavailable(format!("{:#}", e))
            }
        }
    }
}

// Helper functions for common error scenarios
impl AppError {
    pub fn authentication(msg: impl Into<String>) -> Self {
        AppError::Authentication(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn downstream(msg: impl Into<String>) -> Self {
        AppError::DownstreamUnavailable(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Map a sqlx error, turning unique-key violations into `Conflict`
    pub fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::Conflict(format!("{} already exists", what));
            }
        }
        AppError::Database(err)
    }

    /// Errors the payment processor should be invited to retry (non-2xx)
    ///
    /// Storage failures and aborted reconciliations are safe to retry because the
    /// idempotency ledger and the unique constraints prevent double effects.
    pub fn is_retryable_by_processor(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::ReconciliationAbort(_)
        )
    }
}
