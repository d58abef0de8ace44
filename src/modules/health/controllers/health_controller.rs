use crate::app::Storage;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

/// Health check response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
}

/// Readiness probe response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub storage: String,
}

/// GET /health - Liveness probe
/// Returns 200 if the application can respond to requests
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "tuitionsync".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /ready - Readiness probe
/// Returns 503 while the backing store cannot serve queries
pub async fn readiness_check(storage: web::Data<Storage>) -> impl Responder {
    let ready = match storage.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Storage readiness check failed: {}", e);
            false
        }
    };

    let response = ReadinessResponse {
        ready,
        storage: storage.backend().to_string(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

/// Configure health check routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check));
}
