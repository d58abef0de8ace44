use super::super::models::TransactionStatus;
use super::super::services::ReconciliationService;
use crate::core::Result;
use actix_web::{get, patch, post, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct StatusOverrideRequest {
    pub status: TransactionStatus,
}

/// GET /admin/transactions/{id}
#[get("/transactions/{id}")]
async fn get_transaction(
    path: web::Path<String>,
    service: web::Data<Arc<ReconciliationService>>,
) -> Result<HttpResponse> {
    let transaction = service.get(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(transaction))
}

/// Manual reconciliation of a payout-linked transaction
///
/// POST /admin/transactions/{id}/reconcile
///
/// # Returns
/// * `200 OK` - Reconciled (or already was)
/// * `404 Not Found` - Unknown transaction
/// * `409 Conflict` - Not linked to a payout yet
#[post("/transactions/{id}/reconcile")]
async fn reconcile_transaction(
    path: web::Path<String>,
    service: web::Data<Arc<ReconciliationService>>,
) -> Result<HttpResponse> {
    let transaction = service.reconcile(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(transaction))
}

/// PATCH /admin/transactions/{id}/status
#[patch("/transactions/{id}/status")]
async fn override_status(
    path: web::Path<String>,
    request: web::Json<StatusOverrideRequest>,
    service: web::Data<Arc<ReconciliationService>>,
) -> Result<HttpResponse> {
    let transaction = service
        .override_status(&path.into_inner(), request.status)
        .await?;
    Ok(HttpResponse::Ok().json(transaction))
}

/// Mount the transaction endpoints inside the admin scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_transaction)
        .service(reconcile_transaction)
        .service(override_status);
}
