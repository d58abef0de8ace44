use super::super::services::PayoutMatcher;
use crate::core::Result;
use actix_web::{get, post, web, HttpResponse};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ReconcileQuery {
    /// Bank arrival date, defaults to today
    pub arrival_date: Option<NaiveDate>,
}

/// Operator-triggered payout reconciliation
///
/// POST /admin/payouts/{payout_id}/reconcile?arrival_date=YYYY-MM-DD
///
/// # Returns
/// * `200 OK` - `{payout_id, matched_count, already_linked}`
/// * `503 Service Unavailable` - Processor scan failed, nothing was written
#[post("/payouts/{payout_id}/reconcile")]
async fn reconcile_payout(
    path: web::Path<String>,
    query: web::Query<ReconcileQuery>,
    matcher: web::Data<Arc<PayoutMatcher>>,
) -> Result<HttpResponse> {
    let payout_id = path.into_inner();
    let arrival_date = query
        .arrival_date
        .unwrap_or_else(|| Utc::now().date_naive());

    info!(payout_id = %payout_id, %arrival_date, "Manual payout reconciliation requested");
    let outcome = matcher.reconcile(&payout_id, arrival_date).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// GET /admin/payouts/{payout_id}/transactions
#[get("/payouts/{payout_id}/transactions")]
async fn list_payout_transactions(
    path: web::Path<String>,
    matcher: web::Data<Arc<PayoutMatcher>>,
) -> Result<HttpResponse> {
    let transactions = matcher.linked_transactions(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

/// Mount the payout endpoints inside the admin scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(reconcile_payout).service(list_payout_transactions);
}
