use super::super::models::IdempotencyStatus;
use super::super::services::{Acknowledgement, WebhookDispatcher, SIGNATURE_HEADER};
use crate::core::{AppError, Result};
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Header set on acknowledgements answered from the idempotency ledger
pub const REPLAY_HEADER: &str = "X-Idempotent-Replay";

/// Query parameters for listing ledger records
#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_status() -> String {
    "failed".to_string()
}

fn default_limit() -> u32 {
    50
}

/// Receive a processor event
///
/// POST /webhooks/processor
///
/// The body is taken as raw bytes so the signature is checked against exactly
/// what the processor sent.
///
/// # Returns
/// * `200 OK` - Event authenticated and acknowledged, whatever the business outcome
/// * `400 Bad Request` - Missing/invalid signature, malformed or incomplete event
/// * `500`/`503` - Storage failure or aborted payout scan; the processor should retry
#[post("/processor")]
async fn receive_event(
    req: HttpRequest,
    body: web::Bytes,
    dispatcher: web::Data<Arc<WebhookDispatcher>>,
) -> Result<HttpResponse> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let ack = dispatcher.handle(signature, &body).await?;

    info!(status = ?ack.status, replayed = ack.replayed, "Webhook acknowledged");
    Ok(acknowledge(ack))
}

fn acknowledge(ack: Acknowledgement) -> HttpResponse {
    let mut response = HttpResponse::Ok();
    if ack.replayed {
        response.insert_header((REPLAY_HEADER, "true"));
    }
    response.json(ack)
}

/// List idempotency ledger records
///
/// GET /admin/webhook-events?status=failed&limit=50
#[get("/webhook-events")]
async fn list_events(
    query: web::Query<ListEventsQuery>,
    dispatcher: web::Data<Arc<WebhookDispatcher>>,
) -> Result<HttpResponse> {
    let status: IdempotencyStatus = query.status.parse().map_err(AppError::Validation)?;
    let records = dispatcher
        .ledger()
        .list(status, query.limit.clamp(1, 500))
        .await?;

    Ok(HttpResponse::Ok().json(records))
}

/// Re-run a failed or stalled event from its stored payload
///
/// POST /admin/webhook-events/{key}/replay
#[post("/webhook-events/{key}/replay")]
async fn replay_event(
    path: web::Path<String>,
    dispatcher: web::Data<Arc<WebhookDispatcher>>,
) -> Result<HttpResponse> {
    let key = path.into_inner();
    info!(key = %key, "Operator replay requested");

    let ack = dispatcher.replay(&key).await?;
    Ok(acknowledge(ack))
}

/// Mount the processor webhook endpoint
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhooks").service(receive_event));
}

/// Mount the ledger endpoints inside the admin scope
pub fn configure_admin(cfg: &mut web::ServiceConfig) {
    cfg.service(list_events).service(replay_event);
}
