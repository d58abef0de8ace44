// Admin API
//
// Operator endpoints behind the X-API-Key guard: ledger inspection and
// replay, manual payout reconciliation, transaction reconciliation and
// status overrides.

#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::{test, App};
use helpers::*;
use serde_json::{json, Value};
use tuitionsync::middleware::API_KEY_HEADER;

fn admin_get(uri: &str) -> test::TestRequest {
    test::TestRequest::get()
        .uri(uri)
        .insert_header((API_KEY_HEADER, ADMIN_KEY))
}

fn admin_post(uri: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .insert_header((API_KEY_HEADER, ADMIN_KEY))
}

#[actix_web::test]
async fn test_admin_routes_require_a_valid_key() {
    let ctx = TestApp::with_admin_key();
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    let missing = test::TestRequest::get()
        .uri("/admin/webhook-events")
        .to_request();
    let err = test::try_call_service(&app, missing).await.unwrap_err();
    assert_eq!(err.error_response().status(), 401);

    let wrong = test::TestRequest::get()
        .uri("/admin/webhook-events")
        .insert_header((API_KEY_HEADER, "not-the-key"))
        .to_request();
    let err = test::try_call_service(&app, wrong).await.unwrap_err();
    assert_eq!(err.error_response().status(), 401);

    let ok = test::call_service(&app, admin_get("/admin/webhook-events").to_request()).await;
    assert_eq!(ok.status(), 200);

    // Health stays public
    let health = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(health.status(), 200);
}

#[actix_web::test]
async fn test_admin_scope_is_closed_without_configured_key() {
    let ctx = TestApp::new();
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    let req = admin_get("/admin/webhook-events").to_request();
    let err = test::try_call_service(&app, req).await.unwrap_err();
    assert_eq!(err.error_response().status(), 401);
}

#[actix_web::test]
async fn test_failed_events_are_listed_and_replayable() {
    let ctx = TestApp::with_admin_key();
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    // Class not in the catalog yet, so the event is deferred
    let intent = TestDataFactory::random_intent();
    let event = TestDataFactory::checkout_completed(&intent, "mona@example.com", "CLS-NEW");
    let resp = test::call_service(&app, signed_webhook(&event).to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "deferred");

    let resp = test::call_service(
        &app,
        admin_get("/admin/webhook-events?status=failed").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let records: Value = test::read_body_json(resp).await;
    let key = format!("payment_intent:{}", intent);
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["idempotency_key"], key);
    assert_eq!(records[0]["status"], "failed");
    // Internal claim data stays private
    assert!(records[0].get("claim_token").is_none());
    assert!(records[0].get("payload").is_none());

    ctx.store.add_class(TestDataFactory::course_class("CLS-NEW"));
    let resp = test::call_service(
        &app,
        admin_post(&format!("/admin/webhook-events/{}/replay", key)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "processed");
    assert_eq!(ctx.store.transaction_count(), 1);

    // Replaying a completed event answers from the ledger
    let resp = test::call_service(
        &app,
        admin_post(&format!("/admin/webhook-events/{}/replay", key)).to_request(),
    )
    .await;
    assert_eq!(resp.headers().get("X-Idempotent-Replay").unwrap(), "true");
    assert_eq!(ctx.store.transaction_count(), 1);
}

#[actix_web::test]
async fn test_bad_ledger_queries_are_rejected() {
    let ctx = TestApp::with_admin_key();
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    let resp = test::call_service(
        &app,
        admin_get("/admin/webhook-events?status=exploded").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = test::call_service(
        &app,
        admin_post("/admin/webhook-events/nonsense/replay").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = test::call_service(
        &app,
        admin_post("/admin/webhook-events/payout:po_missing/replay").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_manual_payout_reconciliation_and_transaction_lifecycle() {
    let ctx = TestApp::with_admin_key();
    ctx.store.add_class(TestDataFactory::course_class("CLS-OPS"));
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    let intent = TestDataFactory::random_intent();
    let event = TestDataFactory::checkout_completed(&intent, "ned@example.com", "CLS-OPS");
    ctx.dispatcher()
        .dispatch(&serde_json::to_vec(&event).unwrap())
        .await
        .unwrap();
    let transaction_id = ctx.store.transactions()[0].id.clone();

    // Not linked yet
    let resp = test::call_service(
        &app,
        admin_post(&format!("/admin/transactions/{}/reconcile", transaction_id)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 409);

    ctx.processor.add_payout("po_ops", &[intent.as_str()]);
    let resp = test::call_service(
        &app,
        admin_post("/admin/payouts/po_ops/reconcile?arrival_date=2026-10-20").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let outcome: Value = test::read_body_json(resp).await;
    assert_eq!(outcome["matched_count"], 1);
    assert_eq!(outcome["already_linked"], false);

    let resp = test::call_service(
        &app,
        admin_get("/admin/payouts/po_ops/transactions").to_request(),
    )
    .await;
    let linked: Value = test::read_body_json(resp).await;
    assert_eq!(linked[0]["id"], transaction_id);
    assert_eq!(linked[0]["payout_date"], "2026-10-20");

    let resp = test::call_service(
        &app,
        admin_post(&format!("/admin/transactions/{}/reconcile", transaction_id)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let reconciled: Value = test::read_body_json(resp).await;
    assert_eq!(reconciled["reconciled"], true);
    assert!(reconciled["reconciliation_date"].is_string());

    let resp = test::call_service(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/admin/transactions/{}/status", transaction_id))
            .insert_header((API_KEY_HEADER, ADMIN_KEY))
            .set_json(json!({ "status": "refunded" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["status"], "refunded");

    let resp = test::call_service(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/admin/transactions/{}/status", transaction_id))
            .insert_header((API_KEY_HEADER, ADMIN_KEY))
            .set_json(json!({ "status": "lost" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = test::call_service(&app, admin_get("/admin/transactions/unknown").to_request()).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_manual_payout_scan_failure_is_service_unavailable() {
    let ctx = TestApp::with_admin_key();
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    ctx.processor.add_payout("po_down", &["pi_1"]);
    ctx.processor.fail_listing_from_call(1);

    let resp = test::call_service(
        &app,
        admin_post("/admin/payouts/po_down/reconcile").to_request(),
    )
    .await;
    assert_eq!(resp.status(), 503);
}
