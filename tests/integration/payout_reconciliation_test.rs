// Payout reconciliation flow
//
// Enroll through the webhook endpoint, then deliver payout events and check
// which transactions get linked. The test processor serves two items per page.

#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::{test, App};
use chrono::NaiveDate;
use helpers::*;
use serde_json::Value;
use std::sync::Arc;
use tuitionsync::billing::PayoutState;
use tuitionsync::core::AppError;
use tuitionsync::payouts::PayoutMatcher;
use tuitionsync::webhooks::{AckStatus, IdempotencyStatus, LedgerKey};

fn arrival() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
}

/// Enroll one student per intent into a course class
async fn enroll_all(ctx: &TestApp, intents: &[String]) {
    for (i, intent) in intents.iter().enumerate() {
        let event = TestDataFactory::checkout_completed(
            intent,
            &format!("payer{}@example.com", i),
            "CLS-PAY",
        );
        let ack = ctx
            .dispatcher()
            .dispatch(&serde_json::to_vec(&event).unwrap())
            .await
            .unwrap();
        assert_eq!(ack.status, AckStatus::Processed);
    }
}

fn intents(n: usize) -> Vec<String> {
    (0..n).map(|_| TestDataFactory::random_intent()).collect()
}

#[actix_web::test]
async fn test_payout_links_every_matching_transaction() {
    let ctx = TestApp::new();
    ctx.store.add_class(TestDataFactory::course_class("CLS-PAY"));
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    let paid = intents(3);
    enroll_all(&ctx, &paid).await;

    // Two of three payments settle in this payout, alongside a fee line and
    // a charge this system never saw
    ctx.processor
        .add_payout("po_1", &[paid[0].as_str(), "pi_foreign", paid[2].as_str()]);
    ctx.processor.add_unreferenced_item("po_1");

    let event = TestDataFactory::payout_paid("po_1", arrival());
    let resp = test::call_service(&app, signed_webhook(&event).to_request()).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "processed");
    assert_eq!(body["result"]["payout_id"], "po_1");
    assert_eq!(body["result"]["matched_count"], 2);
    assert_eq!(body["result"]["already_linked"], false);

    // Four items at two per page
    assert_eq!(ctx.processor.list_calls(), 2);

    for tx in ctx.store.transactions() {
        let reference = tx.payment_reference.clone().unwrap();
        if reference == paid[1] {
            assert_eq!(tx.payout_state(), PayoutState::Unlinked);
        } else {
            assert_eq!(tx.payout_id.as_deref(), Some("po_1"));
            assert_eq!(tx.payout_date, Some(arrival()));
            assert_eq!(tx.payout_state(), PayoutState::Linked);
        }
    }

    let alert = ctx
        .notifier
        .wait_for("payout_reconciled")
        .await
        .expect("payout summary was not delivered");
    assert_eq!(alert.recipient, OPS_EMAIL);
    assert_eq!(alert.data["matched_count"], 2);
}

#[actix_web::test]
async fn test_redelivered_payout_is_not_rescanned() {
    let ctx = TestApp::new();
    ctx.store.add_class(TestDataFactory::course_class("CLS-PAY"));
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    let paid = intents(1);
    enroll_all(&ctx, &paid).await;
    ctx.processor.add_payout("po_2", &[paid[0].as_str()]);

    let event = TestDataFactory::payout_paid("po_2", arrival());
    let first: Value =
        test::read_body_json(test::call_service(&app, signed_webhook(&event).to_request()).await)
            .await;
    let calls = ctx.processor.list_calls();

    let second = test::call_service(&app, signed_webhook(&event).to_request()).await;
    assert_eq!(second.headers().get("X-Idempotent-Replay").unwrap(), "true");
    let second: Value = test::read_body_json(second).await;

    assert_eq!(first, second);
    assert_eq!(ctx.processor.list_calls(), calls);
}

#[actix_web::test]
async fn test_pagination_failure_links_nothing_and_invites_retry() {
    let ctx = TestApp::new();
    ctx.store.add_class(TestDataFactory::course_class("CLS-PAY"));
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    let paid = intents(4);
    enroll_all(&ctx, &paid).await;
    let refs: Vec<&str> = paid.iter().map(String::as_str).collect();
    ctx.processor.add_payout("po_3", &refs);

    // First page succeeds, second page fails
    ctx.processor.fail_listing_from_call(2);

    let event = TestDataFactory::payout_paid("po_3", arrival());
    let resp = test::call_service(&app, signed_webhook(&event).to_request()).await;
    assert_eq!(resp.status(), 503);

    assert!(ctx
        .store
        .transactions()
        .iter()
        .all(|t| t.payout_id.is_none()));

    let record = ctx
        .dispatcher()
        .ledger()
        .find(&LedgerKey::payout("po_3"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, IdempotencyStatus::Failed);

    // Processor retries once the listing recovers
    ctx.processor.heal_listing();
    let resp = test::call_service(&app, signed_webhook(&event).to_request()).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["result"]["matched_count"], 4);
    assert!(ctx
        .store
        .transactions()
        .iter()
        .all(|t| t.payout_id.as_deref() == Some("po_3")));
}

#[actix_web::test]
async fn test_payout_without_known_payments_matches_nothing() {
    let ctx = TestApp::new();
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    ctx.processor.add_payout("po_4", &["pi_elsewhere"]);
    ctx.processor.add_unreferenced_item("po_4");

    let event = TestDataFactory::payout_paid("po_4", arrival());
    let resp = test::call_service(&app, signed_webhook(&event).to_request()).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["result"]["matched_count"], 0);
}

#[actix_web::test]
async fn test_transaction_keeps_its_first_payout() {
    let ctx = TestApp::new();
    ctx.store.add_class(TestDataFactory::course_class("CLS-PAY"));
    let app = test::init_service(App::new().configure(ctx.routes())).await;

    let paid = intents(2);
    enroll_all(&ctx, &paid).await;
    ctx.processor.add_payout("po_a", &[paid[0].as_str()]);
    ctx.processor
        .add_payout("po_b", &[paid[0].as_str(), paid[1].as_str()]);

    for payout in ["po_a", "po_b"] {
        let event = TestDataFactory::payout_paid(payout, arrival());
        let resp = test::call_service(&app, signed_webhook(&event).to_request()).await;
        assert_eq!(resp.status(), 200);
    }

    let by_ref = |r: &str| {
        ctx.store
            .transactions()
            .into_iter()
            .find(|t| t.payment_reference.as_deref() == Some(r))
            .unwrap()
    };
    assert_eq!(by_ref(&paid[0]).payout_id.as_deref(), Some("po_a"));
    assert_eq!(by_ref(&paid[1]).payout_id.as_deref(), Some("po_b"));
}

#[tokio::test]
async fn test_matcher_reports_already_linked_payout() {
    let ctx = TestApp::new();
    let matcher = PayoutMatcher::new(ctx.store.clone(), ctx.processor.clone(), 100, 10);

    use tuitionsync::billing::TransactionRepository;
    let store = ctx.store.clone();
    ctx.store.add_class(TestDataFactory::course_class("CLS-PAY"));

    // Seed one paid transaction through the dispatcher
    let intent = TestDataFactory::random_intent();
    let event = TestDataFactory::checkout_completed(&intent, "zed@example.com", "CLS-PAY");
    ctx.dispatcher()
        .dispatch(&serde_json::to_vec(&event).unwrap())
        .await
        .unwrap();
    ctx.processor.add_payout("po_m", &[intent.as_str()]);

    let first = matcher.reconcile("po_m", arrival()).await.unwrap();
    assert_eq!(first.matched_count, 1);
    assert!(!first.already_linked);

    let again = matcher.reconcile("po_m", arrival()).await.unwrap();
    assert!(again.already_linked);
    assert_eq!(store.count_by_payout("po_m").await.unwrap(), 1);
}

#[tokio::test]
async fn test_page_ceiling_aborts_reconciliation() {
    let ctx = TestApp::new();
    let refs: Vec<String> = (0..10).map(|i| format!("pi_{}", i)).collect();
    let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
    ctx.processor.add_payout("po_big", &refs);

    let matcher = PayoutMatcher::new(
        ctx.store.clone(),
        Arc::clone(&ctx.processor) as Arc<dyn tuitionsync::modules::processor::SettledChargeSource>,
        2,
        3,
    );

    let err = matcher.reconcile("po_big", arrival()).await.unwrap_err();
    assert!(matches!(err, AppError::ReconciliationAbort(_)));
}
