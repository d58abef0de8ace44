// Test Data Factory
//
// Processor event payloads, catalog classes and signed webhook requests.
// Identifiers are random so tests never collide.

use super::test_app::WEBHOOK_SECRET;
use actix_web::test::TestRequest;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tuitionsync::modules::classes::ClassOffering;
use tuitionsync::webhooks::services::{sign, SIGNATURE_HEADER};
use uuid::Uuid;

pub const REGISTRATION_FEE: i64 = 5000;
pub const PROGRAM_PRICE: i64 = 120000;

pub struct TestDataFactory;

impl TestDataFactory {
    pub fn random_intent() -> String {
        format!("pi_{}", Uuid::new_v4().simple())
    }

    pub fn random_event_id() -> String {
        format!("evt_{}", Uuid::new_v4().simple())
    }

    pub fn course_class(id: &str) -> ClassOffering {
        ClassOffering {
            id: id.to_string(),
            name: format!("Course {}", id),
            product_type: Some("course".into()),
            registration_fee: REGISTRATION_FEE,
            price: 0,
            start_date: None,
        }
    }

    pub fn program_class(id: &str, start_date: NaiveDate) -> ClassOffering {
        ClassOffering {
            id: id.to_string(),
            name: format!("Program {}", id),
            product_type: Some("program".into()),
            registration_fee: REGISTRATION_FEE,
            price: PROGRAM_PRICE,
            start_date: Some(start_date),
        }
    }

    /// Paid `checkout.session.completed` for `email` enrolling in `class_id`
    pub fn checkout_completed(intent: &str, email: &str, class_id: &str) -> Value {
        Self::event(
            "checkout.session.completed",
            json!({
                "id": format!("cs_{}", Uuid::new_v4().simple()),
                "object": "checkout.session",
                "payment_intent": intent,
                "payment_status": "paid",
                "amount_total": REGISTRATION_FEE,
                "customer": null,
                "customer_details": { "email": email, "name": "Test Student" },
                "metadata": { "class_id": class_id },
            }),
        )
    }

    /// Checkout session object with arbitrary overrides
    pub fn checkout_with(session: Value) -> Value {
        Self::event("checkout.session.completed", session)
    }

    pub fn payout_paid(payout_id: &str, arrival_date: NaiveDate) -> Value {
        let arrival = arrival_date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default();
        Self::event(
            "payout.paid",
            json!({
                "id": payout_id,
                "object": "payout",
                "arrival_date": arrival,
                "status": "paid",
            }),
        )
    }

    pub fn event(event_type: &str, object: Value) -> Value {
        json!({
            "id": Self::random_event_id(),
            "object": "event",
            "type": event_type,
            "created": Utc::now().timestamp(),
            "data": { "object": object },
        })
    }
}

/// Signature header value for `body`, timestamped now
pub fn signature_for(body: &[u8]) -> String {
    sign(WEBHOOK_SECRET, Utc::now().timestamp(), body).expect("Failed to sign test payload")
}

/// POST /webhooks/processor with a valid signature
pub fn signed_webhook(event: &Value) -> TestRequest {
    let body = serde_json::to_vec(event).expect("Failed to encode event");
    let signature = signature_for(&body);
    TestRequest::post()
        .uri("/webhooks/processor")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(body)
}

/// POST /webhooks/processor with a caller-chosen signature header
pub fn webhook_with_signature(event: &Value, signature: Option<&str>) -> TestRequest {
    let body = serde_json::to_vec(event).expect("Failed to encode event");
    let mut req = TestRequest::post()
        .uri("/webhooks/processor")
        .insert_header(("content-type", "application/json"));
    if let Some(signature) = signature {
        req = req.insert_header((SIGNATURE_HEADER, signature.to_string()));
    }
    req.set_payload(body)
}
