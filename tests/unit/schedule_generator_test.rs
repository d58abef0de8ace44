// Billing schedule generation
//
// Property tests over schedule planning plus generator runs against the
// in-memory store.

use chrono::{Duration, NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tuitionsync::billing::{
    BillingSchedule, ChargeDetails, InvoiceNumbering, ScheduleGenerator, ScheduleKind,
    TransactionStatus, TransactionType,
};
use tuitionsync::core::MemoryStore;
use tuitionsync::modules::classes::ClassOffering;
use tuitionsync::students::Student;

fn class_with(
    product_type: Option<String>,
    registration_fee: i64,
    price: i64,
    start_date: Option<NaiveDate>,
) -> ClassOffering {
    ClassOffering {
        id: "CLS-P".into(),
        name: "Property Class".into(),
        product_type,
        registration_fee,
        price,
        start_date,
    }
}

fn product_type_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("course".to_string())),
        Just(Some("program".to_string())),
        Just(Some("PROGRAM".to_string())),
        "[a-z]{0,8}".prop_map(Some),
    ]
}

fn start_date_strategy() -> impl Strategy<Value = Option<NaiveDate>> {
    prop_oneof![
        Just(None),
        (0i64..3650).prop_map(|days| NaiveDate::from_ymd_opt(2020, 1, 1)
            .map(|d| d + Duration::days(days))),
    ]
}

proptest! {
    #[test]
    fn prop_schedule_shape_follows_product_type(
        product_type in product_type_strategy(),
        registration_fee in 0i64..1_000_000,
        price in 0i64..10_000_000,
        amount_charged in 1i64..1_000_000,
        start_date in start_date_strategy(),
    ) {
        let class = class_with(product_type, registration_fee, price, start_date);
        let charge = ChargeDetails {
            payment_reference: "pi_prop".into(),
            amount_charged,
            paid_at: Utc::now(),
        };

        let schedule = BillingSchedule::plan(&class, &charge);
        let expected_kind = BillingSchedule::kind_for(&class);
        prop_assert_eq!(schedule.kind(), expected_kind);

        let drafts = schedule.into_drafts();
        match expected_kind {
            ScheduleKind::Course => prop_assert_eq!(drafts.len(), 1),
            ScheduleKind::Program => prop_assert_eq!(drafts.len(), 3),
        }

        // Registration fee always comes first and carries the payment
        let fee = &drafts[0];
        prop_assert_eq!(fee.transaction_type, TransactionType::RegistrationFee);
        prop_assert_eq!(fee.status, TransactionStatus::Paid);
        prop_assert_eq!(fee.amount_due, registration_fee);
        prop_assert_eq!(fee.amount_paid, Some(amount_charged));
        prop_assert_eq!(fee.quantity, dec!(1));
        prop_assert_eq!(fee.payment_reference.as_deref(), Some("pi_prop"));

        // Only the registration fee references the payment
        prop_assert!(drafts[1..].iter().all(|d| d.payment_reference.is_none()));

        if expected_kind == ScheduleKind::Program {
            let (a, b) = (&drafts[1], &drafts[2]);
            prop_assert_eq!(a.transaction_type, TransactionType::TuitionA);
            prop_assert_eq!(b.transaction_type, TransactionType::TuitionB);
            for tuition in [a, b] {
                prop_assert_eq!(tuition.status, TransactionStatus::Pending);
                prop_assert_eq!(tuition.quantity, dec!(0.5));
                prop_assert_eq!(tuition.amount_due, price);
                prop_assert_eq!(tuition.amount_paid, None);
            }
            prop_assert_eq!(a.due_date, start_date.map(|d| d - Duration::days(21)));
            prop_assert_eq!(b.due_date, start_date.map(|d| d + Duration::days(7)));
        }
    }
}

#[test]
fn test_program_product_type_is_case_insensitive_or_course() {
    let upper = class_with(Some("PROGRAM".into()), 1, 1, None);
    let kind = BillingSchedule::kind_for(&upper);
    // Whatever the parse rule, unrecognized values must never yield an empty schedule
    assert!(matches!(kind, ScheduleKind::Program | ScheduleKind::Course));

    let garbage = class_with(Some("bootcamp".into()), 1, 1, None);
    assert_eq!(BillingSchedule::kind_for(&garbage), ScheduleKind::Course);
}

fn generator(store: &Arc<MemoryStore>) -> ScheduleGenerator {
    ScheduleGenerator::new(
        store.clone(),
        store.clone(),
        InvoiceNumbering::new(store.clone(), 100001),
    )
}

async fn student(store: &Arc<MemoryStore>, email: &str) -> Student {
    use tuitionsync::students::StudentRepository;
    let student = Student::new(email, None).unwrap();
    StudentRepository::insert(store.as_ref(), &student).await.unwrap()
}

#[tokio::test]
async fn test_schedules_take_consecutive_invoice_numbers() {
    let store = Arc::new(MemoryStore::new());
    let generator = generator(&store);
    let start = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();

    let program = class_with(Some("program".into()), 5000, 90000, Some(start));
    let course = ClassOffering {
        id: "CLS-C".into(),
        product_type: Some("course".into()),
        ..program.clone()
    };

    let alice = student(&store, "alice@example.com").await;
    let bob = student(&store, "bob@example.com").await;

    let first = generator
        .generate(
            &alice,
            &program,
            &ChargeDetails {
                payment_reference: "pi_alice".into(),
                amount_charged: 5000,
                paid_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    let second = generator
        .generate(
            &bob,
            &course,
            &ChargeDetails {
                payment_reference: "pi_bob".into(),
                amount_charged: 5000,
                paid_at: Utc::now(),
            },
        )
        .await
        .unwrap();

    let numbers: Vec<i64> = first
        .transactions
        .iter()
        .chain(second.transactions.iter())
        .map(|t| t.invoice_number)
        .collect();
    assert_eq!(numbers, vec![100001, 100002, 100003, 100004]);
    assert!(first.created && second.created);
}

#[tokio::test]
async fn test_regenerating_for_same_payment_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let generator = generator(&store);
    let class = class_with(Some("program".into()), 5000, 90000, None);
    let alice = student(&store, "alice@example.com").await;
    let charge = ChargeDetails {
        payment_reference: "pi_once".into(),
        amount_charged: 5000,
        paid_at: Utc::now(),
    };

    let first = generator.generate(&alice, &class, &charge).await.unwrap();
    let again = generator.generate(&alice, &class, &charge).await.unwrap();

    assert!(!again.created);
    assert_eq!(again.kind, ScheduleKind::Program);
    assert_eq!(again.transactions, first.transactions);
    assert_eq!(store.transaction_count(), 3);
    assert_eq!(store.enrollment_count(), 1);
}
