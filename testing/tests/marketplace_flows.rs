//! End-to-end repository workflows against the in-memory marketplace.

#![allow(clippy::unwrap_used)]

use edumarket_core::environment::Clock;
use edumarket_core::model::{CheckoutLine, FulfillmentOutcome, NewPayment, PaymentConfirmation, PurchaseRequest};
use edumarket_core::repository::{CartRepository, CommerceRepository, ReportRepository, UserRepository};
use edumarket_core::{LedgerKind, MarketError, Money, PageRequest, PaymentPurpose, PaymentStatus};
use edumarket_testing::{InMemoryMarketplace, fixtures, test_clock};

const COMMISSION_BPS: u32 = 2_000;

#[tokio::test]
async fn test_guardian_buys_for_linked_student() {
    let store = InMemoryMarketplace::new();
    let now = test_clock().now();
    let teacher = fixtures::teacher(&store, "grace@example.com", now).await.unwrap();
    let student = fixtures::student(&store, "ada@example.com", now).await.unwrap();
    let parent = fixtures::guardian(&store, "parent@example.com", now).await.unwrap();
    let course = fixtures::published_course(&store, &teacher, "Algebra", 2_000, now).await.unwrap();

    let link = store.create_link(parent.id, student.id, now).await.unwrap();
    assert_eq!(link.student_email, "ada@example.com");
    assert!(!store.is_guardian_of(parent.id, student.id).await.unwrap());
    store.respond_link(link.id, true, now).await.unwrap();
    assert!(store.is_guardian_of(parent.id, student.id).await.unwrap());
    assert!(matches!(
        store.respond_link(link.id, false, now).await,
        Err(MarketError::InvalidTransition { .. })
    ));

    store.fund_wallet(parent.id, Money::from_cents(5_000), now).unwrap();
    let order = store
        .purchase_with_wallet(
            PurchaseRequest {
                buyer_id: parent.id,
                beneficiary_id: student.id,
                lines: vec![CheckoutLine {
                    content_id: course.id,
                    teacher_id: teacher.id,
                    price: course.price,
                }],
                commission_bps: COMMISSION_BPS,
            },
            now,
        )
        .await
        .unwrap();

    assert_eq!(order.beneficiary_id, student.id);
    assert!(store.owns(student.id, course.id).await.unwrap());
    assert!(!store.owns(parent.id, course.id).await.unwrap());
    assert_eq!(store.library(student.id).await.unwrap()[0].order_id, order.id);

    let parent_wallet = store.wallet(parent.id, PageRequest::default()).await.unwrap();
    assert_eq!(parent_wallet.balance, Money::from_cents(3_000));
    let teacher_wallet = store.wallet(teacher.id, PageRequest::default()).await.unwrap();
    assert_eq!(teacher_wallet.balance, Money::from_cents(1_600));
    assert_eq!(teacher_wallet.entries.items[0].kind, LedgerKind::Earning);
    assert_eq!(teacher_wallet.entries.items[0].reference, Some(order.id.to_string()));
}

#[tokio::test]
async fn test_gateway_checkout_fulfills_once() {
    let store = InMemoryMarketplace::new();
    let now = test_clock().now();
    let teacher = fixtures::teacher(&store, "grace@example.com", now).await.unwrap();
    let student = fixtures::student(&store, "ada@example.com", now).await.unwrap();
    let course = fixtures::published_course(&store, &teacher, "Algebra", 1_500, now).await.unwrap();
    store.add_to_cart(student.id, course.id, now).await.unwrap();

    let payment = store
        .create_payment(
            NewPayment {
                user_id: student.id,
                beneficiary_id: student.id,
                purpose: PaymentPurpose::Checkout,
                amount: course.price,
                lines: vec![CheckoutLine {
                    content_id: course.id,
                    teacher_id: teacher.id,
                    price: course.price,
                }],
                commission_bps: COMMISSION_BPS,
            },
            now,
        )
        .await
        .unwrap();
    store
        .attach_checkout_session(payment.id, "cs_1", "https://pay.example.com/cs_1", now)
        .await
        .unwrap();

    let confirmation = PaymentConfirmation {
        event_id: "evt_1".into(),
        payment_id: payment.id,
        gateway_reference: "ch_1".into(),
        amount: course.price,
    };
    let first = store.confirm_payment(confirmation.clone(), now).await.unwrap();
    assert!(matches!(
        &first,
        FulfillmentOutcome::Fulfilled { payment, order: Some(order) }
            if payment.status == PaymentStatus::Succeeded && payment.order_id == Some(order.id)
    ));
    assert!(store.cart_lines(student.id).await.unwrap().is_empty());

    let replay = store.confirm_payment(confirmation, now).await.unwrap();
    assert!(matches!(replay, FulfillmentOutcome::AlreadyProcessed { .. }));

    let failed_late = store.fail_payment(payment.id, "evt_2", "card declined", now).await.unwrap();
    assert_eq!(failed_late.status, PaymentStatus::Succeeded);

    let summary = store.dashboard().await.unwrap();
    assert_eq!(summary.order_count, 1);
    assert_eq!(summary.platform_fees, Money::from_cents(300));
    assert_eq!(summary.teacher_earnings, Money::from_cents(1_200));
    assert_eq!(summary.wallet_liability, Money::from_cents(1_200));

    let top = store.top_content(5).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].revenue, Money::from_cents(1_500));
    let months = store.revenue_by_month(12, now).await.unwrap();
    assert_eq!(months.len(), 1);
    assert_eq!(months[0].order_count, 1);
}

#[tokio::test]
async fn test_withdrawal_holds_then_pays() {
    let store = InMemoryMarketplace::new();
    let now = test_clock().now();
    let teacher = fixtures::teacher(&store, "grace@example.com", now).await.unwrap();
    let admin = fixtures::admin(&store, "root@example.com", now).await.unwrap();
    store.fund_wallet(teacher.id, Money::from_cents(4_000), now).unwrap();

    let too_much = store.request_withdrawal(teacher.id, Money::from_cents(4_001), now).await;
    assert!(matches!(too_much, Err(MarketError::InsufficientFunds { .. })));

    let withdrawal = store
        .request_withdrawal(teacher.id, Money::from_cents(2_500), now)
        .await
        .unwrap();
    let summary = store.dashboard().await.unwrap();
    assert_eq!(summary.pending_withdrawals, 1);
    assert_eq!(summary.pending_withdrawal_amount, Money::from_cents(2_500));

    let paid = store.approve_withdrawal(withdrawal.id, admin.id, now).await.unwrap();
    assert_eq!(paid.processed_by, Some(admin.id));
    let wallet = store.wallet(teacher.id, PageRequest::default()).await.unwrap();
    assert_eq!(wallet.balance, Money::from_cents(1_500));
    assert_eq!(store.dashboard().await.unwrap().pending_withdrawals, 0);
}
