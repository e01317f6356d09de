//! Cart, checkout, webhook and withdrawal tests.
//!
//! Every test runs the real router over the in-memory marketplace with the
//! mock payment gateway; webhooks are signed with the test secret.
//!
//! Run with: `cargo test -p edumarket-server --test payment_api_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

mod common;

use axum::http::StatusCode;
use common::{CHECKOUT_BASE, Harness, succeeded};
use serde_json::{Value, json};

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
async fn test_cart_rules() {
    let h = Harness::new();
    let (grace, teacher) = h.teacher("grace@example.com").await;
    let (_, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    let book = h.course(&grace, "Dragon book", 2_500).await;

    h.post("/api/cart/items", &teacher)
        .json(&json!({ "content_id": course.id }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    h.add_to_cart(&student, &course).await;
    h.add_to_cart(&student, &book).await;
    let cart: Value = h.get("/api/cart", &student).await.json();
    assert_eq!(cart["summary"]["item_count"], 2);
    assert_eq!(cart["summary"]["subtotal"], 7_400);

    h.delete(&format!("/api/cart/items/{}", book.id), &student)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.delete(&format!("/api/cart/items/{}", book.id), &student)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    h.delete("/api/cart", &student).await.assert_status(StatusCode::NO_CONTENT);
    let cart: Value = h.get("/api/cart", &student).await.json();
    assert!(cart["lines"].as_array().unwrap().is_empty());

    h.post("/api/checkout", &student)
        .json(&json!({ "method": "wallet" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

// ============================================================================
// Wallet checkout
// ============================================================================

#[tokio::test]
async fn test_wallet_checkout_splits_revenue() {
    let h = Harness::new();
    let (grace, teacher) = h.teacher("grace@example.com").await;
    let (ada, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    h.fund(ada.id, 10_000);

    h.add_to_cart(&student, &course).await;
    let checkout = h.post("/api/checkout", &student).json(&json!({ "method": "wallet" })).await;
    checkout.assert_status(StatusCode::CREATED);
    let order: Value = checkout.json();
    assert_eq!(order["total"], 4_900);
    assert_eq!(order["platform_fee"], 980);
    assert_eq!(order["items"][0]["teacher_share"], 3_920);

    let wallet: Value = h.get("/api/wallet", &student).await.json();
    assert_eq!(wallet["balance"], 5_100);
    let earnings: Value = h.get("/api/wallet", &teacher).await.json();
    assert_eq!(earnings["balance"], 3_920);

    let library: Value = h.get("/api/library", &student).await.json();
    assert_eq!(library.as_array().unwrap().len(), 1);
    let cart: Value = h.get("/api/cart", &student).await.json();
    assert!(cart["lines"].as_array().unwrap().is_empty());

    // Owned content cannot go back in the cart
    h.post("/api/cart/items", &student)
        .json(&json!({ "content_id": course.id }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let detail: Value = h.get(&format!("/api/contents/{}", course.id), &student).await.json();
    assert_eq!(detail["owned"], true);

    let order_path = format!("/api/orders/{}", order["id"].as_str().unwrap());
    h.get(&order_path, &student).await.assert_status_ok();
    h.get(&order_path, &teacher).await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wallet_checkout_needs_funds() {
    let h = Harness::new();
    let (grace, _) = h.teacher("grace@example.com").await;
    let (ada, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    h.fund(ada.id, 1_000);

    h.add_to_cart(&student, &course).await;
    h.post("/api/checkout", &student)
        .json(&json!({ "method": "wallet" }))
        .await
        .assert_status(StatusCode::PAYMENT_REQUIRED);

    // Nothing moved
    let wallet: Value = h.get("/api/wallet", &student).await.json();
    assert_eq!(wallet["balance"], 1_000);
    assert_eq!(h.store.order_count().unwrap(), 0);
    let cart: Value = h.get("/api/cart", &student).await.json();
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_free_content_checks_out_without_funds() {
    let h = Harness::new();
    let (grace, _) = h.teacher("grace@example.com").await;
    let (_, student) = h.student("ada@example.com").await;
    let intro = h.course(&grace, "Intro", 0).await;

    h.add_to_cart(&student, &intro).await;
    h.post("/api/checkout", &student)
        .json(&json!({ "method": "gateway" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let order: Value = h
        .post("/api/checkout", &student)
        .json(&json!({ "method": "wallet" }))
        .await
        .json();
    assert_eq!(order["total"], 0);
}

// ============================================================================
// Gateway checkout and webhooks
// ============================================================================

#[tokio::test]
async fn test_gateway_checkout_fulfilled_by_webhook() {
    let h = Harness::new();
    let (grace, teacher) = h.teacher("grace@example.com").await;
    let (_, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;

    h.add_to_cart(&student, &course).await;
    let started = h.post("/api/checkout", &student).json(&json!({ "method": "gateway" })).await;
    started.assert_status(StatusCode::ACCEPTED);
    let started: Value = started.json();
    assert!(started["checkout_url"].as_str().unwrap().starts_with(CHECKOUT_BASE));
    assert_eq!(started["amount"], 4_900);

    let sessions = h.gateway.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].amount_cents, 4_900);
    assert_eq!(sessions[0].customer_email, "ada@example.com");

    // Nothing is owned until the gateway confirms
    let library: Value = h.get("/api/library", &student).await.json();
    assert!(library.as_array().unwrap().is_empty());

    let event = succeeded("evt_1", &started["payment_id"], 4_900);
    let confirmed = h.webhook(&event).await;
    confirmed.assert_status_ok();
    let outcome: Value = confirmed.json();
    assert_eq!(outcome["outcome"], "fulfilled");
    assert_eq!(outcome["order"]["total"], 4_900);

    let library: Value = h.get("/api/library", &student).await.json();
    assert_eq!(library.as_array().unwrap().len(), 1);
    let earnings: Value = h.get("/api/wallet", &teacher).await.json();
    assert_eq!(earnings["balance"], 3_920);

    // Replays change nothing
    let replay: Value = h.webhook(&event).await.json();
    assert_eq!(replay["outcome"], "already_processed");
    let again: Value = h.webhook(&succeeded("evt_2", &started["payment_id"], 4_900)).await.json();
    assert_eq!(again["outcome"], "already_processed");
    assert_eq!(h.store.order_count().unwrap(), 1);

    let payment_path = format!("/api/payments/{}", started["payment_id"].as_str().unwrap());
    let payment: Value = h.get(&payment_path, &student).await.json();
    assert_eq!(payment["status"], "succeeded");
    h.get(&payment_path, &teacher).await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_signature_is_required() {
    let h = Harness::new();
    let (grace, _) = h.teacher("grace@example.com").await;
    let (_, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    h.add_to_cart(&student, &course).await;
    let started: Value = h
        .post("/api/checkout", &student)
        .json(&json!({ "method": "gateway" }))
        .await
        .json();

    let event = succeeded("evt_forged", &started["payment_id"], 4_900);
    h.server
        .post("/api/payments/webhook")
        .json(&event)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .post("/api/payments/webhook")
        .add_header(
            axum::http::HeaderName::from_static("x-gateway-signature"),
            axum::http::HeaderValue::from_static("sha256=deadbeef"),
        )
        .json(&event)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    assert_eq!(h.store.order_count().unwrap(), 0);
}

#[tokio::test]
async fn test_webhook_rejects_wrong_amount() {
    let h = Harness::new();
    let (grace, _) = h.teacher("grace@example.com").await;
    let (_, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    h.add_to_cart(&student, &course).await;
    let started: Value = h
        .post("/api/checkout", &student)
        .json(&json!({ "method": "gateway" }))
        .await
        .json();

    h.webhook(&succeeded("evt_short", &started["payment_id"], 100))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(h.store.order_count().unwrap(), 0);
}

#[tokio::test]
async fn test_failed_payment_cannot_be_confirmed() {
    let h = Harness::new();
    let (grace, _) = h.teacher("grace@example.com").await;
    let (_, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    h.add_to_cart(&student, &course).await;
    let started: Value = h
        .post("/api/checkout", &student)
        .json(&json!({ "method": "gateway" }))
        .await
        .json();

    let failed: Value = h
        .webhook(&json!({
            "event_id": "evt_fail",
            "event_type": "payment.failed",
            "payment_id": started["payment_id"],
            "gateway_reference": "ref_test",
            "amount_cents": 4_900,
            "failure_reason": "card declined"
        }))
        .await
        .json();
    assert_eq!(failed["outcome"], "failed");
    assert_eq!(failed["payment"]["status"], "failed");

    h.webhook(&succeeded("evt_late", &started["payment_id"], 4_900))
        .await
        .assert_status(StatusCode::CONFLICT);

    // The cart survives a failed payment
    let cart: Value = h.get("/api/cart", &student).await.json();
    assert_eq!(cart["lines"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_webhook_events_are_ignored() {
    let h = Harness::new();
    let ignored: Value = h
        .webhook(&json!({
            "event_id": "evt_misc",
            "event_type": "customer.updated",
            "payment_id": uuid::Uuid::new_v4(),
            "gateway_reference": "ref_test",
            "amount_cents": 0
        }))
        .await
        .json();
    assert_eq!(ignored["outcome"], "ignored");
}

#[tokio::test]
async fn test_gateway_outage_fails_the_payment() {
    let h = Harness::new();
    let (grace, _) = h.teacher("grace@example.com").await;
    let (_, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    h.add_to_cart(&student, &course).await;

    h.gateway.set_offline(true);
    h.post("/api/checkout", &student)
        .json(&json!({ "method": "gateway" }))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let payments: Value = h.get("/api/payments", &student).await.json();
    assert_eq!(payments["items"][0]["status"], "failed");
}

#[tokio::test]
async fn test_top_up_credits_wallet() {
    let h = Harness::new();
    let (_, student) = h.student("ada@example.com").await;

    h.post("/api/wallet/top-up", &student)
        .json(&json!({ "amount_cents": 0 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    h.post("/api/wallet/top-up", &student)
        .json(&json!({ "amount_cents": 5_000_000 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let started: Value = h
        .post("/api/wallet/top-up", &student)
        .json(&json!({ "amount_cents": 2_500 }))
        .await
        .json();
    let outcome: Value = h
        .webhook(&succeeded("evt_topup", &started["payment_id"], 2_500))
        .await
        .json();
    assert_eq!(outcome["outcome"], "fulfilled");
    assert!(outcome["order"].is_null());

    let wallet: Value = h.get("/api/wallet", &student).await.json();
    assert_eq!(wallet["balance"], 2_500);
}

// ============================================================================
// Guardian purchases
// ============================================================================

#[tokio::test]
async fn test_guardian_buys_for_linked_student() {
    let h = Harness::new();
    let (grace, _) = h.teacher("grace@example.com").await;
    let (ada, student) = h.student("ada@example.com").await;
    let (mum, guardian) = h.guardian("mum@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    h.fund(mum.id, 10_000);
    h.add_to_cart(&guardian, &course).await;

    let for_ada = json!({ "method": "wallet", "beneficiary_id": ada.id });
    h.post("/api/checkout", &guardian)
        .json(&for_ada)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let link: Value = h
        .post("/api/guardians/links", &guardian)
        .json(&json!({ "student_email": "ada@example.com" }))
        .await
        .json();
    h.post(&format!("/api/guardians/links/{}/accept", link["id"].as_str().unwrap()), &student)
        .await
        .assert_status_ok();

    let order: Value = h.post("/api/checkout", &guardian).json(&for_ada).await.json();
    assert_eq!(order["buyer_id"], mum.id.to_string());
    assert_eq!(order["beneficiary_id"], ada.id.to_string());

    let library: Value = h.get("/api/library", &student).await.json();
    assert_eq!(library.as_array().unwrap().len(), 1);
    let guardian_view: Value = h
        .get(&format!("/api/guardians/students/{}/library", ada.id), &guardian)
        .await
        .json();
    assert_eq!(guardian_view.as_array().unwrap().len(), 1);
    let wallet: Value = h.get("/api/wallet", &guardian).await.json();
    assert_eq!(wallet["balance"], 5_100);

    // Students cannot buy on someone else's behalf
    h.add_to_cart(&student, &h.course(&grace, "Type systems", 0).await).await;
    h.post("/api/checkout", &student)
        .json(&json!({ "method": "wallet", "beneficiary_id": mum.id }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

// ============================================================================
// Withdrawals
// ============================================================================

#[tokio::test]
async fn test_withdrawal_approval_and_rejection() {
    let h = Harness::new();
    let (_, admin) = h.admin("root@example.com").await;
    let (grace, teacher) = h.teacher("grace@example.com").await;
    let (ada, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    h.fund(ada.id, 4_900);
    h.add_to_cart(&student, &course).await;
    h.post("/api/checkout", &student)
        .json(&json!({ "method": "wallet" }))
        .await
        .assert_status(StatusCode::CREATED);

    h.post("/api/withdrawals", &student)
        .json(&json!({ "amount_cents": 1_000 }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    h.post("/api/withdrawals", &teacher)
        .json(&json!({ "amount_cents": 999 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    h.post("/api/withdrawals", &teacher)
        .json(&json!({ "amount_cents": 5_000 }))
        .await
        .assert_status(StatusCode::PAYMENT_REQUIRED);

    let first: Value = h
        .post("/api/withdrawals", &teacher)
        .json(&json!({ "amount_cents": 2_000 }))
        .await
        .json();
    assert_eq!(first["status"], "pending");
    let second: Value = h
        .post("/api/withdrawals", &teacher)
        .json(&json!({ "amount_cents": 1_500 }))
        .await
        .json();
    let balance: Value = h.get("/api/wallet", &teacher).await.json();
    assert_eq!(balance["balance"], 420);

    let pending: Value = h.get("/api/admin/withdrawals?status=pending", &admin).await.json();
    assert_eq!(pending["total"], 2);
    h.get("/api/admin/withdrawals", &teacher)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let approve_path = format!("/api/admin/withdrawals/{}/approve", first["id"].as_str().unwrap());
    let paid: Value = h.post(&approve_path, &admin).await.json();
    assert_eq!(paid["status"], "paid");
    h.post(&approve_path, &admin).await.assert_status(StatusCode::CONFLICT);

    let reject_path = format!("/api/admin/withdrawals/{}/reject", second["id"].as_str().unwrap());
    h.post(&reject_path, &admin)
        .json(&json!({ "reason": "  " }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let rejected: Value = h
        .post(&reject_path, &admin)
        .json(&json!({ "reason": "Bank details missing" }))
        .await
        .json();
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["note"], "Bank details missing");

    // Rejected amounts return to the wallet
    let balance: Value = h.get("/api/wallet", &teacher).await.json();
    assert_eq!(balance["balance"], 1_920);

    let mine: Value = h.get("/api/withdrawals", &teacher).await.json();
    assert_eq!(mine["total"], 2);
    let sent = h.email.sent().unwrap();
    assert!(sent.iter().filter(|m| m.to == "grace@example.com").count() >= 2);
}
