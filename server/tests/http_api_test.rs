//! HTTP API tests over the in-memory marketplace.
//!
//! Covers login, catalog publishing rules, quizzes, reviews, comments,
//! guardian links and the admin endpoints. Money flows live in
//! `payment_api_test.rs`.
//!
//! Run with: `cargo test -p edumarket-server --test http_api_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

mod common;

use axum::http::StatusCode;
use common::Harness;
use edumarket_testing::fixtures;
use serde_json::{Value, json};

// ============================================================================
// Health and authentication
// ============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let h = Harness::new();

    h.server.get("/health").await.assert_status_ok();
    let ready = h.server.get("/ready").await;
    ready.assert_status_ok();
}

#[tokio::test]
async fn test_signup_then_magic_link_login() {
    let h = Harness::new();

    let signup = h
        .server
        .post("/api/auth/signup")
        .json(&json!({ "email": "  Ada@Example.com ", "name": "Ada", "role": "student" }))
        .await;
    signup.assert_status(StatusCode::CREATED);
    let body: Value = signup.json();
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body.get("magic_link").is_none());

    let token = h.email.last_token_for("ada@example.com").unwrap().unwrap();
    let verify = h
        .server
        .post("/api/auth/magic-link/verify")
        .json(&json!({ "token": token }))
        .await;
    verify.assert_status_ok();
    let session: Value = verify.json();
    assert_eq!(session["user"]["email_verified"], true);
    let bearer = session["token"].as_str().unwrap().to_string();

    let me = h.get("/api/me", &bearer).await;
    me.assert_status_ok();
    assert_eq!(me.json::<Value>()["name"], "Ada");

    // Tokens are single use
    h.server
        .post("/api/auth/magic-link/verify")
        .json(&json!({ "token": token }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    h.post("/api/auth/logout", &bearer).await.assert_status(StatusCode::NO_CONTENT);
    h.get("/api/me", &bearer).await.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_rejects_admin_role_and_duplicates() {
    let h = Harness::new();

    h.server
        .post("/api/auth/signup")
        .json(&json!({ "email": "root@example.com", "name": "Root", "role": "admin" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let request = json!({ "email": "grace@example.com", "name": "Grace", "role": "teacher" });
    h.server
        .post("/api/auth/signup")
        .json(&request)
        .await
        .assert_status(StatusCode::CREATED);
    h.server
        .post("/api/auth/signup")
        .json(&request)
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_signup_survives_mail_outage() {
    let h = Harness::new();
    h.email.set_failing(true);

    let signup = h
        .server
        .post("/api/auth/signup")
        .json(&json!({ "email": "ada@example.com", "name": "Ada", "role": "student" }))
        .await;
    signup.assert_status(StatusCode::CREATED);
    assert!(h.email.sent().unwrap().is_empty());

    // Mail is back: the same address logs in without signing up again
    h.email.set_failing(false);
    h.server
        .post("/api/auth/magic-link")
        .json(&json!({ "email": "ada@example.com" }))
        .await
        .assert_status(StatusCode::ACCEPTED);
    let token = h.email.last_token_for("ada@example.com").unwrap().unwrap();
    h.server
        .post("/api/auth/magic-link/verify")
        .json(&json!({ "token": token }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_magic_link_request_does_not_reveal_accounts() {
    let h = Harness::new();
    h.student("known@example.com").await;

    let known = h
        .server
        .post("/api/auth/magic-link")
        .json(&json!({ "email": "known@example.com" }))
        .await;
    let unknown = h
        .server
        .post("/api/auth/magic-link")
        .json(&json!({ "email": "nobody@example.com" }))
        .await;

    known.assert_status(StatusCode::ACCEPTED);
    unknown.assert_status(StatusCode::ACCEPTED);
    assert_eq!(known.json::<Value>(), unknown.json::<Value>());
    assert!(h.email.last_token_for("nobody@example.com").unwrap().is_none());
}

#[tokio::test]
async fn test_magic_link_requests_are_rate_limited() {
    let h = Harness::new();

    for _ in 0..5 {
        h.server
            .post("/api/auth/magic-link")
            .json(&json!({ "email": "spam@example.com" }))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }
    h.server
        .post("/api/auth/magic-link")
        .json(&json!({ "email": "spam@example.com" }))
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_login_resets_magic_link_limit() {
    let h = Harness::new();
    h.student("ada@example.com").await;

    let request = || {
        h.server
            .post("/api/auth/magic-link")
            .json(&json!({ "email": "ada@example.com" }))
    };
    for _ in 0..5 {
        request().await.assert_status(StatusCode::ACCEPTED);
    }

    let token = h.email.last_token_for("ada@example.com").unwrap().unwrap();
    h.server
        .post("/api/auth/magic-link/verify")
        .json(&json!({ "token": token }))
        .await
        .assert_status_ok();

    request().await.assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_protected_routes_need_a_session() {
    let h = Harness::new();

    h.server.get("/api/cart").await.assert_status(StatusCode::UNAUTHORIZED);
    h.get("/api/cart", "not-a-session").await.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_update() {
    let h = Harness::new();
    let (_, token) = h.student("ada@example.com").await;

    let updated = h
        .patch("/api/me", &token)
        .json(&json!({ "name": "  Ada Lovelace ", "bio": "Analyst" }))
        .await;
    updated.assert_status_ok();
    let body: Value = updated.json();
    assert_eq!(body["name"], "Ada Lovelace");
    assert_eq!(body["bio"], "Analyst");

    h.patch("/api/me", &token)
        .json(&json!({ "name": "   " }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_only_teachers_create_content() {
    let h = Harness::new();
    let (_, student) = h.student("ada@example.com").await;
    let (_, teacher) = h.teacher("grace@example.com").await;
    let course = json!({
        "kind": "course",
        "title": "Compilers",
        "description": "From lexing to codegen",
        "subject": " CS ",
        "price_cents": 4_900
    });

    h.post("/api/contents", &student)
        .json(&course)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let created = h.post("/api/contents", &teacher).json(&course).await;
    created.assert_status(StatusCode::CREATED);
    let body: Value = created.json();
    assert_eq!(body["status"], "draft");
    assert_eq!(body["subject"], "cs");
}

#[tokio::test]
async fn test_drafts_are_hidden_from_the_catalog() {
    let h = Harness::new();
    let (_, teacher) = h.teacher("grace@example.com").await;
    let (_, student) = h.student("ada@example.com").await;

    let draft: Value = h
        .post("/api/contents", &teacher)
        .json(&json!({ "kind": "book", "title": "Draft book", "description": "wip", "price_cents": 0 }))
        .await
        .json();
    let id = draft["id"].as_str().unwrap();

    h.server
        .get(&format!("/api/contents/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.get(&format!("/api/contents/{id}"), &student)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.get(&format!("/api/contents/{id}"), &teacher).await.assert_status_ok();

    let listing: Value = h.server.get("/api/contents").await.json();
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
async fn test_publish_and_archive_transitions() {
    let h = Harness::new();
    let (_, teacher) = h.teacher("grace@example.com").await;

    let draft: Value = h
        .post("/api/contents", &teacher)
        .json(&json!({ "kind": "lecture", "title": "Parsing", "description": "LL and LR", "price_cents": 900 }))
        .await
        .json();
    let path = format!("/api/contents/{}", draft["id"].as_str().unwrap());

    let published = h.patch(&path, &teacher).json(&json!({ "status": "published" })).await;
    published.assert_status_ok();
    assert_eq!(published.json::<Value>()["status"], "published");

    let listing: Value = h.server.get("/api/contents?kind=lecture").await.json();
    assert_eq!(listing["total"], 1);

    h.delete(&path, &teacher).await.assert_status(StatusCode::NO_CONTENT);
    h.patch(&path, &teacher)
        .json(&json!({ "status": "draft" }))
        .await
        .assert_status(StatusCode::CONFLICT);
    h.patch(&path, &teacher)
        .json(&json!({}))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_drafts_are_archived_only_by_delete() {
    let h = Harness::new();
    let (_, teacher) = h.teacher("grace@example.com").await;

    let draft: Value = h
        .post("/api/contents", &teacher)
        .json(&json!({ "kind": "book", "title": "Types", "description": "Lambda cube", "price_cents": 1_500 }))
        .await
        .json();
    let path = format!("/api/contents/{}", draft["id"].as_str().unwrap());

    h.patch(&path, &teacher)
        .json(&json!({ "status": "archived" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    h.delete(&path, &teacher).await.assert_status(StatusCode::NO_CONTENT);
    let archived: Value = h.get(&path, &teacher).await.json();
    assert_eq!(archived["status"], "archived");
}

#[tokio::test]
async fn test_other_teachers_cannot_edit() {
    let h = Harness::new();
    let (grace, _) = h.teacher("grace@example.com").await;
    let (_, other) = h.teacher("alan@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;

    h.patch(&format!("/api/contents/{}", course.id), &other)
        .json(&json!({ "title": "Mine now" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

// ============================================================================
// Quizzes
// ============================================================================

#[tokio::test]
async fn test_quiz_needs_questions_before_publishing() {
    let h = Harness::new();
    let (_, teacher) = h.teacher("grace@example.com").await;

    let quiz: Value = h
        .post("/api/contents", &teacher)
        .json(&json!({ "kind": "quiz", "title": "Warm-up", "description": "Five minutes", "price_cents": 0 }))
        .await
        .json();
    let id = quiz["id"].as_str().unwrap();
    let path = format!("/api/contents/{id}");

    h.patch(&path, &teacher)
        .json(&json!({ "status": "published" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    h.post(&format!("/api/quizzes/{id}/questions"), &teacher)
        .json(&json!({ "prompt": "2 + 2?", "options": ["3", "4"], "correct_index": 1 }))
        .await
        .assert_status(StatusCode::CREATED);
    h.post(&format!("/api/quizzes/{id}/questions"), &teacher)
        .json(&json!({ "prompt": "Out of range", "options": ["a", "b"], "correct_index": 5 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    h.patch(&path, &teacher)
        .json(&json!({ "status": "published" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_quiz_attempt_is_graded_and_answers_stay_hidden() {
    let h = Harness::new();
    let (grace, teacher) = h.teacher("grace@example.com").await;
    let (_, student) = h.student("ada@example.com").await;
    let (quiz, _) = fixtures::published_quiz(
        h.store.as_ref(),
        &grace,
        "Arithmetic",
        &[("1 + 1?", &["1", "2"], 1), ("2 * 3?", &["6", "5"], 0)],
        h.now,
    )
    .await
    .unwrap();
    let questions_path = format!("/api/quizzes/{}/questions", quiz.id);
    let attempts_path = format!("/api/quizzes/{}/attempts", quiz.id);

    let as_student: Value = h.get(&questions_path, &student).await.json();
    assert!(as_student[0].get("correct_index").is_none());
    let as_teacher: Value = h.get(&questions_path, &teacher).await.json();
    assert_eq!(as_teacher[0]["correct_index"], 1);

    let attempt = h
        .post(&attempts_path, &student)
        .json(&json!({ "answers": [1, null] }))
        .await;
    attempt.assert_status(StatusCode::CREATED);
    let graded: Value = attempt.json();
    assert_eq!(graded["score"], 1);
    assert_eq!(graded["max_score"], 2);
    assert_eq!(graded["percent"], 50);
    assert_eq!(graded["passed"], false);

    h.post(&attempts_path, &student)
        .json(&json!({ "answers": [1] }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let history: Value = h.get(&attempts_path, &student).await.json();
    assert_eq!(history.as_array().unwrap().len(), 1);
}

// ============================================================================
// Reviews and comments
// ============================================================================

#[tokio::test]
async fn test_reviews_require_enrollment() {
    let h = Harness::new();
    let (grace, teacher) = h.teacher("grace@example.com").await;
    let (ada, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    let path = format!("/api/contents/{}/reviews", course.id);

    h.put(&path, &student)
        .json(&json!({ "rating": 5 }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    h.put(&path, &teacher)
        .json(&json!({ "rating": 5 }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    h.fund(ada.id, 10_000);
    h.add_to_cart(&student, &course).await;
    h.post("/api/checkout", &student)
        .json(&json!({ "method": "wallet" }))
        .await
        .assert_status(StatusCode::CREATED);

    h.put(&path, &student)
        .json(&json!({ "rating": 6 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    h.put(&path, &student)
        .json(&json!({ "rating": 3, "body": "Dense" }))
        .await
        .assert_status_ok();
    let review: Value = h
        .put(&path, &student)
        .json(&json!({ "rating": 4, "body": "Dense but good" }))
        .await
        .json();

    let page: Value = h.server.get(&path).await.json();
    assert_eq!(page["summary"]["count"], 1);
    assert_eq!(page["summary"]["average"], 4.0);
    assert_eq!(page["reviews"]["items"][0]["body"], "Dense but good");

    let review_path = format!("/api/reviews/{}", review["id"].as_str().unwrap());
    h.delete(&review_path, &teacher).await.assert_status(StatusCode::FORBIDDEN);
    h.delete(&review_path, &student).await.assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_comment_threads() {
    let h = Harness::new();
    let (grace, teacher) = h.teacher("grace@example.com").await;
    let (ada, student) = h.student("ada@example.com").await;
    let (_, outsider) = h.student("eve@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;
    let other = h.course(&grace, "Type systems", 0).await;
    let path = format!("/api/contents/{}/comments", course.id);

    h.post(&path, &outsider)
        .json(&json!({ "body": "Can I see?" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    h.fund(ada.id, 4_900);
    h.add_to_cart(&student, &course).await;
    h.post("/api/checkout", &student)
        .json(&json!({ "method": "wallet" }))
        .await
        .assert_status(StatusCode::CREATED);

    let question: Value = h
        .post(&path, &student)
        .json(&json!({ "body": "What about SSA?" }))
        .await
        .json();
    let answer = h
        .post(&path, &teacher)
        .json(&json!({ "body": "Chapter 7", "parent_id": question["id"] }))
        .await;
    answer.assert_status(StatusCode::CREATED);

    h.post(&format!("/api/contents/{}/comments", other.id), &student)
        .json(&json!({ "body": "Wrong place", "parent_id": question["id"] }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    h.post(&path, &student)
        .json(&json!({ "body": "   " }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let threads: Value = h.get(&path, &student).await.json();
    assert_eq!(threads.as_array().unwrap().len(), 1);
    assert_eq!(threads[0]["replies"][0]["body"], "Chapter 7");

    // The content owner moderates its comments
    let comment_path = format!("/api/comments/{}", question["id"].as_str().unwrap());
    h.delete(&comment_path, &teacher).await.assert_status(StatusCode::NO_CONTENT);
    let threads: Value = h.get(&path, &student).await.json();
    assert!(threads.as_array().unwrap().is_empty());
}

// ============================================================================
// Guardians
// ============================================================================

#[tokio::test]
async fn test_guardian_link_lifecycle() {
    let h = Harness::new();
    let (ada, student) = h.student("ada@example.com").await;
    let (_, guardian) = h.guardian("mum@example.com").await;
    h.teacher("grace@example.com").await;

    h.post("/api/guardians/links", &guardian)
        .json(&json!({ "student_email": "grace@example.com" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let link: Value = h
        .post("/api/guardians/links", &guardian)
        .json(&json!({ "student_email": "ADA@example.com" }))
        .await
        .json();
    assert_eq!(link["status"], "pending");
    let sent = h.email.sent().unwrap();
    assert!(sent.iter().any(|m| m.to == "ada@example.com"));

    h.post("/api/guardians/links", &guardian)
        .json(&json!({ "student_email": "ada@example.com" }))
        .await
        .assert_status(StatusCode::CONFLICT);

    let library_path = format!("/api/guardians/students/{}/library", ada.id);
    h.get(&library_path, &guardian).await.assert_status(StatusCode::FORBIDDEN);

    let accept_path = format!("/api/guardians/links/{}/accept", link["id"].as_str().unwrap());
    h.post(&accept_path, &guardian).await.assert_status(StatusCode::FORBIDDEN);
    let accepted: Value = h.post(&accept_path, &student).await.json();
    assert_eq!(accepted["status"], "accepted");

    let students: Value = h.get("/api/guardians/students", &guardian).await.json();
    assert_eq!(students[0]["email"], "ada@example.com");
    h.get(&library_path, &guardian).await.assert_status_ok();
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_admin_endpoints_require_admin() {
    let h = Harness::new();
    let (_, student) = h.student("ada@example.com").await;

    h.get("/api/admin/dashboard", &student)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    h.get("/api/admin/users", &student).await.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_dashboard_and_reports() {
    let h = Harness::new();
    let (_, admin) = h.admin("root@example.com").await;
    let (grace, _) = h.teacher("grace@example.com").await;
    let (ada, student) = h.student("ada@example.com").await;
    let course = h.course(&grace, "Compilers", 4_900).await;

    h.fund(ada.id, 4_900);
    h.add_to_cart(&student, &course).await;
    h.post("/api/checkout", &student)
        .json(&json!({ "method": "wallet" }))
        .await
        .assert_status(StatusCode::CREATED);

    let dashboard: Value = h.get("/api/admin/dashboard", &admin).await.json();
    assert_eq!(dashboard["order_count"], 1);
    assert_eq!(dashboard["gross_revenue"], 4_900);
    assert_eq!(dashboard["platform_fees"], 980);
    assert_eq!(dashboard["teacher_earnings"], 3_920);

    let top: Value = h.get("/api/admin/reports/top-content?limit=5", &admin).await.json();
    assert_eq!(top[0]["title"], "Compilers");
    let teachers: Value = h.get("/api/admin/reports/top-teachers", &admin).await.json();
    assert_eq!(teachers[0]["teacher_id"], grace.id.to_string());

    h.get("/api/admin/reports/revenue?months=0", &admin)
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let revenue = h.get("/api/admin/reports/revenue?months=3", &admin).await;
    revenue.assert_status_ok();
    let buckets: Value = revenue.json();
    assert_eq!(buckets.as_array().unwrap().len(), 1);
    assert_eq!(buckets[0]["order_count"], 1);

    let teachers_only: Value = h.get("/api/admin/users?role=teacher", &admin).await.json();
    assert_eq!(teachers_only["total"], 1);
}

#[tokio::test]
async fn test_deactivation_ends_sessions() {
    let h = Harness::new();
    let (root, admin) = h.admin("root@example.com").await;
    let (ada, student) = h.student("ada@example.com").await;

    h.get("/api/me", &student).await.assert_status_ok();
    h.patch(&format!("/api/admin/users/{}", ada.id), &admin)
        .json(&json!({ "is_active": false }))
        .await
        .assert_status_ok();
    h.get("/api/me", &student).await.assert_status(StatusCode::UNAUTHORIZED);

    h.patch(&format!("/api/admin/users/{}", root.id), &admin)
        .json(&json!({ "is_active": false }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}
