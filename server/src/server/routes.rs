//! Router configuration for the marketplace.
//!
//! Builds the complete Axum router with all endpoints.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{admin, cart, comments, contents, guardians, orders, payments, quizzes, reviews, withdrawals};
use crate::auth::handlers as auth;
use axum::{
    Router,
    middleware::from_fn,
    routing::{delete, get, patch, post},
};
use edumarket_web::correlation_id;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Health probes live at the root; everything else under `/api`. CORS is
/// left to the caller since its origins come from configuration.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/magic-link", post(auth::request_magic_link))
        .route("/auth/magic-link/verify", post(auth::verify_magic_link))
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(auth::me).patch(auth::update_me));

    let catalog_routes = Router::new()
        .route("/contents", post(contents::create_content).get(contents::list_contents))
        .route(
            "/contents/:id",
            get(contents::get_content)
                .patch(contents::update_content)
                .delete(contents::delete_content),
        )
        .route("/teachers/me/contents", get(contents::my_contents))
        .route(
            "/quizzes/:id/questions",
            post(quizzes::add_question).get(quizzes::list_questions),
        )
        .route("/questions/:id", delete(quizzes::delete_question))
        .route(
            "/quizzes/:id/attempts",
            post(quizzes::submit_attempt).get(quizzes::list_attempts),
        );

    let commerce_routes = Router::new()
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route("/cart/items/:content_id", delete(cart::remove_item))
        .route("/checkout", post(cart::checkout))
        .route("/wallet", get(cart::wallet))
        .route("/wallet/top-up", post(cart::top_up))
        .route("/payments", get(payments::list_payments))
        .route("/payments/webhook", post(payments::webhook))
        .route("/payments/:id", get(payments::get_payment))
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/library", get(orders::library))
        .route(
            "/withdrawals",
            post(withdrawals::request_withdrawal).get(withdrawals::my_withdrawals),
        );

    let community_routes = Router::new()
        .route(
            "/contents/:id/reviews",
            get(reviews::list_reviews).put(reviews::upsert_review),
        )
        .route("/reviews/:id", delete(reviews::delete_review))
        .route(
            "/contents/:id/comments",
            get(comments::list_comments).post(comments::add_comment),
        )
        .route("/comments/:id", delete(comments::delete_comment))
        .route(
            "/guardians/links",
            post(guardians::create_link).get(guardians::list_links),
        )
        .route("/guardians/links/:id/accept", post(guardians::accept_link))
        .route("/guardians/links/:id/decline", post(guardians::decline_link))
        .route("/guardians/students", get(guardians::students))
        .route("/guardians/students/:id/library", get(guardians::student_library))
        .route("/guardians/students/:id/attempts", get(guardians::student_attempts));

    let admin_routes = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/reports/revenue", get(admin::revenue))
        .route("/reports/top-content", get(admin::top_content))
        .route("/reports/top-teachers", get(admin::top_teachers))
        .route("/users", get(admin::list_users))
        .route("/users/:id", patch(admin::set_user_status))
        .route("/withdrawals", get(withdrawals::list_withdrawals))
        .route("/withdrawals/:id/approve", post(withdrawals::approve_withdrawal))
        .route("/withdrawals/:id/reject", post(withdrawals::reject_withdrawal));

    let api_routes = Router::new()
        .merge(auth_routes)
        .merge(catalog_routes)
        .merge(commerce_routes)
        .merge(community_routes)
        .nest("/admin", admin_routes);

    Router::new()
        // Health checks (no authentication)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(correlation_id))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
