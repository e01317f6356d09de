//! Shared harness: the full router over in-memory stores.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::http::{HeaderName, HeaderValue, header};
use axum_test::{TestRequest, TestServer};
use chrono::{DateTime, Utc};
use edumarket_auth::mocks::{MockEmailProvider, MockRateLimiter, MockSessionStore, MockTokenStore};
use edumarket_auth::{AuthConfig, MagicLinks};
use edumarket_core::environment::Clock;
use edumarket_core::model::{Content, User};
use edumarket_core::{Money, UserId};
use edumarket_server::config::MarketplaceConfig;
use edumarket_server::payment_gateway::MockPaymentGateway;
use edumarket_server::payment_gateway::signature::{SIGNATURE_HEADER, sign};
use edumarket_server::{AppState, CheckoutSettings, build_router};
use edumarket_testing::{InMemoryMarketplace, fixtures, test_clock};
use serde_json::{Value, json};
use std::sync::Arc;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const CHECKOUT_BASE: &str = "https://pay.example/checkout";

pub struct Harness {
    pub server: TestServer,
    pub store: Arc<InMemoryMarketplace>,
    pub auth: MagicLinks,
    pub email: MockEmailProvider,
    pub gateway: MockPaymentGateway,
    pub now: DateTime<Utc>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryMarketplace::new());
        let email = MockEmailProvider::new();
        let auth = MagicLinks::new(
            AuthConfig::new("https://edumarket.example"),
            Arc::new(MockTokenStore::new()),
            Arc::new(MockSessionStore::new()),
            Arc::new(MockRateLimiter::new()),
            Arc::new(email.clone()),
        );
        let gateway = MockPaymentGateway::new(CHECKOUT_BASE);
        let clock = test_clock();
        let now = clock.now();

        let state = AppState::new(
            Arc::clone(&store),
            auth.clone(),
            Arc::new(gateway.clone()),
            Arc::new(clock),
            MarketplaceConfig::default(),
            CheckoutSettings {
                webhook_secret: WEBHOOK_SECRET.to_string(),
                success_url: "https://edumarket.example/checkout/success".to_string(),
                cancel_url: "https://edumarket.example/checkout/cancel".to_string(),
            },
        );
        let server = TestServer::new(build_router(state)).unwrap();

        Self {
            server,
            store,
            auth,
            email,
            gateway,
            now,
        }
    }

    /// Open a session for `user` and return its bearer token.
    pub async fn login(&self, user: &User) -> String {
        let session = self.auth.open_session(user.id, &user.email, self.now).await.unwrap();
        session.session_id.to_string()
    }

    pub async fn student(&self, email: &str) -> (User, String) {
        let user = fixtures::student(self.store.as_ref(), email, self.now).await.unwrap();
        let token = self.login(&user).await;
        (user, token)
    }

    pub async fn teacher(&self, email: &str) -> (User, String) {
        let user = fixtures::teacher(self.store.as_ref(), email, self.now).await.unwrap();
        let token = self.login(&user).await;
        (user, token)
    }

    pub async fn guardian(&self, email: &str) -> (User, String) {
        let user = fixtures::guardian(self.store.as_ref(), email, self.now).await.unwrap();
        let token = self.login(&user).await;
        (user, token)
    }

    pub async fn admin(&self, email: &str) -> (User, String) {
        let user = fixtures::admin(self.store.as_ref(), email, self.now).await.unwrap();
        let token = self.login(&user).await;
        (user, token)
    }

    pub async fn course(&self, teacher: &User, title: &str, price_cents: u64) -> Content {
        fixtures::published_course(self.store.as_ref(), teacher, title, price_cents, self.now)
            .await
            .unwrap()
    }

    pub fn fund(&self, user_id: UserId, cents: u64) {
        self.store.fund_wallet(user_id, Money::from_cents(cents), self.now).unwrap();
    }

    pub fn get(&self, path: &str, token: &str) -> TestRequest {
        self.server.get(path).add_header(header::AUTHORIZATION, bearer(token))
    }

    pub fn post(&self, path: &str, token: &str) -> TestRequest {
        self.server.post(path).add_header(header::AUTHORIZATION, bearer(token))
    }

    pub fn put(&self, path: &str, token: &str) -> TestRequest {
        self.server.put(path).add_header(header::AUTHORIZATION, bearer(token))
    }

    pub fn patch(&self, path: &str, token: &str) -> TestRequest {
        self.server.patch(path).add_header(header::AUTHORIZATION, bearer(token))
    }

    pub fn delete(&self, path: &str, token: &str) -> TestRequest {
        self.server.delete(path).add_header(header::AUTHORIZATION, bearer(token))
    }

    /// Put `content` in the cart of the token's owner.
    pub async fn add_to_cart(&self, token: &str, content: &Content) {
        self.post("/api/cart/items", token)
            .json(&json!({ "content_id": content.id }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }

    /// Post a webhook event signed with the shared secret.
    pub async fn webhook(&self, event: &Value) -> axum_test::TestResponse {
        let body = serde_json::to_vec(event).unwrap();
        let signature = sign(WEBHOOK_SECRET, &body);
        self.server
            .post("/api/payments/webhook")
            .content_type("application/json")
            .add_header(
                HeaderName::from_bytes(SIGNATURE_HEADER.as_bytes()).unwrap(),
                HeaderValue::from_str(&signature).unwrap(),
            )
            .bytes(body.into())
            .await
    }
}

pub fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

/// A `payment.succeeded` event for `payment_id`.
pub fn succeeded(event_id: &str, payment_id: &Value, amount_cents: u64) -> Value {
    json!({
        "event_id": event_id,
        "event_type": "payment.succeeded",
        "payment_id": payment_id,
        "gateway_reference": "ref_test",
        "amount_cents": amount_cents,
    })
}
