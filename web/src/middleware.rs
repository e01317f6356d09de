//! Request tracking middleware.
//!
//! Every request runs inside an `http_request` span carrying its
//! correlation id, which is also stored in the request extensions and
//! echoed in the `X-Correlation-ID` response header.
//!
//! ```ignore
//! use axum::{Router, middleware::from_fn};
//! use edumarket_web::middleware::correlation_id;
//!
//! let app = Router::new()
//!     .route("/api/contents", get(list_contents))
//!     .layer(from_fn(correlation_id));
//! ```

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Attach a correlation id to the request, its span and its response.
///
/// An incoming `X-Correlation-ID` is kept when it is a valid UUID; anything
/// else is replaced by a new one.
pub async fn correlation_id(mut req: Request, next: Next) -> Response {
    let correlation_id = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    req.extensions_mut().insert(correlation_id);

    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id,
        method = %req.method(),
        uri = %req.uri(),
    );

    let mut response = next.run(req).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, header_value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extractors::CorrelationId;
    use axum::{Router, middleware::from_fn, routing::get};
    use axum_test::TestServer;

    fn app() -> Router {
        Router::new()
            .route("/test", get(|id: CorrelationId| async move { id.0.to_string() }))
            .layer(from_fn(correlation_id))
    }

    #[tokio::test]
    async fn test_correlation_id_generated_if_missing() {
        let server = TestServer::new(app()).unwrap();
        let response = server.get("/test").await;
        let header = response.header(CORRELATION_ID_HEADER);
        let id = header.to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(response.text(), id);
    }

    #[tokio::test]
    async fn test_correlation_id_preserved_from_request() {
        let server = TestServer::new(app()).unwrap();
        let request_id = Uuid::new_v4();
        let response = server
            .get("/test")
            .add_header(
                CORRELATION_ID_HEADER.parse::<http::HeaderName>().unwrap(),
                request_id.to_string().parse::<HeaderValue>().unwrap(),
            )
            .await;
        assert_eq!(response.header(CORRELATION_ID_HEADER), request_id.to_string().as_str());
    }

    #[tokio::test]
    async fn test_invalid_uuid_replaced() {
        let server = TestServer::new(app()).unwrap();
        let response = server
            .get("/test")
            .add_header(
                CORRELATION_ID_HEADER.parse::<http::HeaderName>().unwrap(),
                HeaderValue::from_static("not-a-uuid"),
            )
            .await;
        let id = response.header(CORRELATION_ID_HEADER);
        assert_ne!(id, "not-a-uuid");
        assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }
}
