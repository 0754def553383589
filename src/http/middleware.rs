//! Governor middleware for the public router.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::ratelimit::{Decision, Governor, Rejection, RequestMeta};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody {
                error: self.message(),
            }),
        )
            .into_response()
    }
}

/// Admit or reject every request before it reaches a handler.
///
/// Admitted requests are forwarded untouched. The peer address comes from
/// `ConnectInfo` when the server was started with it.
pub async fn governor_middleware(
    State(governor): State<Arc<Governor>>,
    request: Request,
    next: Next,
) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let decision = governor.admit(&RequestMeta {
        path: request.uri().path(),
        headers: request.headers(),
        remote_addr,
    });

    match decision {
        Decision::Allow => next.run(request).await,
        Decision::Reject(rejection) => rejection.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{CategoryLimits, LimitRule, RateLimitSettings, TracingAuditSink};
    use axum::{body::Body, http::Request as HttpRequest, middleware, routing::get, Router};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(settings: Arc<RateLimitSettings>) -> Router {
        let limits = CategoryLimits {
            general: LimitRule::new(5, Duration::from_secs(60)),
            login: LimitRule::new(2, Duration::from_secs(60)),
            register: LimitRule::new(2, Duration::from_secs(60)),
        };
        let governor = Arc::new(Governor::new(limits, settings, Arc::new(TracingAuditSink)));

        Router::new()
            .route("/books", get(|| async { "books" }))
            .route("/login", get(|| async { "login form" }))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(middleware::from_fn_with_state(governor, governor_middleware))
    }

    fn request(path: &str, ip: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .uri(path)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_allowed_request_reaches_handler() {
        let app = app(Arc::new(RateLimitSettings::default()));

        let response = app.oneshot(request("/books", "1.2.3.4")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"books");
    }

    #[tokio::test]
    async fn test_login_rejection_body() {
        let app = app(Arc::new(RateLimitSettings::default()));

        for _ in 0..2 {
            let response = app.clone().oneshot(request("/login", "1.2.3.4")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(request("/login", "1.2.3.4")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Too many login attempts. Please try again later."})
        );
    }

    #[tokio::test]
    async fn test_general_rejection_body() {
        let app = app(Arc::new(RateLimitSettings::default()));

        for _ in 0..5 {
            app.clone().oneshot(request("/books", "1.2.3.4")).await.unwrap();
        }

        let response = app.oneshot(request("/books", "1.2.3.4")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Too many requests. Please try again later."})
        );
    }

    #[tokio::test]
    async fn test_forwarded_clients_are_separate() {
        let app = app(Arc::new(RateLimitSettings::default()));

        for _ in 0..2 {
            app.clone().oneshot(request("/login", "1.2.3.4")).await.unwrap();
        }
        let blocked = app.clone().oneshot(request("/login", "1.2.3.4")).await.unwrap();
        assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app.oneshot(request("/login", "5.6.7.8, 1.2.3.4")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_disabled_login_limit_bypasses_login_check() {
        let settings = Arc::new(RateLimitSettings::default());
        settings.set_login_limit_enabled(false);
        let app = app(settings);

        for _ in 0..5 {
            let response = app.clone().oneshot(request("/login", "1.2.3.4")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app.oneshot(request("/login", "1.2.3.4")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_unrouted_paths_are_governed() {
        let app = app(Arc::new(RateLimitSettings::default()));

        for _ in 0..5 {
            let response = app.clone().oneshot(request("/missing", "1.2.3.4")).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
        let response = app.oneshot(request("/missing", "1.2.3.4")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
