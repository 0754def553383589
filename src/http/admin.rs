//! Admin API for the rate-limit toggles.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::ratelimit::{Governor, RateLimitSettings, SettingsSnapshot};

/// Shared state for the admin routes.
#[derive(Clone)]
pub struct AdminState {
    pub settings: Arc<RateLimitSettings>,
    pub governor: Arc<Governor>,
}

/// Partial update of the toggles. Omitted fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    pub login_limit_enabled: Option<bool>,
    pub register_limit_enabled: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GovernorStats {
    pub tracked_counters: usize,
}

/// Routes served on the admin listener.
pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route(
            "/admin/settings/rate-limits",
            get(get_settings).put(update_settings),
        )
        .route("/admin/stats", get(get_stats))
        .with_state(state)
}

async fn get_settings(State(state): State<AdminState>) -> Json<SettingsSnapshot> {
    Json(state.settings.snapshot())
}

async fn update_settings(
    State(state): State<AdminState>,
    Json(update): Json<SettingsUpdate>,
) -> Json<SettingsSnapshot> {
    if let Some(enabled) = update.login_limit_enabled {
        state.settings.set_login_limit_enabled(enabled);
        info!(enabled, "Login rate limit toggled");
    }
    if let Some(enabled) = update.register_limit_enabled {
        state.settings.set_register_limit_enabled(enabled);
        info!(enabled, "Register rate limit toggled");
    }

    Json(state.settings.snapshot())
}

async fn get_stats(State(state): State<AdminState>) -> Json<GovernorStats> {
    Json(GovernorStats {
        tracked_counters: state.governor.tracked_counters(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{CategoryLimits, TracingAuditSink};
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Method, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    fn state() -> AdminState {
        let settings = Arc::new(RateLimitSettings::default());
        let governor = Arc::new(Governor::new(
            CategoryLimits::default(),
            settings.clone(),
            Arc::new(TracingAuditSink),
        ));
        AdminState { settings, governor }
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_settings() {
        let app = admin_router(state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin/settings/rate-limits")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let snapshot: SettingsSnapshot = body_json(response).await;
        assert!(snapshot.login_limit_enabled);
        assert!(snapshot.register_limit_enabled);
    }

    #[tokio::test]
    async fn test_partial_update() {
        let state = state();
        let app = admin_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/admin/settings/rate-limits")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"login_limit_enabled": false}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let snapshot: SettingsSnapshot = body_json(response).await;
        assert!(!snapshot.login_limit_enabled);
        assert!(snapshot.register_limit_enabled);

        // Visible to the governor's settings immediately
        assert!(!state.settings.snapshot().login_limit_enabled);
    }

    #[tokio::test]
    async fn test_stats() {
        let app = admin_router(state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let stats: GovernorStats = body_json(response).await;
        assert_eq!(stats.tracked_counters, 0);
    }
}
