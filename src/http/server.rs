//! HTTP server implementation.

use axum::{http::StatusCode, middleware, response::IntoResponse, routing::get, Json, Router};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use super::admin::{admin_router, AdminState};
use super::middleware::governor_middleware;
use crate::config::ServerConfig;
use crate::error::{GovernorError, Result};
use crate::ratelimit::{Governor, RateLimitSettings};

/// Public and admin HTTP listeners sharing one governor.
pub struct HttpServer {
    /// Public address, governed
    listen_addr: SocketAddr,
    /// Admin address
    admin_addr: SocketAddr,
    governor: Arc<Governor>,
    settings: Arc<RateLimitSettings>,
    /// Application routes placed behind the governor
    app: Router,
}

impl HttpServer {
    /// Create a new server with no application routes beyond `/health`.
    pub fn new(
        config: &ServerConfig,
        governor: Arc<Governor>,
        settings: Arc<RateLimitSettings>,
    ) -> Self {
        Self {
            listen_addr: config.listen_addr,
            admin_addr: config.admin_addr,
            governor,
            settings,
            app: Router::new(),
        }
    }

    /// Mount application routes behind the governor.
    pub fn with_app(mut self, app: Router) -> Self {
        self.app = app;
        self
    }

    /// Router served on the public listener.
    pub fn public_router(&self) -> Router {
        public_router(self.app.clone(), self.governor.clone())
    }

    /// Router served on the admin listener.
    pub fn admin_router(&self) -> Router {
        admin_router(AdminState {
            settings: self.settings.clone(),
            governor: self.governor.clone(),
        })
    }

    /// Start both listeners and run until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let public = self.public_router();
        let admin = self.admin_router();

        let public_listener = TcpListener::bind(self.listen_addr).await?;
        let admin_listener = TcpListener::bind(self.admin_addr).await?;

        info!(addr = %self.listen_addr, "Starting public HTTP server");
        info!(addr = %self.admin_addr, "Starting admin HTTP server");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            signal.await;
            let _ = shutdown_tx.send(true);
        });

        let public_serve = axum::serve(
            public_listener,
            public.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(wait_for(shutdown_rx.clone()))
        .into_future();

        let admin_serve = axum::serve(
            admin_listener,
            admin.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(wait_for(shutdown_rx))
        .into_future();

        tokio::try_join!(public_serve, admin_serve).map_err(|e| {
            error!(error = %e, "HTTP server failed");
            GovernorError::Server(e.to_string())
        })?;

        Ok(())
    }
}

/// Put `app` behind the governor and add the health route.
///
/// Unmatched paths fall back to 404 after the governor has counted them.
pub fn public_router(app: Router, governor: Arc<Governor>) -> Router {
    app.route("/health", get(health_handler))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(middleware::from_fn_with_state(governor, governor_middleware))
}

async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
