//! Network module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` takes the shared state,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. Resource routers are mounted with [`NetworkModule::nest`]
//! before serving.

use std::future::Future;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{health_handler, liveness_handler, readiness_handler, AppState};
use super::middleware::with_http_layers;

/// Manages the HTTP server lifecycle.
///
/// 1. `new()` -- takes configuration and shared state
/// 2. `nest()` -- mounts resource routers
/// 3. `start()` -- binds TCP listener to the configured address
/// 4. `serve()` -- accepts connections until shutdown is signalled, then
///    closes the database
pub struct NetworkModule {
    config: NetworkConfig,
    state: AppState,
    routes: Router<AppState>,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            routes: Router::new(),
            listener: None,
        }
    }

    /// Mounts `router` under `path` (e.g. `/widgets`).
    #[must_use]
    pub fn nest(mut self, path: &str, router: Router<AppState>) -> Self {
        self.routes = self.routes.nest(path, router);
        self
    }

    /// The shared state handed to every handler.
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- Kubernetes liveness probe
    /// - `GET /health/ready` -- Kubernetes readiness probe
    /// - every router mounted with [`nest`](Self::nest)
    pub fn build_router(&self) -> Router {
        let routes = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .merge(self.routes.clone());
        with_http_layers(routes, &self.config).with_state(self.state.clone())
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves.
    ///
    /// In-flight requests finish before this returns; the database is closed
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();

        info!("Serving HTTP connections");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped, closing database");
        if let Err(e) = self.state.factory.database().close().await {
            warn!(error = %e, "database close failed");
        }
        Ok(())
    }
}
