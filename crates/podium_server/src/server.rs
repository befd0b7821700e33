//! The Podium HTTP server.

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::state::AppState;
use crate::{auth, notifications};

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use podium_core::{Error, Result};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Podium server.
///
/// Account routes and the notification socket are plain axum routes; every
/// other request is handed to the handler pipeline in [`AppState`].
pub struct PodiumServer {
    state: AppState,
}

impl PodiumServer {
    /// Creates a server, opening the store described by `config`.
    pub fn new(config: ServerConfig) -> Result<Self> {
        Ok(Self {
            state: AppState::new(config)?,
        })
    }

    /// Creates a server around a pre-existing `AppState`.
    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Builds the `axum` router, combining all routes and middleware.
    pub fn build_router(&self) -> Router {
        let app: Router<AppState> = Router::new()
            .merge(auth::router())
            .merge(notifications::router())
            .fallback(dispatch);

        let app = app.with_state(self.state.clone());

        let app = if self.config().cors_enabled {
            app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any)
                    .expose_headers(Any),
            )
        } else {
            app
        };

        if self.config().tracing {
            app.layer(TraceLayer::new_for_http())
        } else {
            app
        }
    }

    fn addr(&self) -> Result<SocketAddr> {
        self.config()
            .bind_address()
            .parse()
            .map_err(|e| Error::Internal(format!("Invalid address: {}", e)))
    }

    /// Runs the server indefinitely.
    pub async fn run(self) -> Result<()> {
        let addr = self.addr()?;
        let router = self.build_router();

        info!("Starting Podium server on http://{}", addr);
        info!("Root container: {}", self.config().base_url());

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }

    /// Runs the server until `shutdown_signal` completes.
    pub async fn run_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr()?;
        let router = self.build_router();

        info!("Starting Podium server on http://{}", addr);
        info!("Root container: {}", self.config().base_url());

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        info!("Podium server stopped");
        Ok(())
    }
}

/// Hands a request the router does not know to the pipeline.
async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let request = HttpRequest::from_request(request);
    match state.pipeline.handle_safe(&request).await {
        Ok(response) => response,
        Err(err) => ApiError::from(err).into_response(),
    }
}
