//! Assembly of the HTTP handler tree.
//!
//! ```text
//! MetricHandler (when enabled)
//! └── FirstMatchHandler
//!     ├── InteractionHandler
//!     ├── IdentityVerificationHandler (when a verifier is configured)
//!     ├── SwitchAccountHandler
//!     └── LdpHandler
//! ```

use crate::auth::{TokenIssuer, UserStore};
use crate::config::ServerConfig;
use crate::http::BoxedHttpHandler;
use crate::identity::{
    IdentityVerificationHandler, IdentityVerifier, InteractionHandler, InteractionStore,
    SwitchAccountHandler,
};
use crate::ldp::LdpHandler;
use crate::metrics::{MetricHandler, MetricsRegistry};
use crate::state::EventBroadcaster;
use podium_core::{FirstMatchHandler, Result};
use podium_store::ResourceStore;
use std::sync::Arc;

/// Everything the handlers are built from.
pub struct PipelineParts {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn ResourceStore>,
    pub metrics: Arc<MetricsRegistry>,
    pub users: Arc<UserStore>,
    pub interactions: Arc<InteractionStore>,
    pub tokens: Arc<TokenIssuer>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub verifier: Option<Arc<dyn IdentityVerifier>>,
}

/// Builds the handler every non-router request is given to.
pub fn build(parts: PipelineParts) -> Result<BoxedHttpHandler> {
    let config = parts.config;

    let mut handlers: Vec<BoxedHttpHandler> =
        vec![Arc::new(InteractionHandler::new(parts.interactions.clone()))];
    if let Some(verifier) = parts.verifier {
        handlers.push(Arc::new(IdentityVerificationHandler::new(
            verifier,
            parts.users.clone(),
            parts.interactions.clone(),
            config.identity.end_user_ip.clone(),
        )));
    } else {
        tracing::info!("No identity service configured, identity login disabled");
    }
    handlers.push(Arc::new(SwitchAccountHandler::new(parts.interactions)));
    handlers.push(Arc::new(LdpHandler::new(
        &config.base_url(),
        parts.store,
        parts.tokens,
        parts.broadcaster,
        config.auth.public_read,
    )));

    let router: BoxedHttpHandler = Arc::new(FirstMatchHandler::new(handlers));
    if !config.metrics.enabled {
        return Ok(router);
    }
    Ok(Arc::new(MetricHandler::new(
        router,
        parts.metrics,
        config.metrics.endpoint.clone(),
    )))
}
