//! The shared application state for the Podium server.

use crate::auth::{TokenIssuer, UserStore};
use crate::config::ServerConfig;
use crate::http::BoxedHttpHandler;
use crate::identity::{HttpIdentityVerifier, IdentityVerifier, InteractionStore};
use crate::metrics::MetricsRegistry;
use crate::pipeline::{self, PipelineParts};
use podium_core::{Error, Result};
use podium_store::{
    BackendStore, LockingResourceStore, MemoryBackend, ModifiedResource, ResourceIdentifier,
    ResourceLocker, ResourceStore, StorageBackend, SuffixAuxiliaryStrategy,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The shared state accessible by all handlers.
///
/// Every component is created here and handed to whoever needs it; nothing
/// lives in a global.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// The resource store, already wrapped in per-resource locking.
    pub store: Arc<dyn ResourceStore>,
    pub metrics: Arc<MetricsRegistry>,
    pub users: Arc<UserStore>,
    /// Login interactions waiting for the agent to finish.
    pub interactions: Arc<InteractionStore>,
    pub tokens: Arc<TokenIssuer>,
    /// The event broadcaster for sending change notifications to WebSocket subscribers.
    pub broadcaster: Arc<EventBroadcaster>,
    /// Every request the router does not serve itself goes here.
    pub pipeline: BoxedHttpHandler,
}

impl AppState {
    /// Creates the state and opens the store described by `config`.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let store = open_store(&config)?;
        Self::with_store(config, store)
    }

    /// Creates the state around an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<dyn ResourceStore>) -> Result<Self> {
        let verifier = match &config.identity.service_url {
            Some(url) => Some(Arc::new(HttpIdentityVerifier::new(url, &config.identity)?)
                as Arc<dyn IdentityVerifier>),
            None => None,
        };
        Self::assemble(config, store, verifier)
    }

    /// Creates the state with a custom identity verifier.
    pub fn with_identity_verifier(
        config: ServerConfig,
        store: Arc<dyn ResourceStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self> {
        Self::assemble(config, store, Some(verifier))
    }

    fn assemble(
        config: ServerConfig,
        store: Arc<dyn ResourceStore>,
        verifier: Option<Arc<dyn IdentityVerifier>>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let users = Arc::new(UserStore::new());
        if let Some(password) = &config.auth.admin_password {
            users.init_admin(password)?;
        }
        let tokens = Arc::new(TokenIssuer::new(
            config.auth.jwt_secret.as_bytes(),
            config.auth.token_expiration_hours,
        ));
        let interactions = Arc::new(InteractionStore::new(Duration::from_secs(
            config.identity.interaction_ttl_secs,
        )));
        let metrics = Arc::new(MetricsRegistry::new());
        let broadcaster = Arc::new(EventBroadcaster::new());

        let pipeline = pipeline::build(PipelineParts {
            config: config.clone(),
            store: store.clone(),
            metrics: metrics.clone(),
            users: users.clone(),
            interactions: interactions.clone(),
            tokens: tokens.clone(),
            broadcaster: broadcaster.clone(),
            verifier,
        })?;

        Ok(Self {
            config,
            store,
            metrics,
            users,
            interactions,
            tokens,
            broadcaster,
            pipeline,
        })
    }

    /// Returns the identifier of the root container.
    pub fn root(&self) -> Result<ResourceIdentifier> {
        ResourceIdentifier::parse(&self.config.base_url())
    }
}

/// Opens the backend configured in `config`, creates the root container and
/// wraps the store in per-resource locking.
pub fn open_store(config: &ServerConfig) -> Result<Arc<dyn ResourceStore>> {
    match &config.data_dir {
        #[cfg(feature = "sled-backend")]
        Some(dir) => {
            let path = dir
                .to_str()
                .ok_or_else(|| Error::BadRequest(format!("invalid data dir {}", dir.display())))?;
            build_store(podium_store::SledBackend::open(path)?, config)
        }
        #[cfg(not(feature = "sled-backend"))]
        Some(dir) => Err(Error::NotSupported(format!(
            "cannot open {}: built without a persistent backend",
            dir.display()
        ))),
        None => build_store(MemoryBackend::new(), config),
    }
}

fn build_store<B: StorageBackend + 'static>(
    backend: B,
    config: &ServerConfig,
) -> Result<Arc<dyn ResourceStore>> {
    let root = ResourceIdentifier::parse(&config.base_url())?;
    let auxiliary = Arc::new(SuffixAuxiliaryStrategy::acl_and_meta());
    let store = BackendStore::new(backend)
        .with_auxiliary_strategy(auxiliary.clone())
        .with_max_body_size(config.max_body_size);
    store.initialize_root(&root)?;

    let mut locker = ResourceLocker::new();
    if let Some(ms) = config.lock_timeout_ms {
        locker = locker.with_timeout(Duration::from_millis(ms));
    }
    Ok(Arc::new(LockingResourceStore::with_locker(
        store, auxiliary, locker,
    )))
}

/// A broadcaster for sending real-time [`Event`]s to WebSocket subscribers.
pub struct EventBroadcaster {
    sender: tokio::sync::broadcast::Sender<Event>,
    client_count: AtomicUsize,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(1024);
        Self {
            sender,
            client_count: AtomicUsize::new(0),
        }
    }

    /// Subscribes to the broadcast channel to receive events.
    /// This also increments the client count.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.client_count.fetch_add(1, Ordering::SeqCst);
        self.sender.subscribe()
    }

    /// Decrements the client count when a client unsubscribes.
    pub fn unsubscribe(&self) {
        self.client_count.fetch_sub(1, Ordering::SeqCst);
    }

    /// Broadcasts an `Event` to all active subscribers.
    pub fn broadcast(&self, event: Event) {
        // no subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Defines the types of real-time events sent to WebSocket clients.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// Sent for every resource a request created, changed or deleted.
    ResourceModified(ModifiedResource),
    /// Sent to a client immediately after it connects.
    Connected { client_id: String },
    /// A heartbeat message to keep the connection alive.
    Ping,
}

impl Event {
    /// Serializes the event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        assert_eq!(broadcaster.client_count(), 1);

        broadcaster.broadcast(Event::Ping);
        assert!(matches!(rx.recv().await.unwrap(), Event::Ping));

        broadcaster.unsubscribe();
        assert_eq!(broadcaster.client_count(), 0);
    }

    #[test]
    fn test_event_json() {
        let id = ResourceIdentifier::parse("http://h/doc").unwrap();
        let event = Event::ResourceModified(podium_store::create_modified_resource(
            id,
            podium_store::ModificationType::Created,
        ));
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["type"], "ResourceModified");
        assert_eq!(json["data"]["identifier"], "http://h/doc");
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let config = ServerConfig::default().with_base_url("http://localhost:3000");
        let state = AppState::new(config).unwrap();
        let root = state.root().unwrap();
        assert!(state.store.resource_exists(&root, None).await.unwrap());
    }

    #[cfg(feature = "sled-backend")]
    #[tokio::test]
    async fn test_open_sled_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::default()
            .with_base_url("http://localhost:3000")
            .with_data_dir(dir.path().join("db"));
        let store = open_store(&config).unwrap();
        let root = ResourceIdentifier::parse("http://localhost:3000/").unwrap();
        assert!(store.resource_exists(&root, None).await.unwrap());
    }
}
