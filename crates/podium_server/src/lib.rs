//! # Podium Server
//!
//! HTTP front end for a Podium resource store.
//!
//! ## Features
//!
//! - **Resources**: `GET`, `HEAD`, `PUT`, `POST`, `PATCH` and `DELETE` on any
//!   path, with conditional requests and content negotiation
//! - **Authentication**: JWT bearer tokens with role based authorization
//! - **Identity login**: personal number verification through an external
//!   identity service, plus the account switch page
//! - **Metrics**: Prometheus request duration histogram and summary
//! - **Notifications**: WebSocket stream of resource modifications
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     axum Router                           │
//! │  /.account/{token,refresh,register}   /.notifications     │
//! ├──────────────────────────────────────────────────────────┤
//! │  fallback ──► MetricHandler                               │
//! │               └── FirstMatchHandler                       │
//! │                   ├── account pages (interaction, login)  │
//! │                   └── LdpHandler                          │
//! │                       parse ► authenticate ► authorize    │
//! │                       ► operate ► notify ► write headers  │
//! ├──────────────────────────────────────────────────────────┤
//! │        LockingResourceStore ► BackendStore ► backend      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use podium_server::{PodiumServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default().with_port(3000);
//!     let server = PodiumServer::new(config)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Examples
//!
//! ```bash
//! # create a document
//! curl -X PUT http://localhost:3000/notes/today \
//!   -H "Authorization: Bearer YOUR_TOKEN" \
//!   -H "Content-Type: text/plain" \
//!   -d 'hello'
//!
//! # read it back only if it changed
//! curl http://localhost:3000/notes/today -H 'If-None-Match: "..."'
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod ldp;
pub mod metrics;
pub mod notifications;
pub mod pipeline;
pub mod server;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ErrorResponse};
pub use http::{BoxedHttpHandler, HttpHandler, HttpRequest};
pub use server::PodiumServer;
pub use state::{AppState, Event, EventBroadcaster};

/// Podium server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
