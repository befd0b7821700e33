//! # Podium Core
//!
//! Building blocks shared by every Podium crate:
//!
//! - [`error`]: the error taxonomy every handler and store reports with
//! - [`handler`]: the [`AsyncHandler`] contract and its composites
//!
//! Everything in Podium that reacts to a request (routing, parsing,
//! authentication, patching, metrics) is an [`AsyncHandler`], so pipelines are
//! assembled by composing handlers rather than by hard-wiring call chains.

#![doc(html_root_url = "https://docs.rs/podium_core/0.1.0")]

pub mod error;
pub mod handler;

pub use error::{Error, ErrorKind, Result};
pub use handler::{
    AsyncHandler, BoxedHandler, FirstMatchHandler, FirstSuccessHandler, ParallelHandler,
    RunAllHandler, StaticHandler,
};

/// Podium version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
