//! Identity verification and login interactions.
//!
//! ## Endpoints
//!
//! - `POST /.account/interaction` - Start a login interaction
//! - `GET  /.account/interaction` - Show the current interaction
//! - `POST /.account/login/identity` - Verify a personal number
//! - `GET|POST /.account/switch` - Switch account form

mod handlers;
mod interaction;
mod verifier;

pub use handlers::*;
pub use interaction::*;
pub use verifier::*;

/// Path prefix reserved for account pages.
pub const ACCOUNT_PREFIX: &str = "/.account/";
