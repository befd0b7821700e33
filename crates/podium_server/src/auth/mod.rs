//! Authentication and authorization for Podium
//!
//! Accounts sign in for JWT bearer tokens; each resource request is then
//! resolved to [`Credentials`] and checked by a role based authorizer.

mod authorizer;
mod credentials;
mod jwt;
mod users;

pub use authorizer::*;
pub use credentials::*;
pub use jwt::*;
pub use users::*;

use crate::state::AppState;
use axum::{routing::post, Router};

/// Create the account router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/.account/token", post(create_token))
        .route("/.account/refresh", post(refresh_token))
        .route("/.account/register", post(register))
}
