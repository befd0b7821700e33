//! Who is making a request.

use super::jwt::TokenIssuer;
use crate::http::HttpRequest;
use async_trait::async_trait;
use axum::http::header;
use podium_core::{AsyncHandler, BoxedHandler, Error, FirstSuccessHandler, Result};
use std::sync::Arc;

/// An authenticated agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: String,
    pub username: Option<String>,
    pub roles: Vec<String>,
}

impl Agent {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// The credentials extracted from a request; `agent` is `None` for anonymous
/// requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub agent: Option<Agent>,
}

impl Credentials {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn is_public(&self) -> bool {
        self.agent.is_none()
    }
}

/// Reads `Authorization: Bearer <token>`.
pub struct BearerCredentialsExtractor {
    tokens: Arc<TokenIssuer>,
}

impl BearerCredentialsExtractor {
    pub fn new(tokens: Arc<TokenIssuer>) -> Self {
        Self { tokens }
    }
}

fn bearer_token(request: &HttpRequest) -> Option<&str> {
    let value = request.header(header::AUTHORIZATION)?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

#[async_trait]
impl AsyncHandler<HttpRequest, Credentials> for BearerCredentialsExtractor {
    async fn can_handle(&self, input: &HttpRequest) -> Result<()> {
        match bearer_token(input) {
            Some(_) => Ok(()),
            None => Err(Error::NotSupported("no bearer token".to_string())),
        }
    }

    async fn handle(&self, input: &HttpRequest) -> Result<Credentials> {
        let token = bearer_token(input)
            .ok_or_else(|| Error::NotSupported("no bearer token".to_string()))?;
        let claims = self.tokens.verify(token)?;
        if !claims.is_access() {
            return Err(Error::Unauthorized("not an access token".to_string()));
        }
        Ok(Credentials {
            agent: Some(Agent {
                id: claims.sub,
                username: claims.username,
                roles: claims.roles,
            }),
        })
    }
}

/// Treats every request as anonymous.
pub struct PublicCredentialsExtractor;

#[async_trait]
impl AsyncHandler<HttpRequest, Credentials> for PublicCredentialsExtractor {
    async fn handle(&self, _input: &HttpRequest) -> Result<Credentials> {
        Ok(Credentials::public())
    }
}

/// Bearer token when one verifies, anonymous otherwise.
pub fn credentials_extractor(tokens: Arc<TokenIssuer>) -> BoxedHandler<HttpRequest, Credentials> {
    Arc::new(FirstSuccessHandler::new(vec![
        Arc::new(BearerCredentialsExtractor::new(tokens)) as BoxedHandler<HttpRequest, Credentials>,
        Arc::new(PublicCredentialsExtractor),
    ]))
}
