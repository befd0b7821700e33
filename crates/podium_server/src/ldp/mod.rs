//! Resource requests: everything outside the account pages.
//!
//! A request passes through these stages, each an [`AsyncHandler`]:
//!
//! 1. [`OperationParser`] turns the request into an [`Operation`]
//! 2. the credentials extractor identifies the agent
//! 3. the [`RoleAuthorizer`] checks the modes the operation needs
//! 4. the operation handlers call the store
//! 5. the change listeners see what was modified
//! 6. the metadata writers turn the result into headers

mod headers;
mod listeners;
mod operation;
mod operations;

pub use headers::*;
pub use listeners::*;
pub use operation::*;
pub use operations::*;

use crate::auth::{
    credentials_extractor, required_modes, AuthorizationRequest, Credentials, RoleAuthorizer,
    TokenIssuer,
};
use crate::http::HttpRequest;
use crate::identity::ACCOUNT_PREFIX;
use crate::state::EventBroadcaster;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use podium_core::{AsyncHandler, BoxedHandler, Error, Result};
use podium_store::{ModifiedResource, RepresentationMetadata, ResourceStore};
use std::sync::Arc;

/// Serves resource requests against a store.
pub struct LdpHandler {
    parser: BoxedHandler<HttpRequest, Operation>,
    credentials: BoxedHandler<HttpRequest, Credentials>,
    authorizer: BoxedHandler<AuthorizationRequest>,
    operations: BoxedHandler<Operation, ResponseDescription>,
    listener: BoxedHandler<Vec<ModifiedResource>, Option<()>>,
    writer: BoxedHandler<RepresentationMetadata, Vec<HeaderPairs>>,
}

impl LdpHandler {
    /// Builds the default stages.
    pub fn new(
        base_url: &str,
        store: Arc<dyn ResourceStore>,
        tokens: Arc<TokenIssuer>,
        broadcaster: Arc<EventBroadcaster>,
        public_read: bool,
    ) -> Self {
        Self {
            parser: Arc::new(OperationParser::new(base_url)),
            credentials: credentials_extractor(tokens),
            authorizer: Arc::new(RoleAuthorizer::new(public_read)),
            operations: operation_handler(store),
            listener: change_listener(broadcaster),
            writer: metadata_writer(),
        }
    }

    async fn authorize(&self, input: &HttpRequest, operation: &Operation) -> Result<()> {
        let credentials = self.credentials.handle_safe(input).await?;
        let request = AuthorizationRequest {
            credentials,
            modes: required_modes(&operation.method, &operation.target),
            target: operation.target.clone(),
        };
        self.authorizer.handle_safe(&request).await
    }

    async fn respond(&self, description: ResponseDescription) -> Result<Response> {
        let mut builder = Response::builder().status(description.status);
        if let Some(metadata) = &description.metadata {
            for (name, value) in self.writer.handle_safe(metadata).await?.into_iter().flatten() {
                builder = builder.header(name, value);
            }
        }
        if let Some(location) = &description.location {
            let value = HeaderValue::from_str(location)
                .map_err(|e| Error::Internal(format!("invalid location {}: {}", location, e)))?;
            builder = builder.header(header::LOCATION, value);
        }
        let body = match description.data {
            Some(data) => Body::from_stream(data),
            None => Body::empty(),
        };
        builder
            .body(body)
            .map_err(|e| Error::Internal(format!("failed to build response: {}", e)))
    }
}

#[async_trait]
impl AsyncHandler<HttpRequest, Response> for LdpHandler {
    async fn can_handle(&self, input: &HttpRequest) -> Result<()> {
        if input.path().starts_with(ACCOUNT_PREFIX) {
            return Err(Error::NotSupported(format!(
                "{} is not a resource path",
                input.path()
            )));
        }
        Ok(())
    }

    async fn handle(&self, input: &HttpRequest) -> Result<Response> {
        let operation = self.parser.handle_safe(input).await?;
        if let Err(err) = self.operations.can_handle(&operation).await {
            return Err(if err.is_unsupported() {
                Error::MethodNotAllowed(format!("{} is not supported", operation.method))
            } else {
                err
            });
        }
        self.authorize(input, &operation).await?;

        let description = self.operations.handle(&operation).await?;
        tracing::debug!(
            method = %operation.method,
            target = %operation.target,
            status = %description.status,
            changes = description.changes.len(),
            "Operation completed"
        );
        if !description.changes.is_empty() {
            self.listener.handle_safe(&description.changes).await?;
        }
        self.respond(description).await
    }
}
