//! One handler per HTTP method, each translating an [`Operation`] into a
//! store call.

use super::operation::Operation;
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use podium_core::{AsyncHandler, BoxedHandler, Error, FirstMatchHandler, Result};
use podium_store::representation::DataStream;
use podium_store::{
    find_created_child, ModificationType, ModifiedResource, Patch, Representation,
    RepresentationMetadata, ResourceStore,
};
use std::sync::Arc;

/// What the response to an operation should contain.
pub struct ResponseDescription {
    pub status: StatusCode,
    pub metadata: Option<RepresentationMetadata>,
    pub data: Option<DataStream>,
    /// Sent as `Location`.
    pub location: Option<String>,
    /// Resources the operation modified, in the order the store reported them.
    pub changes: Vec<ModifiedResource>,
}

impl ResponseDescription {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            metadata: None,
            data: None,
            location: None,
            changes: Vec::new(),
        }
    }

    fn from_changes(status: StatusCode, changes: Vec<ModifiedResource>) -> Self {
        Self {
            changes,
            ..Self::status(status)
        }
    }
}

impl std::fmt::Debug for ResponseDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseDescription")
            .field("status", &self.status)
            .field("location", &self.location)
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}

fn require_method(operation: &Operation, method: Method) -> Result<()> {
    if operation.method == method {
        Ok(())
    } else {
        Err(Error::NotSupported(format!(
            "only {} is supported, got {}",
            method, operation.method
        )))
    }
}

/// `201 Created` if the target itself was created, `204 No Content` otherwise.
fn write_status(operation: &Operation, changes: &[ModifiedResource]) -> StatusCode {
    let created = changes.iter().any(|change| {
        change.identifier() == &operation.target
            && change.modification_type() == ModificationType::Created
    });
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::NO_CONTENT
    }
}

/// Reads the target, evaluating preconditions before cache validators.
///
/// A failed precondition is an error. A failed validator means the client's
/// copy is still current and yields `None`.
async fn read_current(
    store: &dyn ResourceStore,
    operation: &Operation,
) -> Result<Option<Representation>> {
    let (preconditions, validators) = match &operation.conditions {
        Some(conditions) => {
            let (preconditions, validators) = conditions.split_cache_validators();
            (Some(preconditions), Some(validators))
        }
        None => (None, None),
    };
    let representation = store
        .get_representation(&operation.target, &operation.preferences, preconditions.as_ref())
        .await?;
    match validators {
        Some(validators) if !validators.matches_metadata(Some(&representation.metadata)) => {
            Ok(None)
        }
        _ => Ok(Some(representation)),
    }
}

pub struct GetOperationHandler {
    store: Arc<dyn ResourceStore>,
}

impl GetOperationHandler {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AsyncHandler<Operation, ResponseDescription> for GetOperationHandler {
    async fn can_handle(&self, input: &Operation) -> Result<()> {
        require_method(input, Method::GET)
    }

    async fn handle(&self, input: &Operation) -> Result<ResponseDescription> {
        let Some(representation) = read_current(self.store.as_ref(), input).await? else {
            return Ok(ResponseDescription::status(StatusCode::NOT_MODIFIED));
        };
        Ok(ResponseDescription {
            metadata: Some(representation.metadata),
            data: Some(representation.data),
            ..ResponseDescription::status(StatusCode::OK)
        })
    }
}

/// Like GET, without the body.
pub struct HeadOperationHandler {
    store: Arc<dyn ResourceStore>,
}

impl HeadOperationHandler {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AsyncHandler<Operation, ResponseDescription> for HeadOperationHandler {
    async fn can_handle(&self, input: &Operation) -> Result<()> {
        require_method(input, Method::HEAD)
    }

    async fn handle(&self, input: &Operation) -> Result<ResponseDescription> {
        match read_current(self.store.as_ref(), input).await? {
            Some(representation) => Ok(ResponseDescription {
                metadata: Some(representation.metadata),
                ..ResponseDescription::status(StatusCode::OK)
            }),
            None => Ok(ResponseDescription::status(StatusCode::NOT_MODIFIED)),
        }
    }
}

pub struct PutOperationHandler {
    store: Arc<dyn ResourceStore>,
}

impl PutOperationHandler {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AsyncHandler<Operation, ResponseDescription> for PutOperationHandler {
    async fn can_handle(&self, input: &Operation) -> Result<()> {
        require_method(input, Method::PUT)
    }

    async fn handle(&self, input: &Operation) -> Result<ResponseDescription> {
        let body = input.require_body()?;
        let changes = self
            .store
            .set_representation(&input.target, body, input.conditions.as_ref())
            .await?;
        Ok(ResponseDescription::from_changes(
            write_status(input, &changes),
            changes,
        ))
    }
}

/// Adds a new member to the target container.
pub struct PostOperationHandler {
    store: Arc<dyn ResourceStore>,
}

impl PostOperationHandler {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AsyncHandler<Operation, ResponseDescription> for PostOperationHandler {
    async fn can_handle(&self, input: &Operation) -> Result<()> {
        require_method(input, Method::POST)
    }

    async fn handle(&self, input: &Operation) -> Result<ResponseDescription> {
        let body = input.require_body()?;
        let changes = self
            .store
            .add_resource(&input.target, body, input.conditions.as_ref())
            .await?;
        let location = find_created_child(&changes, &input.target)
            .map(|child| child.to_string())
            .ok_or_else(|| {
                Error::Internal(format!("no resource was created in {}", input.target))
            })?;
        Ok(ResponseDescription {
            location: Some(location),
            ..ResponseDescription::from_changes(StatusCode::CREATED, changes)
        })
    }
}

pub struct PatchOperationHandler {
    store: Arc<dyn ResourceStore>,
}

impl PatchOperationHandler {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AsyncHandler<Operation, ResponseDescription> for PatchOperationHandler {
    async fn can_handle(&self, input: &Operation) -> Result<()> {
        require_method(input, Method::PATCH)
    }

    async fn handle(&self, input: &Operation) -> Result<ResponseDescription> {
        let body = input.require_body()?;
        if body.is_empty {
            return Err(Error::BadRequest("PATCH requires a body".to_string()));
        }
        let patch = Patch::new(body.metadata, body.data);
        let changes = self
            .store
            .modify_resource(&input.target, patch, input.conditions.as_ref())
            .await?;
        Ok(ResponseDescription::from_changes(
            write_status(input, &changes),
            changes,
        ))
    }
}

pub struct DeleteOperationHandler {
    store: Arc<dyn ResourceStore>,
}

impl DeleteOperationHandler {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AsyncHandler<Operation, ResponseDescription> for DeleteOperationHandler {
    async fn can_handle(&self, input: &Operation) -> Result<()> {
        require_method(input, Method::DELETE)
    }

    async fn handle(&self, input: &Operation) -> Result<ResponseDescription> {
        let changes = self
            .store
            .delete_resource(&input.target, input.conditions.as_ref())
            .await?;
        Ok(ResponseDescription::from_changes(
            StatusCode::NO_CONTENT,
            changes,
        ))
    }
}

/// All method handlers, routed by method.
pub fn operation_handler(
    store: Arc<dyn ResourceStore>,
) -> BoxedHandler<Operation, ResponseDescription> {
    Arc::new(FirstMatchHandler::new(vec![
        Arc::new(GetOperationHandler::new(store.clone()))
            as BoxedHandler<Operation, ResponseDescription>,
        Arc::new(HeadOperationHandler::new(store.clone())),
        Arc::new(PutOperationHandler::new(store.clone())),
        Arc::new(PostOperationHandler::new(store.clone())),
        Arc::new(PatchOperationHandler::new(store.clone())),
        Arc::new(DeleteOperationHandler::new(store)),
    ]))
}
