//! A [`ResourceStore`] on top of a [`StorageBackend`].
//!
//! # Policies
//!
//! - Identifiers ending in `/` are containers. `/a` and `/a/` never coexist,
//!   and no resource may sit below a document.
//! - Change reports follow write order: newly created ancestors outermost
//!   first, then the target, then the pre-existing parent whose membership
//!   changed, then auxiliaries. A missing container that receives its first
//!   child is reported `created`, never `changed`.
//! - Emptied containers are kept; deleting a non-empty container conflicts.
//! - Patching a missing resource creates it.
//! - Auxiliaries need an existing subject and are not listed as children.
//!   Writing or deleting one reports its subject `changed`.
//!
//! `BackendStore` performs no locking. Conditions are checked against the
//! state read at the start of the write; wrap it in a
//! [`LockingResourceStore`](crate::LockingResourceStore) for per-identifier
//! atomicity.

use crate::auxiliary::{AuxiliaryStrategy, SuffixAuxiliaryStrategy};
use crate::backends::StorageBackend;
use crate::conditions::Conditions;
use crate::identifier::ResourceIdentifier;
use crate::listing::{self, LISTING_TYPES};
use crate::metadata::RepresentationMetadata;
use crate::patch::{default_patcher, Patch, PatchInput, PatchResult};
use crate::preferences::RepresentationPreferences;
use crate::representation::{Representation, DEFAULT_MAX_BODY_SIZE};
use crate::store::{create_modified_resource, ModificationType, ModifiedResource, ResourceStore};
use crate::vocab;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use log::{debug, info};
use podium_core::{AsyncHandler, BoxedHandler, Error, Result};
use std::sync::Arc;

/// Stores resources in a [`StorageBackend`].
pub struct BackendStore<B> {
    backend: B,
    auxiliary: Arc<dyn AuxiliaryStrategy>,
    patcher: BoxedHandler<PatchInput, PatchResult>,
    max_body_size: usize,
}

impl<B: StorageBackend> BackendStore<B> {
    /// Creates a store with `.acl`/`.meta` auxiliaries and the JSON patchers.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            auxiliary: Arc::new(SuffixAuxiliaryStrategy::default()),
            patcher: default_patcher(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_auxiliary_strategy(mut self, strategy: Arc<dyn AuxiliaryStrategy>) -> Self {
        self.auxiliary = strategy;
        self
    }

    pub fn with_patcher(mut self, patcher: BoxedHandler<PatchInput, PatchResult>) -> Self {
        self.patcher = patcher;
        self
    }

    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn auxiliary_strategy(&self) -> Arc<dyn AuxiliaryStrategy> {
        self.auxiliary.clone()
    }

    /// Creates the root container if it does not exist yet.
    pub fn initialize_root(&self, root: &ResourceIdentifier) -> Result<bool> {
        if !root.is_root() {
            return Err(Error::BadRequest(format!("{} is not a root container", root)));
        }
        if self.backend.exists(root)? {
            return Ok(false);
        }
        self.backend
            .write_container(root, &container_metadata(RepresentationMetadata::new()))?;
        info!("Initialized root container {}", root);
        Ok(true)
    }

    fn check_conditions(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
        current: Option<&RepresentationMetadata>,
    ) -> Result<()> {
        match conditions {
            Some(conditions) if !conditions.matches_metadata(current) => Err(
                Error::PreconditionFailed(format!("conditions do not hold for {}", identifier)),
            ),
            _ => Ok(()),
        }
    }

    /// Rejects writes that would break the hierarchy or the auxiliary rules.
    fn validate_target(&self, identifier: &ResourceIdentifier) -> Result<()> {
        if !identifier.is_root() && self.backend.exists(&identifier.alternate())? {
            return Err(Error::Conflict(format!(
                "{} conflicts with existing {}",
                identifier,
                identifier.alternate()
            )));
        }
        if let Some(subject) = self.auxiliary.subject_of(identifier) {
            if self.auxiliary.is_auxiliary(&subject) {
                return Err(Error::BadRequest(format!(
                    "auxiliary resources cannot have auxiliaries: {}",
                    identifier
                )));
            }
            if !self.backend.exists(&subject)? {
                return Err(Error::Conflict(format!(
                    "subject {} of auxiliary {} does not exist",
                    subject, identifier
                )));
            }
        }
        Ok(())
    }

    /// Lists the missing ancestors of `identifier`, outermost first.
    fn missing_ancestors(&self, identifier: &ResourceIdentifier) -> Result<Vec<ResourceIdentifier>> {
        let mut missing = Vec::new();
        let mut current = identifier.parent();
        while let Some(parent) = current {
            if self.backend.exists(&parent)? {
                break;
            }
            if self.backend.exists(&parent.alternate())? {
                return Err(Error::Conflict(format!(
                    "{} exists as a document",
                    parent.alternate()
                )));
            }
            current = parent.parent();
            missing.push(parent);
        }
        missing.reverse();
        Ok(missing)
    }

    /// Updates the modification stamps of an existing resource.
    fn touch(&self, identifier: &ResourceIdentifier) -> Result<()> {
        if let Some(mut metadata) = self.backend.get_metadata(identifier)? {
            stamp(&mut metadata);
            self.backend.update_metadata(identifier, &metadata)?;
        }
        Ok(())
    }

    /// Writes `identifier` and everything it implies, returning the change report.
    fn commit(
        &self,
        identifier: &ResourceIdentifier,
        metadata: RepresentationMetadata,
        data: &[u8],
        existed: bool,
    ) -> Result<Vec<ModifiedResource>> {
        let missing = self.missing_ancestors(identifier)?;
        let mut changes = Vec::with_capacity(missing.len() + 2);

        for ancestor in &missing {
            self.backend
                .write_container(ancestor, &container_metadata(RepresentationMetadata::new()))?;
            changes.push(create_modified_resource(
                ancestor.clone(),
                ModificationType::Created,
            ));
        }

        if identifier.is_container() {
            self.backend
                .write_container(identifier, &container_metadata(metadata))?;
        } else {
            self.backend
                .write_document(identifier, &document_metadata(metadata, data.len()), data)?;
        }
        changes.push(create_modified_resource(
            identifier.clone(),
            if existed {
                ModificationType::Changed
            } else {
                ModificationType::Created
            },
        ));

        if let Some(subject) = self.auxiliary.subject_of(identifier) {
            self.touch(&subject)?;
            changes.push(create_modified_resource(subject, ModificationType::Changed));
        } else if !existed {
            // the outermost new resource joined an existing container
            let outermost = missing.first().unwrap_or(identifier);
            if let Some(parent) = outermost.parent() {
                self.touch(&parent)?;
                changes.push(create_modified_resource(parent, ModificationType::Changed));
            }
        }

        debug!("Wrote {} ({} changes)", identifier, changes.len());
        Ok(changes)
    }

    /// Picks the identifier for a new child of `container`.
    fn new_child(
        &self,
        container: &ResourceIdentifier,
        metadata: &RepresentationMetadata,
    ) -> Result<ResourceIdentifier> {
        let suffix = if metadata.is_container_hint() { "/" } else { "" };
        if let Some(name) = metadata.first(vocab::SLUG).and_then(sanitize_slug) {
            if let Ok(child) = container.join(&format!("{}{}", name, suffix)) {
                if !self.auxiliary.is_auxiliary(&child)
                    && !self.backend.exists(&child)?
                    && !self.backend.exists(&child.alternate())?
                {
                    return Ok(child);
                }
            }
        }
        container.join(&format!("{}{}", uuid::Uuid::new_v4(), suffix))
    }

    fn write_representation(
        &self,
        identifier: &ResourceIdentifier,
        mut metadata: RepresentationMetadata,
        data: Bytes,
        existed: bool,
    ) -> Result<Vec<ModifiedResource>> {
        if identifier.is_container() {
            if !data.is_empty() {
                return Err(Error::BadRequest(
                    "containers cannot be written with a body".to_string(),
                ));
            }
        } else if metadata.content_type().is_none() {
            return Err(Error::BadRequest(format!(
                "missing content type for {}",
                identifier
            )));
        }
        metadata.remove_internal();
        self.commit(identifier, metadata, &data, existed)
    }
}

/// Sets modification time and a fresh revision.
fn stamp(metadata: &mut RepresentationMetadata) {
    metadata.set_modified(Utc::now());
    metadata.set_revision(uuid::Uuid::new_v4().simple().to_string());
}

fn container_metadata(mut metadata: RepresentationMetadata) -> RepresentationMetadata {
    metadata.remove(vocab::CONTENT_TYPE);
    metadata.remove(vocab::CONTENT_LENGTH);
    metadata.add_type(vocab::LDP_CONTAINER);
    metadata.add_type(vocab::LDP_BASIC_CONTAINER);
    metadata.add_type(vocab::LDP_RESOURCE);
    stamp(&mut metadata);
    metadata
}

fn document_metadata(mut metadata: RepresentationMetadata, length: usize) -> RepresentationMetadata {
    metadata.set_content_length(length as u64);
    metadata.add_type(vocab::LDP_RESOURCE);
    stamp(&mut metadata);
    metadata
}

/// Keeps the characters that are safe in a single path segment.
fn sanitize_slug(slug: &str) -> Option<String> {
    let name: String = slug
        .trim()
        .trim_end_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        None
    } else {
        Some(name)
    }
}

#[async_trait]
impl<B: StorageBackend> ResourceStore for BackendStore<B> {
    async fn resource_exists(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
    ) -> Result<bool> {
        Ok(match self.backend.get_metadata(identifier)? {
            Some(metadata) => conditions.map_or(true, |c| c.matches_metadata(Some(&metadata))),
            None => false,
        })
    }

    async fn get_representation(
        &self,
        identifier: &ResourceIdentifier,
        preferences: &RepresentationPreferences,
        conditions: Option<&Conditions>,
    ) -> Result<Representation> {
        let mut metadata = self
            .backend
            .get_metadata(identifier)?
            .ok_or_else(|| Error::NotFound(identifier.to_string()))?;
        self.check_conditions(identifier, conditions, Some(&metadata))?;

        if identifier.is_container() {
            let content_type = preferences.select_type(&LISTING_TYPES)?;
            let children: Vec<_> = self
                .backend
                .get_children(identifier)?
                .into_iter()
                .filter(|child| !self.auxiliary.is_auxiliary(child))
                .collect();
            let body = listing::render(identifier, &children, content_type)?;
            metadata.set_content_type(content_type);
            metadata.set_content_length(body.len() as u64);
            for child in &children {
                metadata.add(vocab::LDP_CONTAINS, child.as_str());
            }
            return Ok(Representation::from_bytes(metadata, body));
        }

        let stored_type = metadata
            .content_type()
            .unwrap_or(vocab::media::OCTET_STREAM)
            .to_string();
        preferences.select_type(&[stored_type.as_str()])?;
        let data = self
            .backend
            .get_data(identifier)?
            .ok_or_else(|| Error::NotFound(identifier.to_string()))?;
        Ok(Representation::from_bytes(metadata, data))
    }

    async fn set_representation(
        &self,
        identifier: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>> {
        let (metadata, data) = representation.into_parts(self.max_body_size).await?;

        let current = self.backend.get_metadata(identifier)?;
        self.check_conditions(identifier, conditions, current.as_ref())?;
        self.validate_target(identifier)?;
        self.write_representation(identifier, metadata, data, current.is_some())
    }

    async fn add_resource(
        &self,
        container: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>> {
        if !container.is_container() {
            return Err(Error::MethodNotAllowed(format!(
                "{} is not a container",
                container
            )));
        }
        let (metadata, data) = representation.into_parts(self.max_body_size).await?;

        let current = self.backend.get_metadata(container)?;
        self.check_conditions(container, conditions, current.as_ref())?;
        if current.is_none() {
            self.validate_target(container)?;
        }
        let child = self.new_child(container, &metadata)?;
        self.write_representation(&child, metadata, data, false)
    }

    async fn delete_resource(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>> {
        let current = self
            .backend
            .get_metadata(identifier)?
            .ok_or_else(|| Error::NotFound(identifier.to_string()))?;
        self.check_conditions(identifier, conditions, Some(&current))?;
        if identifier.is_root() {
            return Err(Error::MethodNotAllowed(
                "the root container cannot be deleted".to_string(),
            ));
        }
        if identifier.is_container() {
            let has_children = self
                .backend
                .get_children(identifier)?
                .iter()
                .any(|child| !self.auxiliary.is_auxiliary(child));
            if has_children {
                return Err(Error::Conflict(format!(
                    "container {} is not empty",
                    identifier
                )));
            }
        }

        self.backend.delete(identifier)?;
        let mut changes = vec![create_modified_resource(
            identifier.clone(),
            ModificationType::Deleted,
        )];

        if let Some(subject) = self.auxiliary.subject_of(identifier) {
            self.touch(&subject)?;
            changes.push(create_modified_resource(subject, ModificationType::Changed));
        } else if let Some(parent) = identifier.parent() {
            self.touch(&parent)?;
            changes.push(create_modified_resource(parent, ModificationType::Changed));
        }

        for auxiliary in self.auxiliary.auxiliaries_of(identifier) {
            if self.backend.delete(&auxiliary)? {
                changes.push(create_modified_resource(auxiliary, ModificationType::Deleted));
            }
        }

        info!("Deleted {} ({} changes)", identifier, changes.len());
        Ok(changes)
    }

    async fn modify_resource(
        &self,
        identifier: &ResourceIdentifier,
        patch: Patch,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>> {
        if identifier.is_container() {
            return Err(Error::Conflict(format!(
                "container {} cannot be patched",
                identifier
            )));
        }
        let patch_type = patch
            .content_type()
            .ok_or_else(|| Error::UnsupportedMediaType("patch without content type".to_string()))?
            .to_string();
        let patch_data = patch.read_to_bytes(self.max_body_size).await?;

        let current = self.backend.get_metadata(identifier)?;
        self.check_conditions(identifier, conditions, current.as_ref())?;
        if current.is_none() {
            self.validate_target(identifier)?;
        }

        let input = PatchInput {
            identifier: identifier.clone(),
            patch_type,
            patch: patch_data,
            current: match current {
                Some(_) => self.backend.get_data(identifier)?,
                None => None,
            },
            current_type: current
                .as_ref()
                .and_then(|m| m.content_type())
                .map(str::to_string),
        };
        if let Err(err) = self.patcher.can_handle(&input).await {
            return Err(Error::UnsupportedMediaType(format!(
                "no patcher for {}: {}",
                input.patch_type, err
            )));
        }
        let result = self.patcher.handle(&input).await?;

        let existed = current.is_some();
        let mut metadata = current.unwrap_or_default();
        metadata.set_content_type(result.content_type);
        self.write_representation(identifier, metadata, result.data, existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_slug() {
        assert_eq!(sanitize_slug("my doc").as_deref(), Some("my-doc"));
        assert_eq!(sanitize_slug("notes.txt").as_deref(), Some("notes.txt"));
        assert_eq!(sanitize_slug("folder/").as_deref(), Some("folder"));
        assert_eq!(sanitize_slug(".."), None);
        assert_eq!(sanitize_slug("  "), None);
    }

    #[test]
    fn test_container_metadata_types() {
        let metadata = container_metadata(RepresentationMetadata::with_content_type("text/turtle"));
        assert!(metadata.content_type().is_none());
        assert!(metadata.has_type(vocab::LDP_BASIC_CONTAINER));
        assert!(metadata.revision().is_some());
        assert!(metadata.modified().is_some());
    }

    #[test]
    fn test_stamp_changes_revision() {
        let mut metadata = RepresentationMetadata::new();
        stamp(&mut metadata);
        let first = metadata.etag();
        stamp(&mut metadata);
        assert_ne!(first, metadata.etag());
    }
}
