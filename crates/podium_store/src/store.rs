//! The `ResourceStore` contract and modification reporting.

use crate::conditions::Conditions;
use crate::identifier::ResourceIdentifier;
use crate::patch::Patch;
use crate::preferences::RepresentationPreferences;
use crate::representation::Representation;
use async_trait::async_trait;
use podium_core::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a resource was affected by a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationType {
    Created,
    Changed,
    Deleted,
}

impl fmt::Display for ModificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModificationType::Created => "created",
            ModificationType::Changed => "changed",
            ModificationType::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// One entry of the change report returned by every write operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModifiedResource {
    identifier: ResourceIdentifier,
    modification_type: ModificationType,
}

impl ModifiedResource {
    pub fn identifier(&self) -> &ResourceIdentifier {
        &self.identifier
    }

    pub fn modification_type(&self) -> ModificationType {
        self.modification_type
    }
}

/// Pairs a resource with the way it was modified.
///
/// This is the only way to build a [`ModifiedResource`], so every store reports
/// changes in the same shape.
pub fn create_modified_resource(
    identifier: ResourceIdentifier,
    modification_type: ModificationType,
) -> ModifiedResource {
    ModifiedResource {
        identifier,
        modification_type,
    }
}

/// Finds the resource `add_resource` created directly in `container`.
pub fn find_created_child<'a>(
    changes: &'a [ModifiedResource],
    container: &ResourceIdentifier,
) -> Option<&'a ResourceIdentifier> {
    changes
        .iter()
        .find(|change| {
            change.modification_type == ModificationType::Created
                && change.identifier.parent().as_ref() == Some(container)
        })
        .map(|change| &change.identifier)
}

/// Durable resource state.
///
/// Every method is one logical unit of work. Write operations return the
/// resources they affected in write order. Implementations document whether
/// they are atomic; see [`LockingResourceStore`](crate::LockingResourceStore)
/// for the layer that makes condition checks atomic per identifier.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Checks whether `identifier` exists and satisfies `conditions`. No side effects.
    async fn resource_exists(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
    ) -> Result<bool>;

    /// Returns the representation that best matches `preferences`.
    async fn get_representation(
        &self,
        identifier: &ResourceIdentifier,
        preferences: &RepresentationPreferences,
        conditions: Option<&Conditions>,
    ) -> Result<Representation>;

    /// Creates or fully replaces `identifier`, creating missing ancestors.
    async fn set_representation(
        &self,
        identifier: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>>;

    /// Creates a new resource beneath `container` under a server-chosen name.
    async fn add_resource(
        &self,
        container: &ResourceIdentifier,
        representation: Representation,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>>;

    /// Removes `identifier` and its auxiliary resources.
    async fn delete_resource(
        &self,
        identifier: &ResourceIdentifier,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>>;

    /// Applies a partial update, creating the resource if it is missing.
    async fn modify_resource(
        &self,
        identifier: &ResourceIdentifier,
        patch: Patch,
        conditions: Option<&Conditions>,
    ) -> Result<Vec<ModifiedResource>>;
}
