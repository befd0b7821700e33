//! Podium Store - resource storage behind a uniform contract
//!
//! Resources are documents or containers addressed by a
//! [`ResourceIdentifier`]. The [`ResourceStore`] trait defines the six
//! operations every store offers and how writes report what they changed:
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            LockingResourceStore               │  per-identifier locks
//! ├───────────────────────────────────────────────┤
//! │                BackendStore                   │  hierarchy, conditions,
//! │   patchers │ auxiliary strategy │ listings    │  auxiliaries, patches
//! ├───────────────────────────────────────────────┤
//! │              StorageBackend                   │
//! │        Sled (default) │ Memory                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use podium_store::{
//!     BackendStore, MemoryBackend, Representation, RepresentationMetadata,
//!     RepresentationPreferences, ResourceIdentifier, ResourceStore,
//! };
//!
//! # async fn run() -> podium_core::Result<()> {
//! let store = BackendStore::new(MemoryBackend::new());
//! let doc = ResourceIdentifier::parse("http://localhost:3000/notes/today")?;
//!
//! let changes = store
//!     .set_representation(
//!         &doc,
//!         Representation::from_bytes(RepresentationMetadata::with_content_type("text/plain"), "hi"),
//!         None,
//!     )
//!     .await?;
//! assert_eq!(changes.len(), 3); // root, notes/ and today created
//!
//! let _rep = store
//!     .get_representation(&doc, &RepresentationPreferences::any(), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod auxiliary;
pub mod backend_store;
pub mod backends;
pub mod conditions;
pub mod identifier;
pub mod listing;
pub mod locking;
pub mod metadata;
pub mod patch;
pub mod preferences;
pub mod representation;
pub mod store;
pub mod vocab;

// Re-exports
pub use auxiliary::{AuxiliaryStrategy, SuffixAuxiliaryStrategy};
pub use backend_store::BackendStore;
pub use backends::{MemoryBackend, StorageBackend};
#[cfg(feature = "sled-backend")]
pub use backends::SledBackend;
pub use conditions::Conditions;
pub use identifier::ResourceIdentifier;
pub use locking::{LockingResourceStore, ResourceLocker};
pub use metadata::RepresentationMetadata;
pub use patch::{JsonMergePatcher, JsonPatcher, Patch, PatchInput, PatchResult};
pub use preferences::RepresentationPreferences;
pub use representation::{DataStream, Representation};
pub use store::{
    create_modified_resource, find_created_child, ModificationType, ModifiedResource,
    ResourceStore,
};
