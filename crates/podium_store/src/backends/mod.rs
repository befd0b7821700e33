//! Storage backends for the resource store
//!
//! Backends only know how to persist entries keyed by identifier; all
//! resource semantics (hierarchy, conditions, auxiliaries) live in
//! [`BackendStore`](crate::BackendStore).
//! - Memory: In-memory storage (testing/ephemeral)
//! - Sled: Embedded transactional database (default)

pub mod memory;

#[cfg(feature = "sled-backend")]
pub mod sled;

use crate::{RepresentationMetadata, ResourceIdentifier};
use bytes::Bytes;
use podium_core::Result;
use serde::{Deserialize, Serialize};

/// What a backend stores per identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub metadata: RepresentationMetadata,
    /// Always empty for containers.
    pub data: Vec<u8>,
}

/// Trait for storage backends
///
/// Children of a container are all entries whose identifier extends the
/// container's by exactly one segment (documents or containers).
pub trait StorageBackend: Send + Sync {
    /// Get the metadata of an entry
    fn get_metadata(&self, id: &ResourceIdentifier) -> Result<Option<RepresentationMetadata>>;

    /// Get the data of a document
    fn get_data(&self, id: &ResourceIdentifier) -> Result<Option<Bytes>>;

    /// List the direct children of a container
    fn get_children(&self, container: &ResourceIdentifier) -> Result<Vec<ResourceIdentifier>>;

    /// Store a document, replacing any previous entry
    fn write_document(
        &self,
        id: &ResourceIdentifier,
        metadata: &RepresentationMetadata,
        data: &[u8],
    ) -> Result<()>;

    /// Store a container entry, replacing any previous entry
    fn write_container(&self, id: &ResourceIdentifier, metadata: &RepresentationMetadata)
        -> Result<()>;

    /// Replace the metadata of an existing entry, keeping its data
    fn update_metadata(&self, id: &ResourceIdentifier, metadata: &RepresentationMetadata)
        -> Result<bool>;

    /// Delete an entry
    fn delete(&self, id: &ResourceIdentifier) -> Result<bool>;

    /// Check if an entry exists
    fn exists(&self, id: &ResourceIdentifier) -> Result<bool> {
        Ok(self.get_metadata(id)?.is_some())
    }

    /// Count stored entries
    fn count(&self) -> usize;

    /// Flush pending writes to disk
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Returns `true` if `key` names a direct child of the container `prefix`.
pub(crate) fn is_direct_child(prefix: &str, key: &str) -> bool {
    match key.strip_prefix(prefix) {
        Some(rest) if !rest.is_empty() => {
            let rest = rest.strip_suffix('/').unwrap_or(rest);
            !rest.is_empty() && !rest.contains('/')
        }
        _ => false,
    }
}

// Re-exports
pub use memory::MemoryBackend;

#[cfg(feature = "sled-backend")]
pub use self::sled::SledBackend;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_implements_storage_backend() {
        let backend = MemoryBackend::new();

        fn accepts_backend<T: StorageBackend>(_: &T) {}
        accepts_backend(&backend);
    }

    #[test]
    fn test_is_direct_child() {
        assert!(is_direct_child("http://h/c/", "http://h/c/doc"));
        assert!(is_direct_child("http://h/c/", "http://h/c/sub/"));
        assert!(!is_direct_child("http://h/c/", "http://h/c/"));
        assert!(!is_direct_child("http://h/c/", "http://h/c/sub/doc"));
        assert!(!is_direct_child("http://h/c/", "http://h/other"));
    }

    #[test]
    fn test_default_flush() {
        let backend = MemoryBackend::new();
        assert!(backend.flush().is_ok());
    }
}
