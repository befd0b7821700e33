//! In-memory storage backend
//!
//! Provides fast, ephemeral storage for testing and single-process servers.

use super::{is_direct_child, StorageBackend, StoredEntry};
use crate::{RepresentationMetadata, ResourceIdentifier};
use bytes::Bytes;
use podium_core::{Error, Result};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

/// In-memory storage backend
///
/// Entries are kept sorted by identifier so children of a container form a
/// contiguous range.
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, StoredEntry>>,
}

fn poisoned<T>(_: T) -> Error {
    Error::Internal("lock poisoned".into())
}

impl MemoryBackend {
    /// Create a new empty in-memory backend
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn get_metadata(&self, id: &ResourceIdentifier) -> Result<Option<RepresentationMetadata>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(id.as_str()).map(|e| e.metadata.clone()))
    }

    fn get_data(&self, id: &ResourceIdentifier) -> Result<Option<Bytes>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .get(id.as_str())
            .map(|e| Bytes::copy_from_slice(&e.data)))
    }

    fn get_children(&self, container: &ResourceIdentifier) -> Result<Vec<ResourceIdentifier>> {
        let prefix = container.as_str();
        let entries = self.entries.read().map_err(poisoned)?;
        entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| is_direct_child(prefix, key))
            .map(|(key, _)| ResourceIdentifier::parse(key))
            .collect()
    }

    fn write_document(
        &self,
        id: &ResourceIdentifier,
        metadata: &RepresentationMetadata,
        data: &[u8],
    ) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(
            id.to_string(),
            StoredEntry {
                metadata: metadata.clone(),
                data: data.to_vec(),
            },
        );
        Ok(())
    }

    fn write_container(
        &self,
        id: &ResourceIdentifier,
        metadata: &RepresentationMetadata,
    ) -> Result<()> {
        self.write_document(id, metadata, &[])
    }

    fn update_metadata(
        &self,
        id: &ResourceIdentifier,
        metadata: &RepresentationMetadata,
    ) -> Result<bool> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        match entries.get_mut(id.as_str()) {
            Some(entry) => {
                entry.metadata = metadata.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: &ResourceIdentifier) -> Result<bool> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        Ok(entries.remove(id.as_str()).is_some())
    }

    fn count(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(s).unwrap()
    }

    #[test]
    fn test_write_and_read() {
        let backend = MemoryBackend::new();
        let metadata = RepresentationMetadata::with_content_type("text/plain");
        backend
            .write_document(&id("http://h/doc"), &metadata, b"hello")
            .unwrap();

        assert_eq!(backend.count(), 1);
        assert!(backend.exists(&id("http://h/doc")).unwrap());
        assert_eq!(
            backend.get_metadata(&id("http://h/doc")).unwrap(),
            Some(metadata)
        );
        assert_eq!(
            backend.get_data(&id("http://h/doc")).unwrap().unwrap(),
            Bytes::from_static(b"hello")
        );
    }

    #[test]
    fn test_children() {
        let backend = MemoryBackend::new();
        let metadata = RepresentationMetadata::new();
        backend.write_container(&id("http://h/c/"), &metadata).unwrap();
        backend.write_document(&id("http://h/c/a"), &metadata, b"").unwrap();
        backend.write_container(&id("http://h/c/sub/"), &metadata).unwrap();
        backend
            .write_document(&id("http://h/c/sub/deep"), &metadata, b"")
            .unwrap();
        backend.write_document(&id("http://h/d"), &metadata, b"").unwrap();

        let children = backend.get_children(&id("http://h/c/")).unwrap();
        assert_eq!(children, vec![id("http://h/c/a"), id("http://h/c/sub/")]);
    }

    #[test]
    fn test_update_metadata_and_delete() {
        let backend = MemoryBackend::new();
        let doc = id("http://h/doc");
        assert!(!backend
            .update_metadata(&doc, &RepresentationMetadata::new())
            .unwrap());

        backend
            .write_document(&doc, &RepresentationMetadata::new(), b"data")
            .unwrap();
        let updated = RepresentationMetadata::with_content_type("text/plain");
        assert!(backend.update_metadata(&doc, &updated).unwrap());
        assert_eq!(backend.get_metadata(&doc).unwrap(), Some(updated));
        assert_eq!(&backend.get_data(&doc).unwrap().unwrap()[..], b"data");

        assert!(backend.delete(&doc).unwrap());
        assert!(!backend.delete(&doc).unwrap());
        assert_eq!(backend.count(), 0);
    }
}
