//! Sled storage backend
//!
//! Provides persistent storage using the Sled embedded database. Entries live
//! in a single `resources` tree keyed by the canonical identifier and encoded
//! with bincode. This is the default backend for production use.

use super::{is_direct_child, StorageBackend, StoredEntry};
use crate::{RepresentationMetadata, ResourceIdentifier};
use bytes::Bytes;
use podium_core::{Error, Result};

/// Sled-based storage backend
pub struct SledBackend {
    /// The Sled database
    db: sled::Db,
    /// Tree for resource entries
    resources: sled::Tree,
}

fn storage_error(context: &str, err: sled::Error) -> Error {
    Error::Upstream(format!("sled {} error: {}", context, err))
}

fn encode(entry: &StoredEntry) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(entry, bincode::config::standard())
        .map_err(|e| Error::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<StoredEntry> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(entry, _)| entry)
        .map_err(|e| Error::Serialization(e.to_string()))
}

impl SledBackend {
    /// Open or create a Sled database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let db = sled::open(path).map_err(|e| storage_error("open", e))?;
        Self::from_db(db)
    }

    /// Open a temporary database (for testing)
    pub fn temp() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| storage_error("open", e))?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let resources = db
            .open_tree("resources")
            .map_err(|e| storage_error("open tree", e))?;
        Ok(Self { db, resources })
    }

    fn get_entry(&self, id: &ResourceIdentifier) -> Result<Option<StoredEntry>> {
        match self.resources.get(id.as_str().as_bytes()) {
            Ok(Some(bytes)) => decode(&bytes).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_error("get", e)),
        }
    }

    fn put_entry(&self, id: &ResourceIdentifier, entry: &StoredEntry) -> Result<()> {
        self.resources
            .insert(id.as_str().as_bytes(), encode(entry)?)
            .map_err(|e| storage_error("insert", e))?;
        Ok(())
    }

    /// Approximate size on disk in bytes
    pub fn size_bytes(&self) -> usize {
        self.db.size_on_disk().unwrap_or(0) as usize
    }
}

impl StorageBackend for SledBackend {
    fn get_metadata(&self, id: &ResourceIdentifier) -> Result<Option<RepresentationMetadata>> {
        Ok(self.get_entry(id)?.map(|e| e.metadata))
    }

    fn get_data(&self, id: &ResourceIdentifier) -> Result<Option<Bytes>> {
        Ok(self.get_entry(id)?.map(|e| Bytes::from(e.data)))
    }

    fn get_children(&self, container: &ResourceIdentifier) -> Result<Vec<ResourceIdentifier>> {
        let prefix = container.as_str();
        let mut children = Vec::new();
        for result in self.resources.scan_prefix(prefix.as_bytes()) {
            let (key, _) = result.map_err(|e| storage_error("iteration", e))?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| Error::Serialization(e.to_string()))?;
            if is_direct_child(prefix, &key) {
                children.push(ResourceIdentifier::parse(&key)?);
            }
        }
        Ok(children)
    }

    fn write_document(
        &self,
        id: &ResourceIdentifier,
        metadata: &RepresentationMetadata,
        data: &[u8],
    ) -> Result<()> {
        self.put_entry(
            id,
            &StoredEntry {
                metadata: metadata.clone(),
                data: data.to_vec(),
            },
        )
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
        let Some(mut entry) = self.get_entry(id)? else {
            return Ok(false);
        };
        entry.metadata = metadata.clone();
        self.put_entry(id, &entry)?;
        Ok(true)
    }

    fn delete(&self, id: &ResourceIdentifier) -> Result<bool> {
        match self.resources.remove(id.as_str().as_bytes()) {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(storage_error("delete", e)),
        }
    }

    fn count(&self) -> usize {
        self.resources.len()
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(|e| storage_error("flush", e))?;
        Ok(())
    }
}
