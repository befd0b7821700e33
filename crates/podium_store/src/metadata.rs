//! Descriptive metadata attached to representations.

use crate::vocab;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Predicate → values mapping describing a representation.
///
/// Every predicate may carry several values. Equality ignores the order in
/// which predicates were inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepresentationMetadata {
    values: IndexMap<String, Vec<String>>,
}

impl RepresentationMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates metadata with only a content type.
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        let mut metadata = Self::new();
        metadata.set_content_type(content_type);
        metadata
    }

    /// Returns all values of `predicate`.
    pub fn get(&self, predicate: &str) -> &[String] {
        self.values.get(predicate).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the first value of `predicate`.
    pub fn first(&self, predicate: &str) -> Option<&str> {
        self.get(predicate).first().map(String::as_str)
    }

    /// Returns `true` if `predicate` has `value` among its values.
    pub fn contains(&self, predicate: &str, value: &str) -> bool {
        self.get(predicate).iter().any(|v| v == value)
    }

    /// Adds a value, keeping existing ones. Duplicates are ignored.
    pub fn add(&mut self, predicate: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let values = self.values.entry(predicate.into()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Replaces all values of `predicate` with `value`.
    pub fn set(&mut self, predicate: impl Into<String>, value: impl Into<String>) {
        self.values.insert(predicate.into(), vec![value.into()]);
    }

    /// Removes `predicate` and returns its values.
    pub fn remove(&mut self, predicate: &str) -> Vec<String> {
        self.values.shift_remove(predicate).unwrap_or_default()
    }

    /// Iterates over predicates and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns `true` if no predicate is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of predicates.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Drops every predicate in the Podium-internal namespace.
    pub fn remove_internal(&mut self) {
        self.values.retain(|k, _| !vocab::is_internal(k));
    }

    pub fn content_type(&self) -> Option<&str> {
        self.first(vocab::CONTENT_TYPE)
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.set(vocab::CONTENT_TYPE, content_type);
    }

    pub fn content_length(&self) -> Option<u64> {
        self.first(vocab::CONTENT_LENGTH)?.parse().ok()
    }

    pub fn set_content_length(&mut self, length: u64) {
        self.set(vocab::CONTENT_LENGTH, length.to_string());
    }

    /// Last modification time, if recorded and well-formed.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        let raw = self.first(vocab::MODIFIED)?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Records `time`, truncated to whole seconds.
    pub fn set_modified(&mut self, time: DateTime<Utc>) {
        self.set(
            vocab::MODIFIED,
            time.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    }

    pub fn revision(&self) -> Option<&str> {
        self.first(vocab::REVISION)
    }

    pub fn set_revision(&mut self, revision: impl Into<String>) {
        self.set(vocab::REVISION, revision);
    }

    /// The strong entity tag derived from the revision, quotes included.
    pub fn etag(&self) -> Option<String> {
        self.revision().map(|rev| format!("\"{}\"", rev))
    }

    /// The `rdf:type` values.
    pub fn types(&self) -> &[String] {
        self.get(vocab::RDF_TYPE)
    }

    pub fn has_type(&self, iri: &str) -> bool {
        self.contains(vocab::RDF_TYPE, iri)
    }

    pub fn add_type(&mut self, iri: impl Into<String>) {
        self.add(vocab::RDF_TYPE, iri);
    }

    /// Returns `true` if the metadata requests or describes a container.
    pub fn is_container_hint(&self) -> bool {
        self.has_type(vocab::LDP_CONTAINER) || self.has_type(vocab::LDP_BASIC_CONTAINER)
    }
}

impl FromIterator<(String, String)> for RepresentationMetadata {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut metadata = Self::new();
        for (predicate, value) in iter {
            metadata.add(predicate, value);
        }
        metadata
    }
}
