//! Preconditions evaluated against the stored state of a resource.

use crate::metadata::RepresentationMetadata;
use chrono::{DateTime, Utc};

/// The recognised condition kinds: entity tag (mis)match and modification time.
///
/// `None` fields are not evaluated. A list containing `*` matches any existing
/// resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    /// `If-Match`
    pub match_etags: Option<Vec<String>>,
    /// `If-None-Match`
    pub not_match_etags: Option<Vec<String>>,
    /// `If-Modified-Since`
    pub modified_since: Option<DateTime<Utc>>,
    /// `If-Unmodified-Since`
    pub unmodified_since: Option<DateTime<Utc>>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.match_etags.get_or_insert_with(Vec::new).push(etag.into());
        self
    }

    pub fn if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.not_match_etags
            .get_or_insert_with(Vec::new)
            .push(etag.into());
        self
    }

    pub fn if_modified_since(mut self, time: DateTime<Utc>) -> Self {
        self.modified_since = Some(time);
        self
    }

    pub fn if_unmodified_since(mut self, time: DateTime<Utc>) -> Self {
        self.unmodified_since = Some(time);
        self
    }

    /// Returns `true` if no condition is set.
    pub fn is_empty(&self) -> bool {
        self.match_etags.is_none()
            && self.not_match_etags.is_none()
            && self.modified_since.is_none()
            && self.unmodified_since.is_none()
    }

    /// Checks the entity tag conditions only.
    pub fn matches_etag(&self, etag: Option<&str>) -> bool {
        if let Some(tags) = &self.match_etags {
            let Some(current) = etag else {
                return false;
            };
            if !tags.iter().any(|t| t == "*" || same_tag(t, current)) {
                return false;
            }
        }
        if let Some(tags) = &self.not_match_etags {
            if let Some(current) = etag {
                if tags.iter().any(|t| t == "*" || same_tag(t, current)) {
                    return false;
                }
            }
        }
        true
    }

    /// Separates preconditions from cache validators.
    ///
    /// Returns the preconditions (`If-Match`, `If-Unmodified-Since`), whose
    /// failure means `412`, and the validators (`If-None-Match`,
    /// `If-Modified-Since`), whose failure on a read means `304`.
    /// `If-Modified-Since` is ignored next to `If-None-Match`.
    pub fn split_cache_validators(&self) -> (Conditions, Conditions) {
        let preconditions = Conditions {
            match_etags: self.match_etags.clone(),
            unmodified_since: self.unmodified_since,
            ..Default::default()
        };
        let validators = Conditions {
            not_match_etags: self.not_match_etags.clone(),
            modified_since: match self.not_match_etags {
                Some(_) => None,
                None => self.modified_since,
            },
            ..Default::default()
        };
        (preconditions, validators)
    }

    /// Evaluates every condition against the stored metadata.
    ///
    /// `None` stands for a resource that does not exist: only `If-Match` can
    /// fail then.
    pub fn matches_metadata(&self, metadata: Option<&RepresentationMetadata>) -> bool {
        let Some(metadata) = metadata else {
            return self.match_etags.is_none();
        };
        if !self.matches_etag(metadata.etag().as_deref()) {
            return false;
        }
        let modified = metadata.modified().map(|t| t.timestamp());
        if let (Some(since), Some(modified)) = (self.modified_since, modified) {
            if modified <= since.timestamp() {
                return false;
            }
        }
        if let (Some(until), Some(modified)) = (self.unmodified_since, modified) {
            if modified > until.timestamp() {
                return false;
            }
        }
        true
    }
}

/// Strong comparison ignoring the weak prefix and quoting.
fn same_tag(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

fn normalize(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.trim_matches('"')
}
