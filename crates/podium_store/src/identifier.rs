//! Resource identifiers.

use podium_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// The canonical, absolute address of a resource.
///
/// Identifiers ending in `/` denote containers. Two identifiers are equal iff
/// their canonical string forms are equal; canonicalisation (case of scheme
/// and host, dot segments, default ports, percent-encoding) happens once, in
/// [`ResourceIdentifier::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceIdentifier {
    path: String,
}

impl ResourceIdentifier {
    /// Parses and canonicalises an absolute URL.
    ///
    /// Query strings and fragments are not part of a resource's identity and
    /// are dropped. An empty path becomes the root, `/`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut url = Url::parse(input)
            .map_err(|e| Error::BadRequest(format!("invalid identifier {}: {}", input, e)))?;
        if url.cannot_be_a_base() || !url.has_host() {
            return Err(Error::BadRequest(format!(
                "identifier must be a hierarchical URL: {}",
                input
            )));
        }
        url.set_query(None);
        url.set_fragment(None);
        if url.path().is_empty() {
            url.set_path("/");
        }
        Ok(Self {
            path: url.to_string(),
        })
    }

    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Returns `true` for container identifiers (trailing slash).
    pub fn is_container(&self) -> bool {
        self.path.ends_with('/')
    }

    /// Returns `true` if this is the root container of its host.
    pub fn is_root(&self) -> bool {
        self.path.len() == self.origin_len() + 1
    }

    /// Returns the root container of this identifier's host.
    pub fn root(&self) -> Self {
        Self {
            path: self.path[..=self.origin_len()].to_string(),
        }
    }

    /// Returns the containing container, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.path.trim_end_matches('/');
        trimmed.rfind('/').map(|idx| Self {
            path: trimmed[..=idx].to_string(),
        })
    }

    /// Returns the identifier with the trailing slash toggled.
    ///
    /// `http://h/a` and `http://h/a/` may never both exist. The root is its own
    /// alternate.
    pub fn alternate(&self) -> Self {
        if self.is_root() {
            return self.clone();
        }
        let path = match self.path.strip_suffix('/') {
            Some(document) => document.to_string(),
            None => format!("{}/", self.path),
        };
        Self { path }
    }

    /// Returns the last path segment, without trailing slash. Empty for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "";
        }
        let trimmed = self.path.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or_default()
    }

    /// Creates the identifier of a direct child of this container.
    ///
    /// `name` is a single segment; a trailing `/` makes the child a container.
    pub fn join(&self, name: &str) -> Result<Self> {
        if !self.is_container() {
            return Err(Error::Conflict(format!("{} is not a container", self)));
        }
        let segment = name.strip_suffix('/').unwrap_or(name);
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('/') {
            return Err(Error::BadRequest(format!("invalid resource name: {}", name)));
        }
        let child = Self::parse(&format!("{}{}", self.path, name))?;
        if child.parent().as_ref() != Some(self) {
            return Err(Error::BadRequest(format!("invalid resource name: {}", name)));
        }
        Ok(child)
    }

    /// Returns `true` if `self` lies strictly beneath `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &ResourceIdentifier) -> bool {
        ancestor.is_container() && self.path.len() > ancestor.path.len()
            && self.path.starts_with(&ancestor.path)
    }

    /// Appends `suffix` to a document identifier. Canonical input stays canonical.
    pub(crate) fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            path: format!("{}{}", self.path, suffix),
        }
    }

    /// Strips `suffix`, if present and not the whole final segment of a document.
    pub(crate) fn strip_suffix(&self, suffix: &str) -> Option<Self> {
        let base = self.path.strip_suffix(suffix)?;
        if base.len() <= self.origin_len() {
            return None;
        }
        Some(Self {
            path: base.to_string(),
        })
    }

    /// Length of `scheme://authority`.
    fn origin_len(&self) -> usize {
        let after_scheme = self.path.find("://").map(|i| i + 3).unwrap_or(0);
        self.path[after_scheme..]
            .find('/')
            .map(|i| after_scheme + i)
            .unwrap_or(self.path.len())
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl FromStr for ResourceIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourceIdentifier {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ResourceIdentifier> for String {
    fn from(id: ResourceIdentifier) -> Self {
        id.path
    }
}

impl AsRef<str> for ResourceIdentifier {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(s).unwrap()
    }

    #[test]
    fn test_canonical_equality() {
        assert_eq!(id("HTTP://Example.COM/a/../b"), id("http://example.com/b"));
        assert_eq!(id("http://example.com:80/x?q=1#f"), id("http://example.com/x"));
        assert_eq!(id("http://example.com").as_str(), "http://example.com/");
    }

    #[test]
    fn test_empty_path_is_root() {
        let host = id("foo://host");
        assert_eq!(host.as_str(), "foo://host/");
        assert!(host.is_root());
        assert_eq!(host.root(), host);
        assert_eq!(host.parent(), None);
        assert_eq!(id("foo://host?q=1").as_str(), "foo://host/");
        assert_eq!(id("foo://host/doc").parent(), Some(host));
    }

    #[test]
    fn test_rejects_non_hierarchical() {
        assert!(ResourceIdentifier::parse("mailto:someone@example.com").is_err());
        assert!(ResourceIdentifier::parse("not a url").is_err());
    }

    #[test]
    fn test_hierarchy() {
        let root = id("http://example.com/");
        assert!(root.is_root());
        assert!(root.is_container());
        assert_eq!(root.parent(), None);

        let doc = id("http://example.com/a/b");
        assert!(!doc.is_container());
        assert_eq!(doc.parent(), Some(id("http://example.com/a/")));
        assert_eq!(doc.name(), "b");

        let container = id("http://example.com/a/");
        assert_eq!(container.parent(), Some(root.clone()));
        assert_eq!(container.name(), "a");
        assert_eq!(container.root(), root);
        assert!(doc.is_descendant_of(&container));
        assert!(!container.is_descendant_of(&container));
    }

    #[test]
    fn test_alternate() {
        assert_eq!(id("http://h/a").alternate(), id("http://h/a/"));
        assert_eq!(id("http://h/a/").alternate(), id("http://h/a"));
        assert_eq!(id("http://h/").alternate(), id("http://h/"));
    }

    #[test]
    fn test_join() {
        let container = id("http://h/c/");
        assert_eq!(container.join("doc").unwrap(), id("http://h/c/doc"));
        assert_eq!(container.join("sub/").unwrap(), id("http://h/c/sub/"));
        assert!(container.join("").is_err());
        assert!(container.join("..").is_err());
        assert!(container.join("a/b").is_err());
        assert!(id("http://h/c/doc").join("x").is_err());
    }

    #[test]
    fn test_suffixes() {
        let doc = id("http://h/c/doc");
        let acl = doc.with_suffix(".acl");
        assert_eq!(acl.as_str(), "http://h/c/doc.acl");
        assert_eq!(acl.strip_suffix(".acl"), Some(doc));
        assert_eq!(id("http://h/.acl").strip_suffix(".acl"), Some(id("http://h/")));
    }

    #[test]
    fn test_serde_as_string() {
        let doc = id("http://h/c/doc");
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, "\"http://h/c/doc\"");
        let back: ResourceIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
