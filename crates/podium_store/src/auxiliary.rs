//! Auxiliary resources: companions whose lifecycle follows a subject resource.

use crate::identifier::ResourceIdentifier;

/// Suffix of access control auxiliaries.
pub const ACL_SUFFIX: &str = ".acl";
/// Suffix of descriptive metadata auxiliaries.
pub const META_SUFFIX: &str = ".meta";

/// Decides which resources are auxiliary to which subject.
pub trait AuxiliaryStrategy: Send + Sync {
    /// Returns the subject if `identifier` is an auxiliary resource.
    fn subject_of(&self, identifier: &ResourceIdentifier) -> Option<ResourceIdentifier>;

    /// All potential auxiliaries of `subject`. Empty for auxiliaries themselves.
    fn auxiliaries_of(&self, subject: &ResourceIdentifier) -> Vec<ResourceIdentifier>;

    fn is_auxiliary(&self, identifier: &ResourceIdentifier) -> bool {
        self.subject_of(identifier).is_some()
    }
}

/// Derives auxiliaries by appending a fixed suffix to the subject.
///
/// `http://h/doc` has `http://h/doc.acl`; the container `http://h/c/` has
/// `http://h/c/.acl`.
#[derive(Debug, Clone)]
pub struct SuffixAuxiliaryStrategy {
    suffixes: Vec<String>,
}

impl SuffixAuxiliaryStrategy {
    pub fn new<S: Into<String>>(suffixes: impl IntoIterator<Item = S>) -> Self {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Access control and descriptive metadata auxiliaries.
    pub fn acl_and_meta() -> Self {
        Self::new([ACL_SUFFIX, META_SUFFIX])
    }

    /// A strategy under which nothing is auxiliary.
    pub fn none() -> Self {
        Self {
            suffixes: Vec::new(),
        }
    }
}

impl Default for SuffixAuxiliaryStrategy {
    fn default() -> Self {
        Self::acl_and_meta()
    }
}

impl AuxiliaryStrategy for SuffixAuxiliaryStrategy {
    fn subject_of(&self, identifier: &ResourceIdentifier) -> Option<ResourceIdentifier> {
        if identifier.is_container() {
            return None;
        }
        self.suffixes
            .iter()
            .find_map(|suffix| identifier.strip_suffix(suffix))
    }

    fn auxiliaries_of(&self, subject: &ResourceIdentifier) -> Vec<ResourceIdentifier> {
        if self.is_auxiliary(subject) {
            return Vec::new();
        }
        self.suffixes
            .iter()
            .map(|suffix| subject.with_suffix(suffix))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(s).unwrap()
    }

    #[test]
    fn test_document_auxiliaries() {
        let strategy = SuffixAuxiliaryStrategy::default();
        let doc = id("http://h/c/doc");
        assert_eq!(
            strategy.auxiliaries_of(&doc),
            vec![id("http://h/c/doc.acl"), id("http://h/c/doc.meta")]
        );
        assert_eq!(strategy.subject_of(&id("http://h/c/doc.acl")), Some(doc.clone()));
        assert!(!strategy.is_auxiliary(&doc));
    }

    #[test]
    fn test_container_auxiliaries() {
        let strategy = SuffixAuxiliaryStrategy::default();
        let container = id("http://h/c/");
        assert_eq!(strategy.auxiliaries_of(&container)[0], id("http://h/c/.acl"));
        assert_eq!(strategy.subject_of(&id("http://h/c/.meta")), Some(container));
        assert!(!strategy.is_auxiliary(&id("http://h/c.acl/")));
    }

    #[test]
    fn test_auxiliaries_have_no_auxiliaries() {
        let strategy = SuffixAuxiliaryStrategy::default();
        assert!(strategy.auxiliaries_of(&id("http://h/doc.acl")).is_empty());
        assert!(SuffixAuxiliaryStrategy::none()
            .auxiliaries_of(&id("http://h/doc"))
            .is_empty());
    }
}
