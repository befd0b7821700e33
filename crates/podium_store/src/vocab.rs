//! Predicates used in representation metadata.
//!
//! Metadata keys are full IRIs so that they can be emitted unchanged in
//! listings and `Link` headers.

/// RDF namespace
pub const PREFIX_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
/// Linked Data Platform namespace
pub const PREFIX_LDP: &str = "http://www.w3.org/ns/ldp#";
/// Dublin Core Terms namespace
pub const PREFIX_DCT: &str = "http://purl.org/dc/terms/";
/// POSIX stat namespace
pub const PREFIX_POSIX: &str = "http://www.w3.org/ns/posix/stat#";
/// W3C Media Annotations namespace
pub const PREFIX_MA: &str = "http://www.w3.org/ns/ma-ont#";
/// Podium-internal namespace for hints that never leave the server
pub const PREFIX_PODIUM: &str = "urn:podium:";

/// `rdf:type`
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
/// `ma:format`, the content type of a representation
pub const CONTENT_TYPE: &str = "http://www.w3.org/ns/ma-ont#format";
/// `posix:size`, the byte length of a representation
pub const CONTENT_LENGTH: &str = "http://www.w3.org/ns/posix/stat#size";
/// `dc:modified`, the last modification time (RFC 3339)
pub const MODIFIED: &str = "http://purl.org/dc/terms/modified";
/// Opaque revision tag, the basis of the ETag
pub const REVISION: &str = "urn:podium:meta:revision";
/// Name suggested by the client for a resource created through `add_resource`
pub const SLUG: &str = "urn:podium:http:slug";

/// `ldp:Resource`
pub const LDP_RESOURCE: &str = "http://www.w3.org/ns/ldp#Resource";
/// `ldp:Container`
pub const LDP_CONTAINER: &str = "http://www.w3.org/ns/ldp#Container";
/// `ldp:BasicContainer`
pub const LDP_BASIC_CONTAINER: &str = "http://www.w3.org/ns/ldp#BasicContainer";
/// `ldp:contains`
pub const LDP_CONTAINS: &str = "http://www.w3.org/ns/ldp#contains";

/// Media types the store recognises by name.
pub mod media {
    /// Turtle
    pub const TURTLE: &str = "text/turtle";
    /// JSON-LD
    pub const JSON_LD: &str = "application/ld+json";
    /// Plain JSON
    pub const JSON: &str = "application/json";
    /// JSON Merge Patch (RFC 7396)
    pub const MERGE_PATCH: &str = "application/merge-patch+json";
    /// JSON Patch (RFC 6902)
    pub const JSON_PATCH: &str = "application/json-patch+json";
    /// Fallback for unknown binary data
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Returns `true` if `iri` lives in the Podium-internal namespace.
pub fn is_internal(iri: &str) -> bool {
    iri.starts_with(PREFIX_PODIUM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_share_namespaces() {
        assert!(RDF_TYPE.starts_with(PREFIX_RDF));
        assert!(LDP_CONTAINER.starts_with(PREFIX_LDP));
        assert!(MODIFIED.starts_with(PREFIX_DCT));
        assert!(CONTENT_LENGTH.starts_with(PREFIX_POSIX));
        assert!(CONTENT_TYPE.starts_with(PREFIX_MA));
    }

    #[test]
    fn test_internal() {
        assert!(is_internal(SLUG));
        assert!(is_internal(REVISION));
        assert!(!is_internal(RDF_TYPE));
    }
}
