//! Container listings.

use crate::identifier::ResourceIdentifier;
use crate::vocab::{self, media};
use bytes::Bytes;
use podium_core::{Error, Result};
use serde_json::json;

/// Listing types in the order preferred on ties.
pub const LISTING_TYPES: [&str; 3] = [media::TURTLE, media::JSON_LD, media::JSON];

/// Serialises the membership of `container` as `content_type`.
pub fn render(
    container: &ResourceIdentifier,
    children: &[ResourceIdentifier],
    content_type: &str,
) -> Result<Bytes> {
    match content_type {
        media::TURTLE => Ok(Bytes::from(turtle(container, children))),
        media::JSON_LD => to_bytes(&json!({
            "@context": { "ldp": vocab::PREFIX_LDP },
            "@id": container.as_str(),
            "@type": ["ldp:Container", "ldp:BasicContainer", "ldp:Resource"],
            "ldp:contains": children
                .iter()
                .map(|c| json!({ "@id": c.as_str() }))
                .collect::<Vec<_>>(),
        })),
        media::JSON => to_bytes(&json!({
            "id": container.as_str(),
            "contains": children.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
        })),
        other => Err(Error::NotAcceptable(format!(
            "containers cannot be listed as {}",
            other
        ))),
    }
}

fn to_bytes(value: &serde_json::Value) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| Error::Serialization(e.to_string()))
}

fn turtle(container: &ResourceIdentifier, children: &[ResourceIdentifier]) -> String {
    let mut out = format!(
        "@prefix ldp: <{}>.\n\n<{}> a ldp:Container, ldp:BasicContainer, ldp:Resource",
        vocab::PREFIX_LDP,
        container
    );
    if !children.is_empty() {
        let members = children
            .iter()
            .map(|c| format!("<{}>", c))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(";\n    ldp:contains ");
        out.push_str(&members);
    }
    out.push_str(".\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ResourceIdentifier {
        ResourceIdentifier::parse(s).unwrap()
    }

    #[test]
    fn test_turtle() {
        let body = render(&id("http://h/c/"), &[id("http://h/c/a"), id("http://h/c/b/")], media::TURTLE)
            .unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains("<http://h/c/> a ldp:Container"));
        assert!(text.contains("ldp:contains <http://h/c/a>, <http://h/c/b/>."));
    }

    #[test]
    fn test_empty_turtle() {
        let body = render(&id("http://h/c/"), &[], media::TURTLE).unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.ends_with("ldp:Resource.\n"));
        assert!(!text.contains("ldp:contains"));
    }

    #[test]
    fn test_json_variants() {
        let children = [id("http://h/c/a")];
        let ld: serde_json::Value =
            serde_json::from_slice(&render(&id("http://h/c/"), &children, media::JSON_LD).unwrap())
                .unwrap();
        assert_eq!(ld["ldp:contains"][0]["@id"], "http://h/c/a");

        let plain: serde_json::Value =
            serde_json::from_slice(&render(&id("http://h/c/"), &children, media::JSON).unwrap())
                .unwrap();
        assert_eq!(plain["contains"][0], "http://h/c/a");
    }

    #[test]
    fn test_unknown_type() {
        assert!(render(&id("http://h/c/"), &[], "image/png").is_err());
    }
}
