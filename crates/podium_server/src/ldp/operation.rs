//! Turning HTTP requests into store operations.

use crate::http::HttpRequest;
use async_trait::async_trait;
use axum::http::{header, HeaderMap, Method};
use chrono::{DateTime, Utc};
use podium_core::{AsyncHandler, Error, Result};
use podium_store::preferences::{essence, parse_weighted};
use podium_store::{
    vocab, Conditions, Representation, RepresentationMetadata, RepresentationPreferences,
    ResourceIdentifier,
};
use std::sync::Mutex;

/// A parsed request: what to do, to which resource, under which conditions.
pub struct Operation {
    pub method: Method,
    pub target: ResourceIdentifier,
    pub preferences: RepresentationPreferences,
    pub conditions: Option<Conditions>,
    body: Mutex<Option<Representation>>,
}

impl Operation {
    pub fn new(
        method: Method,
        target: ResourceIdentifier,
        preferences: RepresentationPreferences,
        conditions: Option<Conditions>,
        body: Option<Representation>,
    ) -> Self {
        Self {
            method,
            target,
            preferences,
            conditions,
            body: Mutex::new(body),
        }
    }

    /// Takes the body. Only the first call returns it.
    pub fn take_body(&self) -> Result<Option<Representation>> {
        Ok(self
            .body
            .lock()
            .map_err(|e| Error::Internal(format!("operation body lock poisoned: {}", e)))?
            .take())
    }

    /// Like [`take_body`](Self::take_body) but a missing body is a bad request.
    pub fn require_body(&self) -> Result<Representation> {
        self.take_body()?
            .ok_or_else(|| Error::BadRequest(format!("{} requires a body", self.method)))
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}

/// Parses requests against the public base URL of the server.
pub struct OperationParser {
    base_url: String,
}

impl OperationParser {
    /// `base_url` is the URL the root container is published under.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn target(&self, request: &HttpRequest) -> Result<ResourceIdentifier> {
        let path = request.path();
        let path = if path.is_empty() { "/" } else { path };
        ResourceIdentifier::parse(&format!("{}{}", self.base_url, path))
    }
}

#[async_trait]
impl AsyncHandler<HttpRequest, Operation> for OperationParser {
    async fn handle(&self, input: &HttpRequest) -> Result<Operation> {
        let target = self.target(input)?;
        let preferences = parse_preferences(input.headers())?;
        let conditions = parse_conditions(input.headers());

        let body = if matches!(*input.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
            None
        } else {
            let metadata = parse_metadata(input.headers());
            Some(Representation::new(
                metadata,
                input.take_stream()?,
                !input.has_body(),
            ))
        };

        Ok(Operation::new(
            input.method().clone(),
            target,
            preferences,
            (!conditions.is_empty()).then_some(conditions),
            body,
        ))
    }
}

fn header_values(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!values.is_empty()).then(|| values.join(","))
}

/// Reads the `Accept*` headers. A malformed weight is a bad request.
pub fn parse_preferences(headers: &HeaderMap) -> Result<RepresentationPreferences> {
    let mut preferences = RepresentationPreferences::any();
    if let Some(accept) = header_values(headers, header::ACCEPT) {
        preferences.media_types = parse_weighted(&accept)?;
    }
    if let Some(languages) = header_values(headers, header::ACCEPT_LANGUAGE) {
        preferences.languages = parse_weighted(&languages)?;
    }
    if let Some(charsets) = header_values(headers, header::ACCEPT_CHARSET) {
        preferences.charsets = parse_weighted(&charsets)?;
    }
    if let Some(encodings) = header_values(headers, header::ACCEPT_ENCODING) {
        preferences.encodings = parse_weighted(&encodings)?;
    }
    Ok(preferences)
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Unparseable dates are ignored, as HTTP requires.
fn http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Reads `If-Match`, `If-None-Match`, `If-Modified-Since` and
/// `If-Unmodified-Since`.
pub fn parse_conditions(headers: &HeaderMap) -> Conditions {
    let mut conditions = Conditions::new();
    if let Some(tags) = header_values(headers, header::IF_MATCH) {
        for tag in split_list(&tags) {
            conditions = conditions.if_match(tag);
        }
    }
    if let Some(tags) = header_values(headers, header::IF_NONE_MATCH) {
        for tag in split_list(&tags) {
            conditions = conditions.if_none_match(tag);
        }
    }
    let date = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(http_date)
    };
    if let Some(time) = date(header::IF_MODIFIED_SINCE) {
        conditions = conditions.if_modified_since(time);
    }
    if let Some(time) = date(header::IF_UNMODIFIED_SINCE) {
        conditions = conditions.if_unmodified_since(time);
    }
    conditions
}

/// Reads body metadata: `Content-Type`, `Slug` and `Link: <...>; rel="type"`.
pub fn parse_metadata(headers: &HeaderMap) -> RepresentationMetadata {
    let mut metadata = RepresentationMetadata::new();
    if let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        metadata.set_content_type(essence(content_type));
    }
    if let Some(slug) = headers.get("slug").and_then(|v| v.to_str().ok()) {
        metadata.set(vocab::SLUG, slug.trim());
    }
    if let Some(links) = header_values(headers, header::LINK) {
        for iri in link_types(&links) {
            metadata.add_type(iri);
        }
    }
    metadata
}

/// Targets of `rel="type"` links in a `Link` header value.
fn link_types(value: &str) -> Vec<String> {
    split_list(value)
        .filter_map(|link| {
            let mut parts = link.split(';').map(str::trim);
            let target = parts.next()?.strip_prefix('<')?.strip_suffix('>')?;
            let is_type = parts.any(|param| {
                param
                    .split_once('=')
                    .map(|(key, value)| {
                        key.trim().eq_ignore_ascii_case("rel")
                            && value
                                .trim()
                                .trim_matches('"')
                                .split_whitespace()
                                .any(|rel| rel == "type")
                    })
                    .unwrap_or(false)
            });
            is_type.then(|| target.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, Uri};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_conditions() {
        let conditions = parse_conditions(&headers(&[
            ("if-match", "\"a\", \"b\""),
            ("if-none-match", "*"),
            ("if-modified-since", "Sun, 06 Nov 1994 08:49:37 GMT"),
            ("if-unmodified-since", "not a date"),
        ]));
        assert_eq!(
            conditions.match_etags,
            Some(vec!["\"a\"".to_string(), "\"b\"".to_string()])
        );
        assert_eq!(conditions.not_match_etags, Some(vec!["*".to_string()]));
        assert_eq!(
            conditions.modified_since.unwrap().to_rfc3339(),
            "1994-11-06T08:49:37+00:00"
        );
        assert!(conditions.unmodified_since.is_none());
    }

    #[test]
    fn test_preferences() {
        let preferences = parse_preferences(&headers(&[
            ("accept", "text/turtle;q=0.5, application/json"),
            ("accept-language", "en"),
        ]))
        .unwrap();
        assert_eq!(preferences.media_types["text/turtle"], 0.5);
        assert_eq!(preferences.media_types["application/json"], 1.0);
        assert_eq!(preferences.languages["en"], 1.0);

        assert!(parse_preferences(&headers(&[("accept", "text/turtle;q=high")])).is_err());
    }

    #[test]
    fn test_metadata() {
        let metadata = parse_metadata(&headers(&[
            ("content-type", "Text/Turtle; charset=utf-8"),
            ("slug", "my notes"),
            (
                "link",
                "<http://www.w3.org/ns/ldp#BasicContainer>; rel=\"type\", <http://x/a>; rel=\"describedby\"",
            ),
        ]));
        assert_eq!(metadata.content_type(), Some("text/turtle"));
        assert_eq!(metadata.first(vocab::SLUG), Some("my notes"));
        assert!(metadata.is_container_hint());
        assert_eq!(metadata.types(), &[vocab::LDP_BASIC_CONTAINER.to_string()]);
    }

    #[tokio::test]
    async fn test_parse_operation() {
        let parser = OperationParser::new("http://localhost:3000/");
        let request = HttpRequest::new(
            Method::PUT,
            Uri::from_static("/notes/today?x=1"),
            headers(&[("content-type", "text/plain"), ("content-length", "2")]),
            Body::from("hi"),
        );
        let operation = parser.handle_safe(&request).await.unwrap();
        assert_eq!(operation.target.as_str(), "http://localhost:3000/notes/today");
        assert!(operation.conditions.is_none());

        let body = operation.require_body().unwrap();
        assert!(!body.is_empty);
        assert_eq!(body.content_type(), Some("text/plain"));
        assert_eq!(&body.read_to_bytes(1024).await.unwrap()[..], b"hi");
        assert!(operation.take_body().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_has_no_body() {
        let parser = OperationParser::new("http://localhost:3000");
        let request = HttpRequest::new(
            Method::GET,
            Uri::from_static("/"),
            HeaderMap::new(),
            Body::empty(),
        );
        let operation = parser.handle_safe(&request).await.unwrap();
        assert!(operation.target.is_root());
        assert!(operation.take_body().unwrap().is_none());
    }
}
