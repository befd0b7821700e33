//! Response header writers.
//!
//! Every writer looks at the metadata of the returned representation and
//! contributes zero or more headers. They run side by side in a
//! [`ParallelHandler`].

use async_trait::async_trait;
use axum::http::{header, HeaderName, HeaderValue};
use podium_core::{AsyncHandler, BoxedHandler, Error, ParallelHandler, Result};
use podium_store::RepresentationMetadata;
use std::sync::Arc;

/// Headers produced by one writer.
pub type HeaderPairs = Vec<(HeaderName, HeaderValue)>;

/// Format of `Last-Modified` and other HTTP dates.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

fn value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::Internal(format!("invalid header value {:?}: {}", value, e)))
}

pub struct EtagWriter;

#[async_trait]
impl AsyncHandler<RepresentationMetadata, HeaderPairs> for EtagWriter {
    async fn handle(&self, input: &RepresentationMetadata) -> Result<HeaderPairs> {
        input
            .etag()
            .map(|etag| value(&etag).map(|v| (header::ETAG, v)))
            .into_iter()
            .collect()
    }
}

pub struct LastModifiedWriter;

#[async_trait]
impl AsyncHandler<RepresentationMetadata, HeaderPairs> for LastModifiedWriter {
    async fn handle(&self, input: &RepresentationMetadata) -> Result<HeaderPairs> {
        input
            .modified()
            .map(|time| {
                value(&time.format(HTTP_DATE_FORMAT).to_string())
                    .map(|v| (header::LAST_MODIFIED, v))
            })
            .into_iter()
            .collect()
    }
}

pub struct ContentTypeWriter;

#[async_trait]
impl AsyncHandler<RepresentationMetadata, HeaderPairs> for ContentTypeWriter {
    async fn handle(&self, input: &RepresentationMetadata) -> Result<HeaderPairs> {
        input
            .content_type()
            .map(|content_type| value(content_type).map(|v| (header::CONTENT_TYPE, v)))
            .into_iter()
            .collect()
    }
}

/// One `Link: <iri>; rel="type"` header per resource type.
pub struct LinkTypeWriter;

#[async_trait]
impl AsyncHandler<RepresentationMetadata, HeaderPairs> for LinkTypeWriter {
    async fn handle(&self, input: &RepresentationMetadata) -> Result<HeaderPairs> {
        input
            .types()
            .iter()
            .map(|iri| value(&format!("<{}>; rel=\"type\"", iri)).map(|v| (header::LINK, v)))
            .collect()
    }
}

/// All writers combined.
pub fn metadata_writer() -> BoxedHandler<RepresentationMetadata, Vec<HeaderPairs>> {
    Arc::new(ParallelHandler::new(vec![
        Arc::new(EtagWriter) as BoxedHandler<RepresentationMetadata, HeaderPairs>,
        Arc::new(LastModifiedWriter),
        Arc::new(ContentTypeWriter),
        Arc::new(LinkTypeWriter),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use podium_store::vocab;

    #[tokio::test]
    async fn test_writes_all_headers() {
        let mut metadata = RepresentationMetadata::with_content_type("text/turtle");
        metadata.set_modified(Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap());
        metadata.set_revision("r1");
        metadata.add_type(vocab::LDP_CONTAINER);
        metadata.add_type(vocab::LDP_BASIC_CONTAINER);

        let headers: HeaderPairs = metadata_writer()
            .handle_safe(&metadata)
            .await
            .unwrap()
            .into_iter()
            .flatten()
            .collect();

        let get = |name: HeaderName| -> Vec<String> {
            headers
                .iter()
                .filter(|(n, _)| *n == name)
                .map(|(_, v)| v.to_str().unwrap().to_string())
                .collect()
        };
        assert_eq!(get(header::CONTENT_TYPE), vec!["text/turtle"]);
        assert_eq!(
            get(header::LAST_MODIFIED),
            vec!["Sun, 06 Nov 1994 08:49:37 GMT"]
        );
        assert_eq!(get(header::ETAG), vec!["\"r1\""]);
        assert_eq!(
            get(header::LINK),
            vec![
                format!("<{}>; rel=\"type\"", vocab::LDP_CONTAINER),
                format!("<{}>; rel=\"type\"", vocab::LDP_BASIC_CONTAINER),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_metadata_writes_nothing() {
        let headers = metadata_writer()
            .handle_safe(&RepresentationMetadata::new())
            .await
            .unwrap();
        assert!(headers.iter().all(Vec::is_empty));
    }
}
