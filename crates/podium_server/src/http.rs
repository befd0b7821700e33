//! The request type every HTTP handler in the pipeline receives.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::Response;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use podium_core::{AsyncHandler, BoxedHandler, Error, Result};
use podium_store::representation::DataStream;
use std::sync::Mutex;

/// An incoming request shared by reference between handlers.
///
/// Handlers only need the head to decide whether they apply, so the head is
/// freely readable while the body can be taken exactly once by the handler
/// that ends up doing the work.
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Mutex<Option<Body>>,
}

/// A handler turning requests into responses.
pub trait HttpHandler: AsyncHandler<HttpRequest, Response> {}

impl<T: AsyncHandler<HttpRequest, Response> + ?Sized> HttpHandler for T {}

/// A shared HTTP handler as held by the pipeline composites.
pub type BoxedHttpHandler = BoxedHandler<HttpRequest, Response>;

impl HttpRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Body) -> Self {
        Self {
            method,
            uri,
            headers,
            body: Mutex::new(Some(body)),
        }
    }

    /// Splits an axum request into a pipeline request.
    pub fn from_request(request: Request) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value if it is present and valid visible ASCII.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns `true` if the request announces a non-empty body.
    pub fn has_body(&self) -> bool {
        match self.header(header::CONTENT_LENGTH) {
            Some(length) => length.trim() != "0",
            None => self.headers.contains_key(header::TRANSFER_ENCODING),
        }
    }

    /// Takes the body. Fails if another handler already took it.
    pub fn take_body(&self) -> Result<Body> {
        self.body
            .lock()
            .map_err(|e| Error::Internal(format!("request body lock poisoned: {}", e)))?
            .take()
            .ok_or_else(|| Error::Internal("request body already consumed".to_string()))
    }

    /// Takes the body as a [`DataStream`].
    pub fn take_stream(&self) -> Result<DataStream> {
        let body = self.take_body()?;
        Ok(body
            .into_data_stream()
            .map_err(std::io::Error::other)
            .boxed())
    }

    /// Takes and buffers the body, failing past `limit` bytes.
    pub async fn read_body(&self, limit: usize) -> Result<Bytes> {
        let body = self.take_body()?;
        axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| Error::BadRequest(format!("failed to read body: {}", e)))
    }

    /// Takes the body and parses it as JSON.
    pub async fn read_json<T: serde::de::DeserializeOwned>(&self, limit: usize) -> Result<T> {
        let bytes = self.read_body(limit).await?;
        serde_json::from_slice(&bytes).map_err(crate::error::json_error)
    }

    /// Returns the value of the cookie `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}
