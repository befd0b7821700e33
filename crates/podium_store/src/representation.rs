//! Representations: a single-use data stream plus its metadata.

use crate::metadata::RepresentationMetadata;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use podium_core::{Error, Result};
use std::fmt;

/// Upper bound for buffering a representation in memory (16 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// The byte stream of a representation. Can be consumed only once.
pub type DataStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Wraps a single buffer into a [`DataStream`].
pub fn stream_from_bytes(bytes: Bytes) -> DataStream {
    if bytes.is_empty() {
        stream::empty().boxed()
    } else {
        stream::once(async move { Ok(bytes) }).boxed()
    }
}

/// Drains `data` into one buffer, failing once more than `limit` bytes arrive.
pub async fn collect_stream(mut data: DataStream, limit: usize) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = data.next().await {
        let chunk = chunk?;
        if buffer.len() + chunk.len() > limit {
            return Err(Error::BadRequest(format!(
                "body exceeds the limit of {} bytes",
                limit
            )));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

/// A concrete encoding of a resource's state.
///
/// Ownership of the stream moves with the value; reading it consumes the
/// representation.
pub struct Representation {
    pub metadata: RepresentationMetadata,
    pub data: DataStream,
    /// Hint that the stream yields no bytes.
    pub is_empty: bool,
}

impl Representation {
    pub fn new(metadata: RepresentationMetadata, data: DataStream, is_empty: bool) -> Self {
        Self {
            metadata,
            data,
            is_empty,
        }
    }

    /// Creates a representation over an in-memory buffer.
    pub fn from_bytes(metadata: RepresentationMetadata, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let is_empty = bytes.is_empty();
        Self::new(metadata, stream_from_bytes(bytes), is_empty)
    }

    /// Creates a representation without data (containers, HEAD responses).
    pub fn empty(metadata: RepresentationMetadata) -> Self {
        Self::new(metadata, stream::empty().boxed(), true)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.metadata.content_type()
    }

    /// Consumes the representation and buffers its data.
    pub async fn read_to_bytes(self, limit: usize) -> Result<Bytes> {
        collect_stream(self.data, limit).await
    }

    /// Splits off the metadata and buffers the data.
    pub async fn into_parts(self, limit: usize) -> Result<(RepresentationMetadata, Bytes)> {
        let data = collect_stream(self.data, limit).await?;
        Ok((self.metadata, data))
    }
}

impl fmt::Debug for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Representation")
            .field("metadata", &self.metadata)
            .field("is_empty", &self.is_empty)
            .finish_non_exhaustive()
    }
}
