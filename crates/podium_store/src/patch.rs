//! Partial updates and the patchers that interpret them.
//!
//! A [`Patch`] is never a full representation; its encoding is identified by
//! its content type and only makes sense to a patcher that understands it.
//! Patchers are [`AsyncHandler`]s so the store can hold a
//! [`FirstMatchHandler`] of them and new encodings plug in without touching
//! the store.

use crate::identifier::ResourceIdentifier;
use crate::metadata::RepresentationMetadata;
use crate::preferences::essence;
use crate::representation::{collect_stream, stream_from_bytes, DataStream};
use crate::vocab::media;
use async_trait::async_trait;
use bytes::Bytes;
use podium_core::{AsyncHandler, BoxedHandler, Error, FirstMatchHandler, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// A content-typed description of a partial update.
pub struct Patch {
    pub metadata: RepresentationMetadata,
    pub data: DataStream,
}

impl Patch {
    pub fn new(metadata: RepresentationMetadata, data: DataStream) -> Self {
        Self { metadata, data }
    }

    pub fn from_bytes(content_type: &str, bytes: impl Into<Bytes>) -> Self {
        Self::new(
            RepresentationMetadata::with_content_type(content_type),
            stream_from_bytes(bytes.into()),
        )
    }

    pub fn content_type(&self) -> Option<&str> {
        self.metadata.content_type()
    }

    /// Consumes the patch and buffers its body.
    pub async fn read_to_bytes(self, limit: usize) -> Result<Bytes> {
        collect_stream(self.data, limit).await
    }
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Everything a patcher needs: the patch and the current state, if any.
#[derive(Debug, Clone)]
pub struct PatchInput {
    pub identifier: ResourceIdentifier,
    pub patch_type: String,
    pub patch: Bytes,
    /// `None` when the resource does not exist yet.
    pub current: Option<Bytes>,
    pub current_type: Option<String>,
}

/// The new full state produced by a patcher.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchResult {
    pub data: Bytes,
    pub content_type: String,
}

/// The default patcher chain: JSON Merge Patch, then JSON Patch.
pub fn default_patcher() -> BoxedHandler<PatchInput, PatchResult> {
    Arc::new(FirstMatchHandler::new(vec![
        Arc::new(JsonMergePatcher) as BoxedHandler<PatchInput, PatchResult>,
        Arc::new(JsonPatcher),
    ]))
}

fn is_json_type(content_type: &str) -> bool {
    let content_type = essence(content_type);
    content_type == media::JSON || content_type.ends_with("+json")
}

fn check_json_target(input: &PatchInput, patch_type: &str) -> Result<()> {
    if essence(&input.patch_type) != patch_type {
        return Err(Error::NotSupported(format!(
            "expected {}, got {}",
            patch_type, input.patch_type
        )));
    }
    match &input.current_type {
        Some(current) if !is_json_type(current) => Err(Error::NotSupported(format!(
            "{} cannot patch {}",
            patch_type, current
        ))),
        _ => Ok(()),
    }
}

fn parse_json(bytes: &[u8], what: &str) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|e| Error::BadRequest(format!("invalid {}: {}", what, e)))
}

fn current_document(input: &PatchInput) -> Result<Value> {
    match &input.current {
        Some(bytes) if !bytes.is_empty() => serde_json::from_slice(bytes)
            .map_err(|e| Error::Conflict(format!("stored document is not JSON: {}", e))),
        _ => Ok(Value::Null),
    }
}

fn into_result(input: &PatchInput, document: &Value) -> Result<PatchResult> {
    let data = serde_json::to_vec(document).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(PatchResult {
        data: Bytes::from(data),
        content_type: input
            .current_type
            .clone()
            .unwrap_or_else(|| media::JSON.to_string()),
    })
}

/// RFC 7396 JSON Merge Patch.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMergePatcher;

#[async_trait]
impl AsyncHandler<PatchInput, PatchResult> for JsonMergePatcher {
    async fn can_handle(&self, input: &PatchInput) -> Result<()> {
        check_json_target(input, media::MERGE_PATCH)
    }

    async fn handle(&self, input: &PatchInput) -> Result<PatchResult> {
        let patch = parse_json(&input.patch, "merge patch")?;
        let mut document = current_document(input)?;
        merge(&mut document, &patch);
        into_result(input, &document)
    }
}

fn merge(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        for (key, value) in patch {
            if value.is_null() {
                map.remove(key);
            } else {
                merge(map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// RFC 6902 JSON Patch, restricted to `add`, `remove`, `replace` and `test`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPatcher;

#[async_trait]
impl AsyncHandler<PatchInput, PatchResult> for JsonPatcher {
    async fn can_handle(&self, input: &PatchInput) -> Result<()> {
        check_json_target(input, media::JSON_PATCH)
    }

    async fn handle(&self, input: &PatchInput) -> Result<PatchResult> {
        let Value::Array(operations) = parse_json(&input.patch, "JSON patch")? else {
            return Err(Error::BadRequest("JSON patch must be an array".to_string()));
        };
        let mut document = current_document(input)?;
        for operation in &operations {
            apply_operation(&mut document, operation)?;
        }
        into_result(input, &document)
    }
}

fn apply_operation(document: &mut Value, operation: &Value) -> Result<()> {
    let op = operation
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::BadRequest("patch operation without op".to_string()))?;
    let path = operation
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::BadRequest(format!("{} without path", op)))?;
    if !path.is_empty() && !path.starts_with('/') {
        return Err(Error::BadRequest(format!("invalid pointer: {}", path)));
    }
    let value = || {
        operation
            .get("value")
            .cloned()
            .ok_or_else(|| Error::BadRequest(format!("{} without value", op)))
    };

    match op {
        "add" => add(document, path, value()?),
        "remove" => remove(document, path),
        "replace" => {
            let target = document
                .pointer_mut(path)
                .ok_or_else(|| missing(path))?;
            *target = value()?;
            Ok(())
        }
        "test" => {
            let expected = value()?;
            match document.pointer(path) {
                Some(actual) if *actual == expected => Ok(()),
                _ => Err(Error::Conflict(format!("test failed at {}", path))),
            }
        }
        other => Err(Error::BadRequest(format!("unsupported patch op: {}", other))),
    }
}

fn missing(path: &str) -> Error {
    Error::Conflict(format!("no value at {}", path))
}

/// Splits `/a/b` into the parent pointer `/a` and the unescaped token `b`.
fn split_pointer(path: &str) -> (&str, String) {
    let idx = path.rfind('/').unwrap_or(0);
    let token = path[(idx + 1).min(path.len())..]
        .replace("~1", "/")
        .replace("~0", "~");
    (&path[..idx], token)
}

fn array_index(token: &str, len: usize) -> Result<usize> {
    match token.parse::<usize>() {
        Ok(index) if index <= len && (token == "0" || !token.starts_with('0')) => Ok(index),
        _ => Err(Error::Conflict(format!("invalid array index: {}", token))),
    }
}

fn add(document: &mut Value, path: &str, value: Value) -> Result<()> {
    if path.is_empty() {
        *document = value;
        return Ok(());
    }
    let (parent, token) = split_pointer(path);
    match document.pointer_mut(parent).ok_or_else(|| missing(parent))? {
        Value::Object(map) => {
            map.insert(token, value);
            Ok(())
        }
        Value::Array(items) => {
            let index = if token == "-" {
                items.len()
            } else {
                array_index(&token, items.len())?
            };
            items.insert(index, value);
            Ok(())
        }
        _ => Err(missing(path)),
    }
}

fn remove(document: &mut Value, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::Conflict("cannot remove the whole document".to_string()));
    }
    let (parent, token) = split_pointer(path);
    match document.pointer_mut(parent).ok_or_else(|| missing(parent))? {
        Value::Object(map) => map.remove(&token).map(|_| ()).ok_or_else(|| missing(path)),
        Value::Array(items) => {
            let index = array_index(&token, items.len())?;
            if index >= items.len() {
                return Err(missing(path));
            }
            items.remove(index);
            Ok(())
        }
        _ => Err(missing(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(patch_type: &str, patch: Value, current: Option<Value>) -> PatchInput {
        PatchInput {
            identifier: ResourceIdentifier::parse("http://h/doc").unwrap(),
            patch_type: patch_type.to_string(),
            patch: Bytes::from(patch.to_string()),
            current: current.map(|c| Bytes::from(c.to_string())),
            current_type: Some(media::JSON.to_string()),
        }
    }

    fn parse(result: PatchResult) -> Value {
        serde_json::from_slice(&result.data).unwrap()
    }

    #[tokio::test]
    async fn test_merge_patch() {
        let input = input(
            media::MERGE_PATCH,
            json!({"a": "z", "c": {"f": null}, "n": 1}),
            Some(json!({"a": "b", "c": {"d": "e", "f": "g"}})),
        );
        let result = JsonMergePatcher.handle_safe(&input).await.unwrap();
        assert_eq!(parse(result), json!({"a": "z", "c": {"d": "e"}, "n": 1}));
    }

    #[tokio::test]
    async fn test_merge_patch_creates() {
        let mut input = input(media::MERGE_PATCH, json!({"title": "new"}), None);
        input.current_type = None;
        let result = JsonMergePatcher.handle_safe(&input).await.unwrap();
        assert_eq!(result.content_type, media::JSON);
        assert_eq!(parse(result), json!({"title": "new"}));
    }

    #[tokio::test]
    async fn test_json_patch_operations() {
        let input = input(
            media::JSON_PATCH,
            json!([
                {"op": "test", "path": "/name", "value": "old"},
                {"op": "replace", "path": "/name", "value": "new"},
                {"op": "add", "path": "/tags/-", "value": "x"},
                {"op": "add", "path": "/tags/0", "value": "first"},
                {"op": "remove", "path": "/gone"},
                {"op": "add", "path": "/a~1b", "value": true}
            ]),
            Some(json!({"name": "old", "tags": ["t"], "gone": 1})),
        );
        let result = JsonPatcher.handle_safe(&input).await.unwrap();
        assert_eq!(
            parse(result),
            json!({"name": "new", "tags": ["first", "t", "x"], "a/b": true})
        );
    }

    #[tokio::test]
    async fn test_json_patch_failed_test_conflicts() {
        let input = input(
            media::JSON_PATCH,
            json!([{"op": "test", "path": "/name", "value": "other"}]),
            Some(json!({"name": "old"})),
        );
        let err = JsonPatcher.handle_safe(&input).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_json_patch_malformed() {
        let input = input(media::JSON_PATCH, json!({"op": "add"}), None);
        let err = JsonPatcher.handle_safe(&input).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let input2 = self::input(media::JSON_PATCH, json!([{"op": "move", "path": "/a"}]), None);
        assert!(matches!(
            JsonPatcher.handle_safe(&input2).await,
            Err(Error::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_chain_routes_by_type() {
        let patcher = default_patcher();
        let merge = input(media::MERGE_PATCH, json!({"x": 1}), Some(json!({})));
        assert_eq!(parse(patcher.handle_safe(&merge).await.unwrap()), json!({"x": 1}));

        let unknown = input("text/n3", json!({}), None);
        assert!(patcher.can_handle(&unknown).await.unwrap_err().is_unsupported());
    }

    #[tokio::test]
    async fn test_rejects_non_json_target() {
        let mut input = input(media::MERGE_PATCH, json!({"x": 1}), None);
        input.current_type = Some("text/plain".to_string());
        assert!(JsonMergePatcher.can_handle(&input).await.is_err());
    }
}
