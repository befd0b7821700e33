//! HTTP mapping of Podium errors.
//!
//! Handlers and stores fail with [`podium_core::Error`]; only this module
//! knows which status code each kind of failure becomes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use podium_core::{Error, ErrorKind};
use serde::Serialize;

pub use podium_core::Result;

/// The standard JSON response body for an API error.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// A human-readable error message.
    pub error: String,
    /// A machine-readable error code string.
    pub code: String,
    /// Optional additional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A [`podium_core::Error`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    /// Returns the wrapped error.
    pub fn inner(&self) -> &Error {
        &self.0
    }

    /// Returns the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        status_for(&self.0)
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotSupported(_) => StatusCode::NOT_IMPLEMENTED,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
        Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::Forbidden(_) => StatusCode::FORBIDDEN,
        Error::Upstream(_) => StatusCode::BAD_GATEWAY,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::Internal(_) | Error::Io(_) | Error::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Error::Coded { source, .. } => status_for(source),
        Error::Aggregate { kind, .. } => status_for_kind(*kind),
    }
}

fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::BadInput => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Unwraps aggregates in which exactly one candidate did more than decline.
///
/// When a router probes several handlers and a single one objects for a real
/// reason, that objection is what the client should see.
fn significant(err: Error) -> Error {
    match err {
        Error::Aggregate {
            message,
            kind,
            mut errors,
        } => {
            let relevant: Vec<usize> = errors
                .iter()
                .enumerate()
                .filter(|(_, e)| !e.is_unsupported())
                .map(|(i, _)| i)
                .collect();
            if relevant.len() == 1 {
                significant(errors.swap_remove(relevant[0]))
            } else {
                Error::Aggregate {
                    message,
                    kind,
                    errors,
                }
            }
        }
        other => other,
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(significant(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, status = %status, "request rejected");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.error_code().to_string(),
            details: None,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Maps a JSON body error onto the Podium taxonomy.
pub fn json_error(err: serde_json::Error) -> Error {
    Error::BadRequest(format!("invalid JSON: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::PreconditionFailed("x".into()), StatusCode::PRECONDITION_FAILED),
            (Error::MethodNotAllowed("x".into()), StatusCode::METHOD_NOT_ALLOWED),
            (Error::NotAcceptable("x".into()), StatusCode::NOT_ACCEPTABLE),
            (Error::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (Error::Timeout("x".into()), StatusCode::GATEWAY_TIMEOUT),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_aggregate_surfaces_single_objection() {
        let err = Error::aggregate(vec![
            Error::NotSupported("a".into()),
            Error::BadRequest("no interaction".into()).with_code("E0002"),
            Error::NotSupported("b".into()),
        ]);
        let api = ApiError::from(err);
        assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(api.inner().error_code(), "E0002");
    }

    #[test]
    fn test_aggregate_keeps_kind() {
        let err = Error::aggregate(vec![
            Error::NotFound("a".into()),
            Error::Conflict("b".into()),
        ]);
        assert_eq!(ApiError::from(err).status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_response() {
        let response = ApiError::from(Error::Forbidden("nope".into())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
