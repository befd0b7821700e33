//! Error types shared by every Podium crate.
//!
//! Each variant belongs to exactly one [`ErrorKind`]. Handlers and stores only
//! promise that failures are distinguishable by kind; translating a kind into
//! a transport status happens at the boundary.

use thiserror::Error;

/// A specialized `Result` type for Podium operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A handler does not support the given input; try another one.
    Unsupported,
    /// The requested resource has no stored representation.
    NotFound,
    /// The supplied conditions did not hold against current state.
    PreconditionFailed,
    /// A structural conflict, such as addressing a container as a document.
    Conflict,
    /// Malformed representation, patch or preferences.
    BadInput,
    /// No (valid) credentials were presented.
    Unauthenticated,
    /// The presented credentials do not grant the requested access.
    Forbidden,
    /// A downstream collaborator failed or timed out.
    Upstream,
    /// An invariant violation; always a bug.
    Internal,
}

impl ErrorKind {
    /// Returns `true` for kinds caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ErrorKind::Upstream | ErrorKind::Internal)
    }
}

/// The primary error type for handler and store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Raised by `can_handle` when the input is not supported.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// The requested resource was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The conditions attached to the request did not hold.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// The request conflicts with the current structure of the store.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The operation is never allowed on the target (e.g. deleting the root).
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// A generic error for malformed requests.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// None of the available representations satisfies the preferences.
    #[error("Not acceptable: {0}")]
    NotAcceptable(String),

    /// The body or patch uses a media type nobody can interpret.
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Authentication failed or is missing.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// The authenticated agent is not allowed to perform the action.
    #[error("Not authorized: {0}")]
    Forbidden(String),

    /// A downstream service or backend failed.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// A downstream call did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// An unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// An error from the underlying I/O system.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any other error tagged with a stable code for clients.
    #[error("{source}")]
    Coded {
        /// The client-facing error code, e.g. `E0002`.
        code: &'static str,
        /// The underlying failure, which also decides the kind.
        #[source]
        source: Box<Error>,
    },

    /// Several failures collected by a composite handler.
    #[error("{message}")]
    Aggregate {
        /// The combined messages of all collected errors.
        message: String,
        /// The kind shared by the collected errors, see [`Error::aggregate`].
        kind: ErrorKind,
        /// The collected errors in the order they occurred.
        errors: Vec<Error>,
    },
}

impl Error {
    /// Returns the kind this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotSupported(_) => ErrorKind::Unsupported,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Error::Conflict(_) | Error::MethodNotAllowed(_) => ErrorKind::Conflict,
            Error::BadRequest(_) | Error::NotAcceptable(_) | Error::UnsupportedMediaType(_) => {
                ErrorKind::BadInput
            }
            Error::Unauthorized(_) => ErrorKind::Unauthenticated,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Upstream(_) | Error::Timeout(_) => ErrorKind::Upstream,
            Error::Internal(_) | Error::Io(_) | Error::Serialization(_) => ErrorKind::Internal,
            Error::Coded { source, .. } => source.kind(),
            Error::Aggregate { kind, .. } => *kind,
        }
    }

    /// Returns `true` if this error only means "try another handler".
    pub fn is_unsupported(&self) -> bool {
        self.kind() == ErrorKind::Unsupported
    }

    /// Returns a machine-readable error code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NotSupported(_) => "NOT_SUPPORTED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::PreconditionFailed(_) => "PRECONDITION_FAILED",
            Error::Conflict(_) => "CONFLICT",
            Error::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            Error::BadRequest(_) => "BAD_REQUEST",
            Error::NotAcceptable(_) => "NOT_ACCEPTABLE",
            Error::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Error::Unauthorized(_) => "AUTH_ERROR",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::Upstream(_) => "UPSTREAM_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Coded { code, .. } => *code,
            Error::Aggregate { .. } => "AGGREGATE_ERROR",
        }
    }

    /// Tags this error with a client-facing code, keeping its kind.
    pub fn with_code(self, code: &'static str) -> Error {
        Error::Coded {
            code,
            source: Box::new(self),
        }
    }

    /// Combines the failures collected by a composite into one error.
    ///
    /// A single error is returned unchanged and an empty list means nothing
    /// could handle the input. Otherwise the aggregate keeps the kind all
    /// errors share; mixed client-side kinds become [`ErrorKind::BadInput`]
    /// and anything involving a server-side kind becomes
    /// [`ErrorKind::Internal`].
    pub fn aggregate(mut errors: Vec<Error>) -> Error {
        match errors.len() {
            0 => Error::NotSupported("no handler accepted the input".to_string()),
            1 => errors.remove(0),
            _ => {
                let first = errors[0].kind();
                let kind = if errors.iter().all(|e| e.kind() == first) {
                    first
                } else if errors.iter().all(|e| e.kind().is_client_error()) {
                    ErrorKind::BadInput
                } else {
                    ErrorKind::Internal
                };
                let message = format!(
                    "Multiple handler errors: {}",
                    errors
                        .iter()
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                Error::Aggregate {
                    message,
                    kind,
                    errors,
                }
            }
        }
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::BadRequest(format!("invalid UTF-8: {}", err))
    }
}
