//! Errors raised by the storage, bus and credential adapters.
use thiserror::Error;

/// A storage URI that is not of the form `gs://bucket/path`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("storage URI `{0}` must start with gs://")]
    Scheme(String),
    #[error("storage URI `{0}` has no bucket")]
    MissingBucket(String),
    #[error("storage URI `{0}` has no object path")]
    MissingPath(String),
}

/// Failure to obtain an access token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("metadata server request failed: {0}")]
    Transport(String),
    #[error("metadata server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("metadata server response is malformed: {0}")]
    Malformed(String),
}

/// Object store failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    /// The object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The backend answered with a non-success status.
    #[error("storage request for {location} failed with {status}: {body}")]
    Status {
        location: String,
        status: u16,
        body: String,
    },

    /// The request never produced a response.
    #[error("storage transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Uri(#[from] UriError),

    /// Any other backend fault, including poisoned locks in the in-memory store.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn backend(msg: impl Into<String>) -> Self {
        StorageError::Backend(msg.into())
    }
}

/// Message bus publish failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PublishError {
    #[error("publish to {topic} failed with {status}: {body}")]
    Status {
        topic: String,
        status: u16,
        body: String,
    },

    #[error("publish transport error: {0}")]
    Transport(String),

    #[error("publish response carried no message id")]
    MissingMessageId,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("publisher backend error: {0}")]
    Backend(String),
}

impl PublishError {
    pub fn backend(msg: impl Into<String>) -> Self {
        PublishError::Backend(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_convert() {
        let err: StorageError = AuthError::Transport("refused".into()).into();
        assert_eq!(err.to_string(), "metadata server request failed: refused");
        let err: PublishError = AuthError::Malformed("no token".into()).into();
        assert!(matches!(err, PublishError::Auth(_)));
    }
}
