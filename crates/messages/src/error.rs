//! Error types produced while decoding and validating stage messages.
//!
//! Every variant is a hard failure: a message that fails here is rejected
//! before the stage performs any download, archive copy or publish.
//!
//! | Error | Raised when |
//! |-------|-------------|
//! | [`Envelope`](MessageError::Envelope) | Push body is not a Pub/Sub envelope or CloudEvent |
//! | [`Base64`](MessageError::Base64) | `message.data` is not valid base64 |
//! | [`Json`](MessageError::Json) | Decoded data is not JSON of the expected shape |
//! | [`InvalidField`](MessageError::InvalidField) | A field parsed but violates a message invariant |
//! | [`InvalidVendorType`](MessageError::InvalidVendorType) | Vendor identifier has illegal characters |
use thiserror::Error;

/// Errors raised while turning a push body into a validated stage message.
///
/// ```rust
/// use messages::MessageError;
///
/// let err = MessageError::invalid_field("page_count", "must be at least 1");
/// assert_eq!(err.to_string(), "invalid field `page_count`: must be at least 1");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageError {
    /// The outer push envelope could not be understood.
    #[error("invalid push envelope: {0}")]
    Envelope(String),

    /// `message.data` was not valid base64.
    #[error("message data is not valid base64: {0}")]
    Base64(String),

    /// The decoded payload did not deserialize into the expected message shape.
    ///
    /// Unknown fields end up here too, since message structs deny them.
    #[error("message payload does not match expected shape: {0}")]
    Json(String),

    /// A field deserialized but its value breaks a message invariant.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Human readable reason.
        reason: String,
    },

    /// Vendor identifier is empty or contains characters outside `[A-Z0-9_-]`.
    #[error("invalid vendor type `{0}`")]
    InvalidVendorType(String),
}

impl MessageError {
    /// Shorthand for [`MessageError::InvalidField`].
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        MessageError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for MessageError {
    fn from(err: serde_json::Error) -> Self {
        MessageError::Json(err.to_string())
    }
}

impl From<base64::DecodeError> for MessageError {
    fn from(err: base64::DecodeError) -> Self {
        MessageError::Base64(err.to_string())
    }
}
