use cloud::{PublishError, StorageError, UriError};
use extract::ExtractError;
use messages::MessageError;
use thiserror::Error;

/// A fault that aborts one stage invocation.
///
/// Provider failures are not faults: they surface as
/// [`StageOutcome::RoutedToFailure`](crate::StageOutcome::RoutedToFailure).
#[derive(Debug, Error)]
pub enum StageError {
    #[error("invalid message: {0}")]
    Message(#[from] MessageError),

    #[error("invalid object URI: {0}")]
    Uri(#[from] UriError),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("publish failure: {0}")]
    Publish(#[from] PublishError),

    #[error("extraction failure: {0}")]
    Extract(#[from] ExtractError),

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StageError {
    pub(crate) fn encode(what: &'static str, source: serde_json::Error) -> Self {
        StageError::Encode { what, source }
    }

    /// Stable label for the `error_type` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Message(_) => "MessageError",
            StageError::Uri(_) => "UriError",
            StageError::Storage(StorageError::NotFound(_)) => "NotFound",
            StageError::Storage(_) => "StorageError",
            StageError::Publish(_) => "PublishError",
            StageError::Extract(_) => "ExtractError",
            StageError::Encode { .. } => "EncodeError",
        }
    }

    /// True when the inbound message itself is at fault; redelivery cannot help.
    pub fn is_validation(&self) -> bool {
        matches!(self, StageError::Message(_) | StageError::Uri(_))
    }
}
