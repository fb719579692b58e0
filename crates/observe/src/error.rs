use thiserror::Error;

/// Failure to deliver buffered observability events.
///
/// Callers treat these as best-effort: they are logged, not propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ObserveError {
    #[error("observability transport error: {0}")]
    Transport(String),

    #[error("observability ingestion returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("observability backend error: {0}")]
    Backend(String),
}
