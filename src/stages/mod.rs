//! Stage handlers, one per bus subscription.
//!
//! Each handler takes the raw push body and either publishes the next
//! message, routes the document to the failed bucket, or returns a
//! [`StageError`]. Validation happens before any side effect.

mod classify;
mod extract;

pub use self::classify::ClassifyStage;
pub use self::extract::ExtractStage;

use bytes::Bytes;
use cloud::{parse_gcs_uri, ObjectStore};
use messages::StageMessage;

use crate::StageError;

/// How an invocation ended when it did not fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The next message was published.
    Published { topic: String, message_id: String },
    /// Extraction failed; the original went to the failed bucket and nothing was published.
    RoutedToFailure { error: String },
}

impl StageOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, StageOutcome::Published { .. })
    }
}

/// Fields the outer boundary logs whether or not the invocation succeeded.
#[derive(Debug)]
pub(crate) struct Invocation {
    pub source_file: String,
    pub total_input_bytes: u64,
}

impl Invocation {
    pub fn new() -> Self {
        Self {
            source_file: "unknown".to_string(),
            total_input_bytes: 0,
        }
    }

    /// Remember which document this invocation is about.
    pub fn track(&mut self, message: &impl StageMessage) {
        self.source_file = message.source_file().to_string();
    }

    /// Read every page in order, counting bytes as they arrive.
    pub async fn download_all(
        &mut self,
        store: &dyn ObjectStore,
        uris: &[String],
    ) -> Result<Vec<Bytes>, StageError> {
        let mut images = Vec::with_capacity(uris.len());
        self.total_input_bytes = 0;
        for uri in uris {
            let location = parse_gcs_uri(uri)?;
            let data = store.read(&location).await?;
            self.total_input_bytes += data.len() as u64;
            images.push(data);
        }
        Ok(images)
    }
}
