use std::sync::Arc;

use bytes::Bytes;
use cloud::{parse_gcs_uri, ObjectLocation, ObjectStore};
use serde_json::json;
use tracing::info;

use crate::{best_effort, StageError};

const ERROR_RECORD_SUFFIX: &str = ".error.json";

/// Moves originals whose extraction failed into the failed bucket.
///
/// The object lands at the bucket root under its file name, next to a
/// `<file name>.error.json` record holding the source URI and the error.
#[derive(Clone)]
pub struct FailureRouter {
    store: Arc<dyn ObjectStore>,
    failed_bucket: String,
}

impl FailureRouter {
    pub fn new(store: Arc<dyn ObjectStore>, failed_bucket: impl Into<String>) -> Self {
        Self {
            store,
            failed_bucket: failed_bucket.into(),
        }
    }

    /// Route `source_file`, logging and swallowing any fault.
    pub async fn route(&self, source_file: &str, error_message: &str) {
        best_effort(
            "failure_routing",
            self.try_route(source_file, error_message),
        )
        .await;
    }

    pub async fn try_route(
        &self,
        source_file: &str,
        error_message: &str,
    ) -> Result<ObjectLocation, StageError> {
        let source = parse_gcs_uri(source_file)?;
        let file_name = source.file_name().to_string();

        let failed = ObjectLocation::new(&self.failed_bucket, &file_name);
        self.store.copy(&source, &failed).await?;

        let record = json!({
            "source_file": source_file,
            "error": error_message,
        });
        let body = serde_json::to_vec(&record).map_err(|e| StageError::encode("error record", e))?;
        let record_location =
            ObjectLocation::new(&self.failed_bucket, format!("{file_name}{ERROR_RECORD_SUFFIX}"));
        self.store
            .write(&record_location, Bytes::from(body), "application/json")
            .await?;

        info!(
            source_file,
            failed_uri = %failed,
            "Copied failed invoice to failed bucket"
        );
        Ok(failed)
    }
}
