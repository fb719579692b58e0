use std::sync::Arc;

use classify::{validate_all_images, QualityConfig, VendorClassifier};
use cloud::{parse_gcs_uri, ObjectStore, Publisher};
use messages::{decode_message, ClassifiedMessage, ConvertedMessage, StageMessage, VendorType};
use observe::Timing;
use tracing::{error, info, warn};

use super::{Invocation, StageOutcome};
use crate::{ConfigError, PipelineConfig, StageError};

/// Validates page quality, detects the vendor, archives the original and
/// publishes a [`ClassifiedMessage`].
pub struct ClassifyStage {
    store: Arc<dyn ObjectStore>,
    publisher: Arc<dyn Publisher>,
    classifier: VendorClassifier,
    quality: QualityConfig,
    archive_bucket: String,
    topic: String,
}

#[derive(Debug, Default)]
struct Summary {
    vendor_type: Option<VendorType>,
    quality_score: f64,
}

impl ClassifyStage {
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn ObjectStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, ConfigError> {
        let classifier = VendorClassifier::new(&config.classifier.vendor_rules)
            .map_err(|e| ConfigError::Validation(format!("classifier.vendor_rules: {e}")))?;
        Ok(Self {
            store,
            publisher,
            classifier,
            quality: config.classifier.quality.clone(),
            archive_bucket: config.archive_bucket.clone(),
            topic: config.classified_topic.clone(),
        })
    }

    /// Handle one push body carrying a [`ConvertedMessage`].
    pub async fn handle(&self, body: &[u8]) -> Result<StageOutcome, StageError> {
        let timing = Timing::new();
        let mut invocation = Invocation::new();
        let mut summary = Summary::default();

        let result = {
            let _scope = timing.start();
            self.run(body, &mut invocation, &mut summary).await
        };
        let latency_ms = timing.latency_ms().unwrap_or_default();

        match &result {
            Ok(StageOutcome::Published { topic, .. }) => info!(
                source_file = %invocation.source_file,
                vendor_type = summary.vendor_type.as_ref().map_or("unknown", VendorType::as_str),
                quality_score = summary.quality_score,
                topic = %topic,
                latency_ms,
                total_input_bytes = invocation.total_input_bytes,
                "Classification complete - published event"
            ),
            Ok(StageOutcome::RoutedToFailure { .. }) => {}
            Err(e) => error!(
                error = %e,
                error_type = e.kind(),
                source_file = %invocation.source_file,
                latency_ms,
                total_input_bytes = invocation.total_input_bytes,
                "Classification failed"
            ),
        }
        result
    }

    async fn run(
        &self,
        body: &[u8],
        invocation: &mut Invocation,
        summary: &mut Summary,
    ) -> Result<StageOutcome, StageError> {
        let message: ConvertedMessage = decode_message(body)?;
        invocation.track(&message);
        let source_file = message.source_file();

        info!(
            source_file,
            page_count = message.page_count,
            converted_files = ?message.converted_files,
            "Processing converted invoice"
        );

        let images = invocation
            .download_all(self.store.as_ref(), &message.converted_files)
            .await?;
        info!(
            source_file,
            file_count = images.len(),
            total_input_bytes = invocation.total_input_bytes,
            "Downloaded all images"
        );

        let report = validate_all_images(&images, &self.quality);
        summary.quality_score = report.average_score;
        if !report.all_valid {
            warn!(
                source_file,
                quality_score = report.average_score,
                issues = ?report.issues,
                "Image quality validation failed"
            );
        }

        let classification = self
            .classifier
            .classify(&message.source_file, &message.converted_files);
        info!(
            source_file,
            vendor_type = %classification.vendor_type,
            confidence = classification.confidence,
            detection_method = %classification.detection_method,
            matched_pattern = ?classification.matched_pattern,
            "Vendor classification complete"
        );
        summary.vendor_type = Some(classification.vendor_type.clone());

        let source = parse_gcs_uri(&message.source_file)?;
        let archived = self
            .store
            .copy(&source, &source.in_bucket(&self.archive_bucket))
            .await?;
        info!(source_file, archive_uri = %archived, "Archived original file");

        let classified = ClassifiedMessage {
            source_file: message.source_file.clone(),
            converted_files: message.converted_files.clone(),
            vendor_type: classification.vendor_type,
            quality_score: report.average_score,
            archived_to: archived.uri(),
            trace_id: message.trace_id.clone(),
            session_id: message.session_id.clone(),
            parent_span_id: message.parent_span_id.clone(),
        };
        let payload = serde_json::to_value(&classified)
            .map_err(|e| StageError::encode("classified message", e))?;
        let message_id = self.publisher.publish(&self.topic, &payload).await?;

        Ok(StageOutcome::Published {
            topic: self.topic.clone(),
            message_id,
        })
    }
}
