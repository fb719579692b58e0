use std::sync::Arc;

use cloud::{ObjectStore, Publisher};
use extract::scores::EXTRACTION_CONFIDENCE;
use extract::{calculate_extraction_scores, score_comments, ExtractionResult, InvoiceExtractor};
use messages::{decode_message, ClassifiedMessage, ExtractedMessage, StageMessage, TraceContext};
use observe::{Observer, Timing};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::{Invocation, StageOutcome};
use crate::{best_effort, FailureRouter, PipelineConfig, StageError};

/// Extracts the invoice behind a [`ClassifiedMessage`] and publishes an
/// [`ExtractedMessage`], or routes the original to the failed bucket when
/// every provider failed.
pub struct ExtractStage {
    store: Arc<dyn ObjectStore>,
    publisher: Arc<dyn Publisher>,
    extractor: InvoiceExtractor,
    observer: Arc<dyn Observer>,
    router: FailureRouter,
    topic: String,
}

#[derive(Debug, Default)]
struct Summary {
    invoice_id: Option<String>,
    llm_latency_ms: u64,
}

impl ExtractStage {
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn ObjectStore>,
        publisher: Arc<dyn Publisher>,
        extractor: InvoiceExtractor,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let router = FailureRouter::new(store.clone(), config.failed_bucket.clone());
        Self {
            store,
            publisher,
            extractor,
            observer,
            router,
            topic: config.extracted_topic.clone(),
        }
    }

    /// Handle one push body carrying a [`ClassifiedMessage`].
    pub async fn handle(&self, body: &[u8]) -> Result<StageOutcome, StageError> {
        let timing = Timing::new();
        let mut invocation = Invocation::new();
        let mut summary = Summary::default();

        let result = {
            let _scope = timing.start();
            let result = self.run(body, &mut invocation, &mut summary).await;
            if result.is_err() {
                self.flush().await;
            }
            result
        };
        let latency_ms = timing.latency_ms().unwrap_or_default();

        match &result {
            Ok(StageOutcome::Published { topic, .. }) => info!(
                source_file = %invocation.source_file,
                invoice_id = ?summary.invoice_id,
                topic = %topic,
                latency_ms,
                llm_latency_ms = summary.llm_latency_ms,
                total_input_bytes = invocation.total_input_bytes,
                "Extraction complete - published event"
            ),
            Ok(StageOutcome::RoutedToFailure { .. }) => {}
            Err(e) => error!(
                error = %e,
                error_type = e.kind(),
                source_file = %invocation.source_file,
                latency_ms,
                total_input_bytes = invocation.total_input_bytes,
                "Extraction processing failed"
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
        let message: ClassifiedMessage = decode_message(body)?;
        invocation.track(&message);
        let source_file = message.source_file();
        let trace = message.trace_context();

        info!(
            source_file,
            vendor_type = %message.vendor_type,
            quality_score = message.quality_score,
            page_count = message.converted_files.len(),
            trace_id = %trace.trace_id,
            session_id = %trace.session_id,
            "Processing classified invoice"
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

        let result = self
            .extractor
            .extract(&images, &message.vendor_type, &trace)
            .await?;
        summary.llm_latency_ms = result.latency_ms;

        if let Some(error) = result.error() {
            error!(
                source_file,
                error,
                provider = %result.provider,
                llm_latency_ms = result.latency_ms,
                "Extraction failed - moving to failed bucket"
            );
            self.router.route(source_file, error).await;
            self.flush().await;
            return Ok(StageOutcome::RoutedToFailure {
                error: error.to_string(),
            });
        }

        summary.invoice_id = result.invoice().map(|i| i.invoice_id.clone());
        info!(
            source_file,
            vendor_type = %message.vendor_type,
            provider = %result.provider,
            llm_latency_ms = result.latency_ms,
            confidence = result.confidence,
            invoice_id = ?summary.invoice_id,
            prompt_name = %result.prompt_name,
            prompt_version = %result.prompt_version,
            trace_id = %trace.trace_id,
            "Extraction successful"
        );

        self.score(&result, &trace);

        let extracted = ExtractedMessage {
            trace_id: trace.trace_id.clone(),
            session_id: trace.session_id.clone(),
            parent_span_id: trace.parent_span_id.clone(),
            source_file: message.source_file.clone(),
            vendor_type: message.vendor_type.clone(),
            extraction_model: result.model.clone(),
            extraction_latency_ms: result.latency_ms,
            confidence_score: result.confidence,
            extracted_data: extracted_data(&result)?,
            prompt_name: result.prompt_name.clone(),
            prompt_version: result.prompt_version.clone(),
        };
        let payload = serde_json::to_value(&extracted)
            .map_err(|e| StageError::encode("extracted message", e))?;
        let message_id = self.publisher.publish(&self.topic, &payload).await?;

        self.flush().await;
        Ok(StageOutcome::Published {
            topic: self.topic.clone(),
            message_id,
        })
    }

    /// Attach the derived quality scores to the trace.
    fn score(&self, result: &ExtractionResult, trace: &TraceContext) {
        let Some(invoice) = result.invoice() else {
            return;
        };
        if !self.observer.is_enabled() {
            return;
        }

        let mut scores = calculate_extraction_scores(invoice);
        scores.insert(EXTRACTION_CONFIDENCE.to_string(), result.confidence);
        let mut comments = score_comments(invoice, &scores);
        comments.insert(
            EXTRACTION_CONFIDENCE.to_string(),
            format!(
                "Provider: {}, latency: {}ms",
                result.provider, result.latency_ms
            ),
        );

        self.observer.score_trace(&trace.trace_id, &scores, &comments);
        debug!(trace_id = %trace.trace_id, scores = ?scores, "Added LangFuse scores");
    }

    async fn flush(&self) {
        best_effort("observer_flush", self.observer.flush()).await;
    }
}

fn extracted_data(result: &ExtractionResult) -> Result<Value, StageError> {
    match result.invoice() {
        Some(invoice) => {
            serde_json::to_value(invoice).map_err(|e| StageError::encode("invoice", e))
        }
        None => Ok(json!({})),
    }
}
