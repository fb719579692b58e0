use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use messages::{TraceContext, VendorType};
use observe::{GenerationEvent, Observer};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::retry::generate_with_retry;
use crate::scores::{field_completeness, line_item_arithmetic, totals_consistency};
use crate::{
    ExtractError, GenerationRequest, Invoice, LlmProvider, PromptRegistry, PromptTemplate,
    ProviderOutcome, RetryConfig,
};

const GENERATION_NAME: &str = "invoice-extraction";

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Extracted(Invoice),
    Failed { error: String },
}

/// What one extraction produced and which provider produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub outcome: ExtractionOutcome,
    /// Provider that answered, or the last one tried on failure.
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
    pub confidence: f64,
    pub prompt_name: String,
    pub prompt_version: String,
}

impl ExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ExtractionOutcome::Extracted(_))
    }

    pub fn invoice(&self) -> Option<&Invoice> {
        match &self.outcome {
            ExtractionOutcome::Extracted(invoice) => Some(invoice),
            ExtractionOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ExtractionOutcome::Failed { error } => Some(error),
            ExtractionOutcome::Extracted(_) => None,
        }
    }
}

/// Primary provider with an optional fallback, both retried per [`RetryConfig`].
pub struct InvoiceExtractor {
    primary: Arc<dyn LlmProvider>,
    fallback: Option<Arc<dyn LlmProvider>>,
    prompts: PromptRegistry,
    retry: RetryConfig,
    observer: Arc<dyn Observer>,
}

struct Attempt {
    result: Result<Invoice, String>,
    latency_ms: u64,
}

impl InvoiceExtractor {
    pub fn new(primary: Arc<dyn LlmProvider>, observer: Arc<dyn Observer>) -> Self {
        Self {
            primary,
            fallback: None,
            prompts: PromptRegistry::default(),
            retry: RetryConfig::default(),
            observer,
        }
    }

    pub fn with_fallback(mut self, fallback: Option<Arc<dyn LlmProvider>>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptRegistry) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Extract an invoice from page images.
    ///
    /// Provider failures, and empty pages no provider could read, come back as
    /// `Ok` with a failed outcome. `Err` is reserved for a call with no pages.
    pub async fn extract(
        &self,
        images: &[Bytes],
        vendor: &VendorType,
        trace: &TraceContext,
    ) -> Result<ExtractionResult, ExtractError> {
        if images.is_empty() {
            return Err(ExtractError::NoImages);
        }
        let prompt = self.prompts.for_vendor(vendor);
        if let Some(idx) = images.iter().position(|i| i.is_empty()) {
            let error = format!("page {} is empty", idx + 1);
            warn!(error = %error, "Skipping providers for unreadable input");
            return Ok(self.failure(self.primary.as_ref(), error, 0, prompt));
        }

        let request = GenerationRequest::png(&prompt.system, &prompt.instruction, images.to_vec());

        let primary = self
            .attempt(self.primary.as_ref(), &request, prompt, vendor, trace)
            .await;
        let primary_error = match primary.result {
            Ok(invoice) => {
                return Ok(self.success(self.primary.as_ref(), invoice, primary.latency_ms, prompt))
            }
            Err(error) => error,
        };

        let Some(fallback) = self.fallback.as_deref() else {
            return Ok(self.failure(
                self.primary.as_ref(),
                format!("primary ({}) failed: {primary_error}", self.primary.name()),
                primary.latency_ms,
                prompt,
            ));
        };

        warn!(
            primary = self.primary.name(),
            fallback = fallback.name(),
            error = %primary_error,
            "Primary provider failed, trying fallback"
        );
        let secondary = self.attempt(fallback, &request, prompt, vendor, trace).await;
        match secondary.result {
            Ok(invoice) => Ok(self.success(fallback, invoice, secondary.latency_ms, prompt)),
            Err(fallback_error) => Ok(self.failure(
                fallback,
                format!(
                    "primary ({}) failed: {primary_error}; fallback ({}) failed: {fallback_error}",
                    self.primary.name(),
                    fallback.name()
                ),
                primary.latency_ms + secondary.latency_ms,
                prompt,
            )),
        }
    }

    async fn attempt(
        &self,
        provider: &dyn LlmProvider,
        request: &GenerationRequest,
        prompt: &PromptTemplate,
        vendor: &VendorType,
        trace: &TraceContext,
    ) -> Attempt {
        let started = Instant::now();
        let outcome = generate_with_retry(provider, request, &self.retry, |attempt, outcome| {
            self.report(provider, prompt, vendor, trace, request.images.len(), attempt, outcome);
        })
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            ProviderOutcome::Generated(output) => parse_invoice(&output.text),
            ProviderOutcome::Failed(failure) => Err(failure.error),
        };
        if let Err(error) = &result {
            warn!(provider = provider.name(), error = %error, latency_ms, "Provider extraction failed");
        }
        Attempt { result, latency_ms }
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        provider: &dyn LlmProvider,
        prompt: &PromptTemplate,
        vendor: &VendorType,
        trace: &TraceContext,
        image_count: usize,
        attempt: u32,
        outcome: &ProviderOutcome,
    ) {
        if !self.observer.is_enabled() {
            return;
        }
        let end_time = Utc::now();
        let start_time = end_time - chrono::Duration::milliseconds(outcome.latency_ms() as i64);
        let (output, usage, error) = match outcome {
            ProviderOutcome::Generated(out) => (Some(Value::String(out.text.clone())), out.usage, None),
            ProviderOutcome::Failed(failure) => (None, None, Some(failure.error.clone())),
        };
        self.observer.record_generation(GenerationEvent {
            trace_id: trace.trace_id.clone(),
            session_id: trace.session_id.clone(),
            parent_span_id: trace.parent_span_id.clone(),
            name: GENERATION_NAME.to_string(),
            provider: provider.name().to_string(),
            model: provider.model().to_string(),
            prompt_name: prompt.name.clone(),
            prompt_version: prompt.version.clone(),
            input: json!({
                "instruction": prompt.instruction,
                "image_count": image_count,
                "vendor_type": vendor.as_str(),
            }),
            output,
            usage,
            start_time,
            end_time,
            error,
            metadata: BTreeMap::from([("attempt".to_string(), json!(attempt + 1))]),
        });
    }

    fn success(
        &self,
        provider: &dyn LlmProvider,
        invoice: Invoice,
        latency_ms: u64,
        prompt: &PromptTemplate,
    ) -> ExtractionResult {
        let confidence = confidence(&invoice);
        info!(
            provider = provider.name(),
            invoice_id = %invoice.invoice_id,
            confidence,
            latency_ms,
            "Invoice extracted"
        );
        ExtractionResult {
            outcome: ExtractionOutcome::Extracted(invoice),
            provider: provider.name().to_string(),
            model: provider.model().to_string(),
            latency_ms,
            confidence,
            prompt_name: prompt.name.clone(),
            prompt_version: prompt.version.clone(),
        }
    }

    fn failure(
        &self,
        provider: &dyn LlmProvider,
        error: String,
        latency_ms: u64,
        prompt: &PromptTemplate,
    ) -> ExtractionResult {
        ExtractionResult {
            outcome: ExtractionOutcome::Failed { error },
            provider: provider.name().to_string(),
            model: provider.model().to_string(),
            latency_ms,
            confidence: 0.0,
            prompt_name: prompt.name.clone(),
            prompt_version: prompt.version.clone(),
        }
    }
}

/// Parse model output into a validated [`Invoice`].
pub fn parse_invoice(text: &str) -> Result<Invoice, String> {
    let json = strip_code_fences(text);
    let invoice: Invoice =
        serde_json::from_str(json).map_err(|e| format!("Failed to parse invoice JSON: {e}"))?;
    invoice
        .validate()
        .map_err(|e| format!("Invoice failed validation: {e}"))?;
    Ok(invoice)
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Heuristic confidence from completeness and arithmetic consistency.
pub fn confidence(invoice: &Invoice) -> f64 {
    let raw = 0.5 * field_completeness(invoice)
        + 0.25 * totals_consistency(invoice)
        + 0.25 * line_item_arithmetic(invoice);
    (raw.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn parse_invoice_reports_shape_and_validation_errors() {
        assert!(parse_invoice("not json")
            .unwrap_err()
            .starts_with("Failed to parse invoice JSON"));
        assert!(parse_invoice("{\"invoice_id\": \"\"}")
            .unwrap_err()
            .starts_with("Invoice failed validation"));
        let invoice = parse_invoice("```json\n{\"invoice_id\": \"INV-9\", \"total\": 12.5}\n```").unwrap();
        assert_eq!(invoice.total, Some(12.5));
    }

    #[test]
    fn confidence_of_bare_invoice() {
        let invoice = parse_invoice("{\"invoice_id\": \"INV-9\"}").unwrap();
        // 0.5 * 1/7 + 0.25 * 0.5 + 0.25 * 1.0
        assert!((confidence(&invoice) - 0.446).abs() < 1e-9);
    }
}
