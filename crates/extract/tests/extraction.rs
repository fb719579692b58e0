use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use extract::{
    ExtractError, GenerationOutput, GenerationRequest, InvoiceExtractor, LlmProvider,
    ProviderFailure, ProviderOutcome, RetryConfig,
};
use messages::{TraceContext, VendorType};
use observe::{NoopObserver, RecordingObserver};

/// Replays a fixed script of outcomes, then keeps failing.
struct ScriptedProvider {
    name: &'static str,
    script: Mutex<VecDeque<ProviderOutcome>>,
    calls: Mutex<u32>,
}

impl ScriptedProvider {
    fn new(name: &'static str, script: Vec<ProviderOutcome>) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        "test-model"
    }

    async fn generate(&self, _request: &GenerationRequest) -> ProviderOutcome {
        *self.calls.lock().unwrap() += 1;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ProviderOutcome::Failed(ProviderFailure::new("script exhausted", false, 1)))
    }
}

fn ok(text: &str) -> ProviderOutcome {
    ProviderOutcome::Generated(GenerationOutput {
        text: text.to_string(),
        usage: None,
        latency_ms: 5,
    })
}

fn fail(error: &str, retryable: bool) -> ProviderOutcome {
    ProviderOutcome::Failed(ProviderFailure::new(error, retryable, 3))
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig::default()
        .with_max_retries(max_retries)
        .with_base_delay(Duration::from_millis(1))
        .with_jitter(false)
}

fn pages() -> Vec<Bytes> {
    vec![Bytes::from_static(b"page-1"), Bytes::from_static(b"page-2")]
}

fn trace() -> TraceContext {
    TraceContext::from_fields("gs://in/a.tif", Some("trace-1"), None, None)
}

const INVOICE: &str = r#"{"invoice_id": "INV-7", "vendor_name": "ACME", "total": 120.0,
    "subtotal": 100.0, "tax": 20.0}"#;

#[tokio::test]
async fn primary_success_skips_fallback() {
    let primary = ScriptedProvider::new("gemini", vec![ok(INVOICE)]);
    let fallback = ScriptedProvider::new("openrouter", vec![ok(INVOICE)]);
    let extractor = InvoiceExtractor::new(primary.clone(), Arc::new(NoopObserver))
        .with_fallback(Some(fallback.clone() as Arc<dyn LlmProvider>))
        .with_retry(fast_retry(0));

    let result = extractor
        .extract(&pages(), &VendorType::generic(), &trace())
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.provider, "gemini");
    assert_eq!(result.invoice().unwrap().invoice_id, "INV-7");
    assert_eq!(result.prompt_name, "invoice-extraction-generic");
    assert!(result.confidence > 0.0 && result.confidence <= 1.0);
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn unparsable_primary_output_falls_back() {
    let primary = ScriptedProvider::new("gemini", vec![ok("I cannot read this")]);
    let fallback = ScriptedProvider::new("openrouter", vec![ok(INVOICE)]);
    let extractor = InvoiceExtractor::new(primary, Arc::new(NoopObserver))
        .with_fallback(Some(fallback as Arc<dyn LlmProvider>))
        .with_retry(fast_retry(0));

    let result = extractor
        .extract(&pages(), &VendorType::generic(), &trace())
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.provider, "openrouter");
    assert_eq!(result.model, "test-model");
}

#[tokio::test]
async fn both_failing_is_a_value_not_an_error() {
    let primary = ScriptedProvider::new("gemini", vec![fail("HTTP error 500: boom", false)]);
    let fallback = ScriptedProvider::new("openrouter", vec![fail("HTTP error 401: nope", false)]);
    let extractor = InvoiceExtractor::new(primary, Arc::new(NoopObserver))
        .with_fallback(Some(fallback as Arc<dyn LlmProvider>))
        .with_retry(fast_retry(0));

    let result = extractor
        .extract(&pages(), &VendorType::generic(), &trace())
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(
        result.error().unwrap(),
        "primary (gemini) failed: HTTP error 500: boom; fallback (openrouter) failed: HTTP error 401: nope"
    );
    assert_eq!(result.confidence, 0.0);
}

#[tokio::test]
async fn missing_fallback_reports_primary_error() {
    let primary = ScriptedProvider::new("gemini", vec![fail("timeout", false)]);
    let extractor =
        InvoiceExtractor::new(primary, Arc::new(NoopObserver)).with_retry(fast_retry(0));

    let result = extractor
        .extract(&pages(), &VendorType::generic(), &trace())
        .await
        .unwrap();

    assert_eq!(result.error(), Some("primary (gemini) failed: timeout"));
}

#[tokio::test]
async fn retryable_failures_are_retried() {
    let primary = ScriptedProvider::new(
        "gemini",
        vec![fail("HTTP error 503", true), fail("HTTP error 429", true), ok(INVOICE)],
    );
    let extractor =
        InvoiceExtractor::new(primary.clone(), Arc::new(NoopObserver)).with_retry(fast_retry(2));

    let result = extractor
        .extract(&pages(), &VendorType::generic(), &trace())
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(primary.calls(), 3);
}

#[tokio::test]
async fn permanent_failures_are_not_retried() {
    let primary = ScriptedProvider::new("gemini", vec![fail("HTTP error 400", false), ok(INVOICE)]);
    let extractor =
        InvoiceExtractor::new(primary.clone(), Arc::new(NoopObserver)).with_retry(fast_retry(3));

    let result = extractor
        .extract(&pages(), &VendorType::generic(), &trace())
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(primary.calls(), 1);
}

#[tokio::test]
async fn every_attempt_is_reported_under_the_trace() {
    let observer = Arc::new(RecordingObserver::new());
    let primary = ScriptedProvider::new("gemini", vec![fail("HTTP error 503", true), ok(INVOICE)]);
    let extractor = InvoiceExtractor::new(primary, observer.clone()).with_retry(fast_retry(1));

    extractor
        .extract(&pages(), &VendorType::generic(), &trace())
        .await
        .unwrap();

    let generations = observer.generations();
    assert_eq!(generations.len(), 2);
    assert!(generations.iter().all(|g| g.trace_id == "trace-1"));
    assert_eq!(generations[0].error.as_deref(), Some("HTTP error 503"));
    assert!(generations[1].error.is_none());
    assert_eq!(generations[1].input["image_count"], 2);
}

#[tokio::test]
async fn empty_input_is_fatal() {
    let primary = ScriptedProvider::new("gemini", vec![]);
    let extractor = InvoiceExtractor::new(primary.clone(), Arc::new(NoopObserver));

    let err = extractor
        .extract(&[], &VendorType::generic(), &trace())
        .await
        .unwrap_err();
    assert_eq!(err, ExtractError::NoImages);
    assert_eq!(primary.calls(), 0);
}

#[tokio::test]
async fn empty_page_fails_without_calling_providers() {
    let primary = ScriptedProvider::new("gemini", vec![ok(INVOICE)]);
    let fallback = ScriptedProvider::new("openrouter", vec![ok(INVOICE)]);
    let extractor = InvoiceExtractor::new(primary.clone(), Arc::new(NoopObserver))
        .with_fallback(Some(fallback.clone() as Arc<dyn LlmProvider>));

    let result = extractor
        .extract(
            &[Bytes::from_static(b"page one"), Bytes::new()],
            &VendorType::generic(),
            &trace(),
        )
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.error(), Some("page 2 is empty"));
    assert_eq!(result.provider, "gemini");
    assert_eq!(primary.calls(), 0);
    assert_eq!(fallback.calls(), 0);
}
