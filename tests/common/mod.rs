#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use classify::VendorRule;
use cloud::{
    InMemoryObjectStore, InMemoryPublisher, ObjectLocation, ObjectStore, PublishError, Publisher,
    StorageError,
};
use extract::{
    GenerationOutput, GenerationRequest, LlmProvider, ProviderFailure, ProviderOutcome,
};
use image::{ImageFormat, Luma};
use invoice_pipeline::PipelineConfig;
use messages::VendorType;
use serde_json::Value;

pub const CLASSIFIED_TOPIC: &str = "invoice-classified";
pub const EXTRACTED_TOPIC: &str = "invoice-extracted";

pub const INVOICE_JSON: &str = r#"{
    "invoice_id": "INV-2024-001",
    "invoice_date": "2024-03-01",
    "due_date": "2024-03-31",
    "vendor_name": "ACME Corp",
    "currency": "EUR",
    "subtotal": 100.0,
    "tax": 20.0,
    "total": 120.0,
    "line_items": [
        {"description": "Widget", "quantity": 2, "unit_price": 25.0, "amount": 50.0},
        {"description": "Gadget", "quantity": 1, "unit_price": 50.0, "amount": 50.0}
    ]
}"#;

pub fn config() -> PipelineConfig {
    let mut config = PipelineConfig {
        project_id: "test-project".into(),
        archive_bucket: "archive".into(),
        failed_bucket: "failed".into(),
        classified_topic: CLASSIFIED_TOPIC.into(),
        extracted_topic: EXTRACTED_TOPIC.into(),
        ..PipelineConfig::default()
    };
    config.classifier.vendor_rules.push(VendorRule {
        vendor: VendorType::new("ACME").unwrap(),
        patterns: vec!["ACME-*".into()],
    });
    config
}

/// 640x640 checkerboard: bright enough, high contrast and sharp edges.
pub fn good_page() -> Bytes {
    let img = image::ImageBuffer::from_fn(640, 640, |x, y| {
        if ((x / 8) + (y / 8)) % 2 == 0 {
            Luma([30u8])
        } else {
            Luma([220u8])
        }
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    Bytes::from(buf.into_inner())
}

/// Small flat gray page that fails every quality check but resolution.
pub fn blurry_page() -> Bytes {
    let img = image::ImageBuffer::from_pixel(120, 120, Luma([128u8]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    Bytes::from(buf.into_inner())
}

/// Wrap a stage message the way a push subscription delivers it.
pub fn push_body(message: &Value) -> Vec<u8> {
    serde_json::to_vec(&messages::encode_push(message)).unwrap()
}

pub fn loc(uri: &str) -> ObjectLocation {
    cloud::parse_gcs_uri(uri).unwrap()
}

/// In-memory store that counts calls and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryObjectStore,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub copies: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_copies: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, uri: &str, data: Bytes) {
        self.inner.insert(loc(uri), data, "image/png").unwrap();
    }

    pub fn calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
            + self.writes.load(Ordering::SeqCst)
            + self.copies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn read(&self, location: &ObjectLocation) -> Result<Bytes, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::backend("read refused"));
        }
        self.inner.read(location).await
    }

    async fn write(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::backend("write refused"));
        }
        self.inner.write(location, data, content_type).await
    }

    async fn copy(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
    ) -> Result<ObjectLocation, StorageError> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        if self.fail_copies.load(Ordering::SeqCst) {
            return Err(StorageError::backend("copy refused"));
        }
        self.inner.copy(source, destination).await
    }
}

#[derive(Default)]
pub struct CountingPublisher {
    pub inner: InMemoryPublisher,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn published_to(&self, topic: &str) -> Vec<Value> {
        self.inner.published_to(topic)
    }
}

#[async_trait]
impl Publisher for CountingPublisher {
    async fn publish(&self, topic: &str, message: &Value) -> Result<String, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::backend("topic unavailable"));
        }
        self.inner.publish(topic, message).await
    }
}

/// Provider that always answers the same way.
pub struct StubProvider {
    pub name: &'static str,
    pub model: &'static str,
    pub outcome: ProviderOutcome,
    pub calls: AtomicUsize,
}

impl StubProvider {
    pub fn answering(name: &'static str, model: &'static str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            model,
            outcome: ProviderOutcome::Generated(GenerationOutput {
                text: text.to_string(),
                usage: None,
                latency_ms: 42,
            }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &'static str, error: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            model: "broken-model",
            outcome: ProviderOutcome::Failed(ProviderFailure::new(error, false, 7)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        self.model
    }

    async fn generate(&self, _request: &GenerationRequest) -> ProviderOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
