use crate::config::ServerConfig;
use crate::error::ServerResult;
use cloud::{GcsObjectStore, ObjectStore, PubSubPublisher, Publisher, TokenSource};
use extract::{GeminiProvider, InvoiceExtractor, LlmProvider, OpenRouterProvider};
use invoice_pipeline::{ClassifyStage, ExtractStage, PipelineConfig};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    pub classify: Arc<ClassifyStage>,

    pub extract: Arc<ExtractStage>,

    pub started_at: Instant,
}

impl ServerState {
    pub fn new(config: ServerConfig, classify: ClassifyStage, extract: ExtractStage) -> Self {
        Self {
            config: Arc::new(config),
            classify: Arc::new(classify),
            extract: Arc::new(extract),
            started_at: Instant::now(),
        }
    }

    /// Wire both stages to Cloud Storage, Pub/Sub, Vertex AI and, when
    /// configured, OpenRouter and Langfuse.
    ///
    /// Credentials come from the metadata server of the runtime environment.
    pub fn from_pipeline(config: ServerConfig, pipeline: &PipelineConfig) -> ServerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(pipeline.request_timeout())
            .build()?;
        let tokens = TokenSource::metadata(client.clone());

        let store: Arc<dyn ObjectStore> =
            Arc::new(GcsObjectStore::new(client.clone(), tokens.clone()));
        let publisher: Arc<dyn Publisher> = Arc::new(PubSubPublisher::new(
            client.clone(),
            tokens.clone(),
            pipeline.project_id.clone(),
        ));
        let observer = observe::create_observer(&pipeline.langfuse, client.clone());

        let primary = Arc::new(GeminiProvider::new(
            client.clone(),
            tokens,
            &pipeline.project_id,
            &pipeline.region,
            pipeline.gemini_model.clone(),
        ));
        let fallback = pipeline.openrouter_key().map(|key| {
            Arc::new(OpenRouterProvider::new(
                client.clone(),
                key,
                pipeline.openrouter_model.clone(),
            )) as Arc<dyn LlmProvider>
        });
        if fallback.is_none() {
            tracing::warn!("No OpenRouter API key configured; extraction runs without fallback");
        }

        let extractor = InvoiceExtractor::new(primary, observer.clone())
            .with_fallback(fallback)
            .with_prompts(pipeline.prompt_registry())
            .with_retry(pipeline.retry);

        let classify = ClassifyStage::new(pipeline, store.clone(), publisher.clone())?;
        let extract = ExtractStage::new(pipeline, store, publisher, extractor, observer);

        Ok(Self::new(config, classify, extract))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
