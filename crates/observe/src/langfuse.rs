//! Langfuse ingestion-API observer.
//!
//! Events are buffered in memory and sent as one batch to
//! `{host}/api/public/ingestion` on [`Observer::flush`]. The buffer is drained
//! before the request is made, so a failed flush drops that batch.
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{GenerationEvent, NoopObserver, ObserveError, Observer};

const DEFAULT_HOST: &str = "https://cloud.langfuse.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LangfuseConfig {
    pub enabled: bool,
    pub host: String,
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Default for LangfuseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: DEFAULT_HOST.to_string(),
            public_key: None,
            secret_key: None,
        }
    }
}

pub struct LangfuseObserver {
    client: reqwest::Client,
    endpoint: String,
    public_key: String,
    secret_key: String,
    buffer: Mutex<Vec<Value>>,
}

impl LangfuseObserver {
    pub fn new(
        client: reqwest::Client,
        host: &str,
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/public/ingestion", host.trim_end_matches('/')),
            public_key: public_key.into(),
            secret_key: secret_key.into(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Number of events waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or_default()
    }

    fn push(&self, kind: &str, body: Value) {
        let event = json!({
            "id": Uuid::new_v4().to_string(),
            "type": kind,
            "timestamp": Utc::now().to_rfc3339(),
            "body": body,
        });
        match self.buffer.lock() {
            Ok(mut buffer) => buffer.push(event),
            Err(_) => warn!(kind, "langfuse buffer lock poisoned; event dropped"),
        }
    }

    fn take_batch(&self) -> Result<Vec<Value>, ObserveError> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| ObserveError::Backend("poisoned lock".to_string()))?;
        Ok(std::mem::take(&mut *buffer))
    }
}

fn trace_body(event: &GenerationEvent) -> Value {
    json!({
        "id": event.trace_id,
        "sessionId": event.session_id,
        "name": event.name,
    })
}

fn generation_body(event: &GenerationEvent) -> Value {
    let level = if event.error.is_some() { "ERROR" } else { "DEFAULT" };
    let mut body = json!({
        "id": Uuid::new_v4().to_string(),
        "traceId": event.trace_id,
        "name": event.name,
        "model": event.model,
        "startTime": event.start_time.to_rfc3339(),
        "endTime": event.end_time.to_rfc3339(),
        "input": event.input,
        "output": event.output,
        "promptName": event.prompt_name,
        "promptVersion": event.prompt_version,
        "metadata": event.metadata,
        "level": level,
    });
    body["metadata"]["provider"] = json!(event.provider);
    body["metadata"]["parent_span_id"] = json!(event.parent_span_id);
    if let Some(error) = &event.error {
        body["statusMessage"] = json!(error);
    }
    if let Some(usage) = event.usage {
        body["usage"] = json!({
            "input": usage.input_tokens,
            "output": usage.output_tokens,
            "unit": "TOKENS",
        });
    }
    body
}

#[async_trait]
impl Observer for LangfuseObserver {
    fn is_enabled(&self) -> bool {
        true
    }

    fn record_generation(&self, event: GenerationEvent) {
        // trace-create is an upsert keyed by trace id.
        self.push("trace-create", trace_body(&event));
        self.push("generation-create", generation_body(&event));
    }

    fn score_trace(
        &self,
        trace_id: &str,
        scores: &BTreeMap<String, f64>,
        comments: &BTreeMap<String, String>,
    ) {
        for (name, value) in scores {
            let mut body = json!({
                "id": Uuid::new_v4().to_string(),
                "traceId": trace_id,
                "name": name,
                "value": value,
            });
            if let Some(comment) = comments.get(name) {
                body["comment"] = json!(comment);
            }
            self.push("score-create", body);
        }
    }

    async fn flush(&self) -> Result<(), ObserveError> {
        let batch = self.take_batch()?;
        if batch.is_empty() {
            return Ok(());
        }
        let count = batch.len();

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .json(&json!({ "batch": batch }))
            .send()
            .await
            .map_err(|e| ObserveError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ObserveError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // 207 responses list per-event rejections.
        if let Ok(parsed) = response.json::<Value>().await {
            if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
                if !errors.is_empty() {
                    warn!(rejected = errors.len(), sent = count, "langfuse rejected events");
                }
            }
        }
        debug!(events = count, "flushed langfuse batch");
        Ok(())
    }
}

/// Pick the observer implementation for `config`.
///
/// An enabled config missing either key falls back to [`NoopObserver`].
pub fn create_observer(config: &LangfuseConfig, client: reqwest::Client) -> Arc<dyn Observer> {
    if !config.enabled {
        return Arc::new(NoopObserver);
    }
    match (&config.public_key, &config.secret_key) {
        (Some(public), Some(secret)) if !public.is_empty() && !secret.is_empty() => Arc::new(
            LangfuseObserver::new(client, &config.host, public.clone(), secret.clone()),
        ),
        _ => {
            warn!("langfuse enabled but keys are missing; observability disabled");
            Arc::new(NoopObserver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenUsage;

    fn event(error: Option<&str>) -> GenerationEvent {
        let now = Utc::now();
        GenerationEvent {
            trace_id: "trace-1".into(),
            session_id: "session-1".into(),
            parent_span_id: "span-1".into(),
            name: "invoice-extraction".into(),
            provider: "gemini".into(),
            model: "gemini-2.5-flash".into(),
            prompt_name: "invoice-extraction-generic".into(),
            prompt_version: "1".into(),
            input: json!({"images": 1}),
            output: None,
            usage: Some(TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            }),
            start_time: now,
            end_time: now,
            error: error.map(str::to_string),
            metadata: BTreeMap::new(),
        }
    }

    fn observer() -> LangfuseObserver {
        LangfuseObserver::new(reqwest::Client::new(), "http://127.0.0.1:9/", "pk", "sk")
    }

    #[test]
    fn generation_body_marks_failures() {
        let body = generation_body(&event(Some("HTTP 500")));
        assert_eq!(body["level"], "ERROR");
        assert_eq!(body["statusMessage"], "HTTP 500");
        assert_eq!(body["usage"]["input"], 10);
        assert_eq!(body["metadata"]["provider"], "gemini");

        let ok = generation_body(&event(None));
        assert_eq!(ok["level"], "DEFAULT");
        assert!(ok.get("statusMessage").is_none());
    }

    #[test]
    fn buffers_one_score_event_per_score() {
        let obs = observer();
        let scores = BTreeMap::from([
            ("field_completeness".to_string(), 1.0),
            ("totals_consistency".to_string(), 0.5),
        ]);
        let comments = BTreeMap::from([("field_completeness".to_string(), "7/7".to_string())]);
        obs.score_trace("trace-1", &scores, &comments);
        obs.record_generation(event(None));
        assert_eq!(obs.pending(), 4);
    }

    #[tokio::test]
    async fn failed_flush_drains_buffer_and_reports() {
        let obs = observer();
        obs.record_generation(event(None));
        let result = obs.flush().await;
        assert!(matches!(result, Err(ObserveError::Transport(_))));
        assert_eq!(obs.pending(), 0);
    }

    #[tokio::test]
    async fn empty_flush_makes_no_request() {
        assert!(observer().flush().await.is_ok());
    }

    #[test]
    fn create_observer_needs_keys() {
        let client = reqwest::Client::new();
        let disabled = create_observer(&LangfuseConfig::default(), client.clone());
        assert!(!disabled.is_enabled());

        let no_keys = LangfuseConfig {
            enabled: true,
            ..LangfuseConfig::default()
        };
        assert!(!create_observer(&no_keys, client.clone()).is_enabled());

        let full = LangfuseConfig {
            enabled: true,
            public_key: Some("pk".into()),
            secret_key: Some("sk".into()),
            ..LangfuseConfig::default()
        };
        assert!(create_observer(&full, client).is_enabled());
    }
}
