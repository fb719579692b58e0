use std::time::Instant;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cloud::TokenSource;
use observe::TokenUsage;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::is_retryable_status;
use crate::{GenerationOutput, GenerationRequest, LlmProvider, ProviderFailure, ProviderOutcome};

/// Gemini on Vertex AI (`generateContent`).
pub struct GeminiProvider {
    client: reqwest::Client,
    tokens: TokenSource,
    endpoint: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(
        client: reqwest::Client,
        tokens: TokenSource,
        project_id: &str,
        region: &str,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let host = if region == "global" {
            "https://aiplatform.googleapis.com".to_string()
        } else {
            format!("https://{region}-aiplatform.googleapis.com")
        };
        let endpoint = format!(
            "{host}/v1/projects/{project_id}/locations/{region}/publishers/google/models/{model}:generateContent"
        );
        Self {
            client,
            tokens,
            endpoint,
            model,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

pub(crate) fn build_request_body(request: &GenerationRequest) -> Value {
    let mut parts: Vec<Value> = request
        .images
        .iter()
        .map(|image| {
            json!({
                "inlineData": {
                    "mimeType": request.mime_type,
                    "data": STANDARD.encode(image),
                }
            })
        })
        .collect();
    parts.push(json!({ "text": request.instruction }));

    json!({
        "systemInstruction": { "parts": [{ "text": request.system }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "temperature": 0.0,
        },
    })
}

pub(crate) fn parse_response(value: &Value) -> Result<(String, Option<TokenUsage>), String> {
    let candidate = value
        .get("candidates")
        .and_then(|c| c.get(0))
        .ok_or_else(|| "response has no candidates".to_string())?;

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");
        return Err(format!("empty response (finishReason: {reason})"));
    }

    let usage = value.get("usageMetadata").map(|u| TokenUsage {
        input_tokens: u["promptTokenCount"].as_u64().unwrap_or(0),
        output_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0),
    });
    Ok((text, usage))
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderOutcome {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;

        let token = match self.tokens.token().await {
            Ok(token) => token,
            Err(e) => return ProviderOutcome::Failed(ProviderFailure::new(e.to_string(), true, elapsed())),
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&build_request_body(request))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return ProviderOutcome::Failed(ProviderFailure::new(
                    format!("HTTP request failed: {e}"),
                    true,
                    elapsed(),
                ))
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return ProviderOutcome::Failed(ProviderFailure::new(
                format!("HTTP error {status}: {body}"),
                is_retryable_status(status.as_u16()),
                elapsed(),
            ));
        }

        let value: Value = match response.json().await {
            Ok(value) => value,
            Err(e) => {
                return ProviderOutcome::Failed(ProviderFailure::new(
                    format!("Invalid JSON response: {e}"),
                    true,
                    elapsed(),
                ))
            }
        };

        match parse_response(&value) {
            Ok((text, usage)) => {
                debug!(model = %self.model, latency_ms = elapsed(), "gemini generation complete");
                ProviderOutcome::Generated(GenerationOutput {
                    text,
                    usage,
                    latency_ms: elapsed(),
                })
            }
            Err(error) => ProviderOutcome::Failed(ProviderFailure::new(error, false, elapsed())),
        }
    }
}
