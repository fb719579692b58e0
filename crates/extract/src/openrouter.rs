use std::time::Instant;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use observe::TokenUsage;
use serde_json::{json, Value};
use tracing::debug;

use crate::provider::is_retryable_status;
use crate::{GenerationOutput, GenerationRequest, LlmProvider, ProviderFailure, ProviderOutcome};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenRouter's OpenAI-compatible chat completions API.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenRouterProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: OPENROUTER_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

pub(crate) fn build_request_body(model: &str, request: &GenerationRequest) -> Value {
    let mut content = vec![json!({ "type": "text", "text": request.instruction })];
    content.extend(request.images.iter().map(|image| {
        json!({
            "type": "image_url",
            "image_url": {
                "url": format!("data:{};base64,{}", request.mime_type, STANDARD.encode(image)),
            }
        })
    }));

    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": request.system },
            { "role": "user", "content": content },
        ],
        "response_format": { "type": "json_object" },
        "temperature": 0.0,
    })
}

pub(crate) fn parse_response(value: &Value) -> Result<(String, Option<TokenUsage>), String> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(format!("provider error: {message}"));
    }

    let text = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| "response has no message content".to_string())?;

    let usage = value.get("usage").map(|u| TokenUsage {
        input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
    });
    Ok((text.to_string(), usage))
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> ProviderOutcome {
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&build_request_body(&self.model, request))
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
                debug!(model = %self.model, latency_ms = elapsed(), "openrouter generation complete");
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

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn images_are_sent_as_data_urls() {
        let request = GenerationRequest::png("sys", "extract", vec![Bytes::from_static(b"a")]);
        let body = build_request_body("google/gemini-2.5-flash", &request);
        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content[0]["text"], "extract");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,YQ==");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["content"], "sys");
    }

    #[test]
    fn parses_choice_and_usage() {
        let value = json!({
            "choices": [{"message": {"content": "{\"invoice_id\":\"7\"}"}}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 40}
        });
        let (text, usage) = parse_response(&value).unwrap();
        assert_eq!(text, "{\"invoice_id\":\"7\"}");
        assert_eq!(usage.unwrap().input_tokens, 900);
    }

    #[test]
    fn inline_error_objects_fail() {
        let value = json!({"error": {"message": "model overloaded"}});
        assert_eq!(
            parse_response(&value).unwrap_err(),
            "provider error: model overloaded"
        );
        assert!(parse_response(&json!({"choices": []})).is_err());
    }
}
