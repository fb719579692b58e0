use async_trait::async_trait;
use bytes::Bytes;
use observe::TokenUsage;

/// Everything a provider needs to run one extraction prompt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub instruction: String,
    pub images: Vec<Bytes>,
    pub mime_type: String,
}

impl GenerationRequest {
    pub fn png(system: &str, instruction: &str, images: Vec<Bytes>) -> Self {
        Self {
            system: system.to_string(),
            instruction: instruction.to_string(),
            images,
            mime_type: "image/png".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    /// Raw model text, expected to hold JSON.
    pub text: String,
    pub usage: Option<TokenUsage>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub error: String,
    /// Whether repeating the same request may succeed.
    pub retryable: bool,
    pub latency_ms: u64,
}

impl ProviderFailure {
    pub fn new(error: impl Into<String>, retryable: bool, latency_ms: u64) -> Self {
        Self {
            error: error.into(),
            retryable,
            latency_ms,
        }
    }
}

/// Result of one provider call. Ordinary provider failure is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Generated(GenerationOutput),
    Failed(ProviderFailure),
}

impl ProviderOutcome {
    pub fn latency_ms(&self) -> u64 {
        match self {
            ProviderOutcome::Generated(out) => out.latency_ms,
            ProviderOutcome::Failed(failure) => failure.latency_ms,
        }
    }
}

/// A vision-capable LLM backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider id, e.g. `gemini`.
    fn name(&self) -> &str;

    /// Model id sent to the backend.
    fn model(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> ProviderOutcome;
}

/// HTTP statuses worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }
}
