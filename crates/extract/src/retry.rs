//! Retry with exponential backoff for provider calls.
//!
//! Only failures the provider marked retryable are repeated; anything else is
//! returned after the first attempt.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{GenerationRequest, LlmProvider, ProviderOutcome};

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call.
    pub max_retries: u32,
    /// Base delay between retries (exponentially increased).
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Maximum delay between retries.
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::default().with_max_retries(0)
    }
}

/// Call `provider` until it succeeds, fails permanently, or retries run out.
///
/// `on_attempt` sees every outcome, including the final one, with its
/// zero-based attempt number.
pub async fn generate_with_retry<F>(
    provider: &dyn LlmProvider,
    request: &GenerationRequest,
    config: &RetryConfig,
    mut on_attempt: F,
) -> ProviderOutcome
where
    F: FnMut(u32, &ProviderOutcome),
{
    let mut attempt = 0;
    loop {
        let outcome = provider.generate(request).await;
        on_attempt(attempt, &outcome);

        let retry = match &outcome {
            ProviderOutcome::Failed(failure) => failure.retryable && attempt < config.max_retries,
            ProviderOutcome::Generated(_) => false,
        };
        if !retry {
            return outcome;
        }

        let delay = calculate_delay(config, attempt);
        warn!(
            provider = provider.name(),
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "provider call failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Calculate delay for a retry attempt with exponential backoff.
fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay.as_millis() as u64;
    let exponential = base.saturating_mul(2_u64.saturating_pow(attempt));
    let delay = exponential.min(config.max_delay.as_millis() as u64);

    if config.jitter {
        // Add 0-50% random jitter
        let jitter = fastrand::u64(0..=delay / 2);
        Duration::from_millis(delay + jitter)
    } else {
        Duration::from_millis(delay)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
