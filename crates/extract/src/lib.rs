//! Invoice extraction from page images through vision-capable LLMs.
//!
//! [`InvoiceExtractor`] sends the vendor's prompt and all page images to a
//! primary [`LlmProvider`], retrying transient failures, and falls back to a
//! secondary provider when the primary cannot produce a valid [`Invoice`].
//! Provider failure is an ordinary [`ExtractionOutcome::Failed`] value.
//!
//! [`calculate_extraction_scores`] and [`score_comments`] derive the quality
//! annotations attached to the trace after a successful extraction.

mod error;
mod extractor;
mod gemini;
mod invoice;
mod openrouter;
mod prompt;
mod provider;
mod retry;
pub mod scores;

pub use error::{ExtractError, InvoiceValidationError};
pub use extractor::{
    confidence, parse_invoice, ExtractionOutcome, ExtractionResult, InvoiceExtractor,
};
pub use gemini::GeminiProvider;
pub use invoice::{Invoice, LineItem};
pub use openrouter::OpenRouterProvider;
pub use prompt::{PromptRegistry, PromptTemplate, GENERIC_PROMPT_NAME, GENERIC_PROMPT_VERSION};
pub use provider::{
    is_retryable_status, GenerationOutput, GenerationRequest, LlmProvider, ProviderFailure,
    ProviderOutcome,
};
pub use retry::{generate_with_retry, RetryConfig};
pub use scores::{calculate_extraction_scores, score_comments};
