use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ObserveError;

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One LLM generation attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationEvent {
    pub trace_id: String,
    pub session_id: String,
    pub parent_span_id: String,
    /// Logical name, e.g. `invoice-extraction`.
    pub name: String,
    pub provider: String,
    pub model: String,
    pub prompt_name: String,
    pub prompt_version: String,
    pub input: Value,
    pub output: Option<Value>,
    pub usage: Option<TokenUsage>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Set when the attempt failed.
    pub error: Option<String>,
    pub metadata: BTreeMap<String, Value>,
}

/// Sink for LLM traces and trace scores.
///
/// Recording is synchronous and only buffers; delivery happens in
/// [`Observer::flush`]. Every method is a no-op on a disabled observer.
#[async_trait]
pub trait Observer: Send + Sync {
    fn is_enabled(&self) -> bool;

    fn record_generation(&self, event: GenerationEvent);

    fn score_trace(
        &self,
        trace_id: &str,
        scores: &BTreeMap<String, f64>,
        comments: &BTreeMap<String, String>,
    );

    async fn flush(&self) -> Result<(), ObserveError>;
}

/// Observer used when observability is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl Observer for NoopObserver {
    fn is_enabled(&self) -> bool {
        false
    }

    fn record_generation(&self, _event: GenerationEvent) {}

    fn score_trace(
        &self,
        _trace_id: &str,
        _scores: &BTreeMap<String, f64>,
        _comments: &BTreeMap<String, String>,
    ) {
    }

    async fn flush(&self) -> Result<(), ObserveError> {
        Ok(())
    }
}

/// A score annotation captured by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedScores {
    pub trace_id: String,
    pub scores: BTreeMap<String, f64>,
    pub comments: BTreeMap<String, String>,
}

/// Enabled observer that keeps everything in memory. Handy in tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    generations: Mutex<Vec<GenerationEvent>>,
    scores: Mutex<Vec<RecordedScores>>,
    flushes: Mutex<usize>,
    fail_flush: bool,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `flush` call fails, after being counted.
    pub fn failing_flush() -> Self {
        Self {
            fail_flush: true,
            ..Self::default()
        }
    }

    pub fn generations(&self) -> Vec<GenerationEvent> {
        self.generations.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn scores(&self) -> Vec<RecordedScores> {
        self.scores.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.lock().map(|f| *f).unwrap_or_default()
    }
}

#[async_trait]
impl Observer for RecordingObserver {
    fn is_enabled(&self) -> bool {
        true
    }

    fn record_generation(&self, event: GenerationEvent) {
        if let Ok(mut generations) = self.generations.lock() {
            generations.push(event);
        }
    }

    fn score_trace(
        &self,
        trace_id: &str,
        scores: &BTreeMap<String, f64>,
        comments: &BTreeMap<String, String>,
    ) {
        if let Ok(mut recorded) = self.scores.lock() {
            recorded.push(RecordedScores {
                trace_id: trace_id.to_string(),
                scores: scores.clone(),
                comments: comments.clone(),
            });
        }
    }

    async fn flush(&self) -> Result<(), ObserveError> {
        if let Ok(mut flushes) = self.flushes.lock() {
            *flushes += 1;
        }
        if self.fail_flush {
            return Err(ObserveError::Backend("flush rejected".to_string()));
        }
        Ok(())
    }
}
