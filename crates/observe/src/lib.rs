//! Timing and observability for the invoice pipeline.
//!
//! - [`Timing`] / [`TimerGuard`]: scoped elapsed-time measurement
//! - [`Observer`]: buffered sink for LLM generations and trace scores, with
//!   [`NoopObserver`], [`RecordingObserver`] and [`LangfuseObserver`]

mod error;
mod langfuse;
mod observer;
mod timing;

pub use error::ObserveError;
pub use langfuse::{create_observer, LangfuseConfig, LangfuseObserver};
pub use observer::{
    GenerationEvent, NoopObserver, Observer, RecordedScores, RecordingObserver, TokenUsage,
};
pub use timing::{TimerGuard, Timing, LATENCY_KEY};
