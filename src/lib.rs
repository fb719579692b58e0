//! Event-driven invoice pipeline.
//!
//! Two stages sit behind push subscriptions:
//!
//! ```text
//! invoice-converted ──▶ ClassifyStage ──▶ invoice-classified ──▶ ExtractStage ──▶ invoice-extracted
//!                            │                                        │
//!                            ▼                                        ▼
//!                      archive bucket                           failed bucket
//! ```
//!
//! [`ClassifyStage`] checks page quality, detects the vendor, archives the
//! original and publishes a [`ClassifiedMessage`](messages::ClassifiedMessage).
//! [`ExtractStage`] runs the vision model with fallback, attaches quality
//! scores to the trace and publishes an
//! [`ExtractedMessage`](messages::ExtractedMessage), or hands the original to
//! the [`FailureRouter`] when no provider produced a valid invoice.
//!
//! Collaborators are injected as trait objects: [`cloud::ObjectStore`],
//! [`cloud::Publisher`], [`extract::LlmProvider`] and [`observe::Observer`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cloud::{InMemoryObjectStore, InMemoryPublisher};
//! use invoice_pipeline::{ClassifyStage, PipelineConfig};
//!
//! # async fn run(body: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load()?;
//! let stage = ClassifyStage::new(
//!     &config,
//!     Arc::new(InMemoryObjectStore::new()),
//!     Arc::new(InMemoryPublisher::new()),
//! )?;
//! let outcome = stage.handle(body).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod best_effort;
pub mod config;
mod error;
mod failure;
pub mod logging;
pub mod stages;

pub use best_effort::best_effort;
pub use self::config::{ConfigError, PipelineConfig};
pub use error::StageError;
pub use failure::FailureRouter;
pub use logging::init_tracing;
pub use stages::{ClassifyStage, ExtractStage, StageOutcome};
