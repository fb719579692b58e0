//! Invoice pipeline server - push-subscription host for the pipeline stages
//!
//! Each stage is exposed as an endpoint that a Pub/Sub push subscription (or
//! an Eventarc CloudEvent trigger) posts to:
//!
//! - `POST /v1/classify` - converted pages → classified invoice
//! - `POST /v1/extract` - classified invoice → extracted data
//! - `GET /`, `GET /health`, `GET /ready` - service info and probes
//!
//! # Status codes
//!
//! | Outcome | Status |
//! |---------|--------|
//! | next message published | `204` |
//! | extraction failed, original moved to the failed bucket | `204` |
//! | malformed message | `400` |
//! | storage, bus or other fault | `500`, so the message is redelivered |
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use invoice_pipeline::PipelineConfig;
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     let pipeline = PipelineConfig::load()?;
//!     server::start_server(config, pipeline).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use self::config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
