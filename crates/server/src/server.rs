//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration with the push and probe endpoints
//! - Middleware stack (request id, logging, timeout, body limit)
//! - Graceful shutdown handling

use crate::config::ServerConfig;
use crate::middleware::{log_requests, request_id};
use crate::routes::{api_info, not_found};
use crate::routes::{health, push};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use invoice_pipeline::PipelineConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Middleware stack (applied in reverse order):
/// 1. Request ID tracking
/// 2. Request logging
/// 3. Timeout handling
/// 4. Body size limit (push endpoints only)
pub fn build_router(state: Arc<ServerState>) -> Router {
    let probe_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check));

    let push_routes = Router::new()
        .route("/v1/classify", post(push::classify))
        .route("/v1/extract", post(push::extract))
        .layer(DefaultBodyLimit::max(state.config.max_body_size()));

    Router::new()
        .merge(probe_routes)
        .merge(push_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the pipeline HTTP server
///
/// Initializes tracing, wires both stages to their cloud adapters and serves
/// until SIGTERM or Ctrl+C.
///
/// # Example
///
/// ```rust,no_run
/// use invoice_pipeline::PipelineConfig;
/// use server::ServerConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ServerConfig::load()?;
///     let pipeline = PipelineConfig::load()?;
///     server::start_server(config, pipeline).await?;
///     Ok(())
/// }
/// ```
pub async fn start_server(config: ServerConfig, pipeline: PipelineConfig) -> anyhow::Result<()> {
    invoice_pipeline::init_tracing(&config.log_level, config.json_logs);

    let state = Arc::new(ServerState::from_pipeline(config.clone(), &pipeline)?);
    let app = build_router(state);

    let addr: SocketAddr = config.socket_addr()?;

    tracing::info!(
        addr = %addr,
        project_id = %pipeline.project_id,
        classified_topic = %pipeline.classified_topic,
        extracted_topic = %pipeline.extracted_topic,
        fallback = pipeline.openrouter_key().is_some(),
        langfuse = pipeline.langfuse.enabled,
        "Starting invoice pipeline server"
    );
    tracing::info!(
        "Timeout: {}s, Max body: {}MB",
        config.timeout_secs,
        config.max_body_size_mb
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
