use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use invoice_pipeline::{ConfigError, StageError};
use serde::{Deserialize, Serialize};

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
///
/// Push subscriptions treat every non-2xx answer as a nack and redeliver it.
/// The status only tells the caller whether the message itself was malformed
/// (4xx) or the stage hit a fault (5xx).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Stage(err) if err.is_validation() => StatusCode::BAD_REQUEST,
            ServerError::Stage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    fn error_code(&self) -> &'static str {
        match self {
            ServerError::Stage(err) if err.is_validation() => "INVALID_MESSAGE",
            ServerError::Stage(StageError::Storage(_)) => "STORAGE_ERROR",
            ServerError::Stage(StageError::Publish(_)) => "PUBLISH_ERROR",
            ServerError::Stage(_) => "STAGE_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        ServerError::Config(format!("HTTP client: {err}"))
    }
}
