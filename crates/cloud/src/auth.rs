//! OAuth access tokens for Google APIs.
//!
//! On Cloud Run the metadata server hands out short-lived tokens for the
//! service account; locally a static token (e.g. from
//! `gcloud auth print-access-token`) can be supplied instead.
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::AuthError;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server-reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub enum TokenSource {
    /// A fixed bearer token.
    Static(String),
    /// Tokens fetched from the GCE/Cloud Run metadata server and cached.
    Metadata(Arc<MetadataTokenSource>),
}

impl TokenSource {
    pub fn static_token(token: impl Into<String>) -> Self {
        TokenSource::Static(token.into())
    }

    pub fn metadata(client: reqwest::Client) -> Self {
        TokenSource::Metadata(Arc::new(MetadataTokenSource::new(client)))
    }

    pub async fn token(&self) -> Result<String, AuthError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Metadata(source) => source.token().await,
        }
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("TokenSource::Static(..)"),
            TokenSource::Metadata(_) => f.write_str("TokenSource::Metadata"),
        }
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub struct MetadataTokenSource {
    client: reqwest::Client,
    endpoint: String,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

impl MetadataTokenSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, METADATA_TOKEN_URL)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .get(&self.endpoint)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        if parsed.access_token.is_empty() {
            return Err(AuthError::Malformed("empty access_token".to_string()));
        }

        let lifetime = Duration::from_secs(parsed.expires_in).saturating_sub(REFRESH_MARGIN);
        debug!(expires_in = parsed.expires_in, "refreshed metadata access token");
        *cached = Some(CachedToken {
            value: parsed.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(parsed.access_token)
    }
}
