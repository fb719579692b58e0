use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::{ObjectLocation, StorageError, TokenSource};

const GCS_BASE_URL: &str = "https://storage.googleapis.com";

/// Minimal object storage surface the pipeline stages rely on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download the full object.
    async fn read(&self, location: &ObjectLocation) -> Result<Bytes, StorageError>;

    /// Create or replace an object.
    async fn write(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Server-side copy; returns the location that now holds the copy.
    async fn copy(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
    ) -> Result<ObjectLocation, StorageError>;
}

/// Google Cloud Storage through the JSON API.
pub struct GcsObjectStore {
    client: reqwest::Client,
    tokens: TokenSource,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewriteResponse {
    #[serde(default)]
    done: bool,
    #[serde(default)]
    rewrite_token: Option<String>,
}

impl GcsObjectStore {
    pub fn new(client: reqwest::Client, tokens: TokenSource) -> Self {
        Self {
            client,
            tokens,
            base_url: GCS_BASE_URL.to_string(),
        }
    }

    /// Point at an emulator or proxy instead of the public endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StorageError::backend(format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::backend("base url cannot carry a path"))?
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, location: &ObjectLocation) -> Result<Url, StorageError> {
        self.url(&["storage", "v1", "b", &location.bucket, "o", &location.path])
    }

    async fn check(
        location: &ObjectLocation,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(location.uri()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Status {
            location: location.uri(),
            status: status.as_u16(),
            body,
        })
    }
}

fn transport(err: reqwest::Error) -> StorageError {
    StorageError::Transport(err.to_string())
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn read(&self, location: &ObjectLocation) -> Result<Bytes, StorageError> {
        let mut url = self.object_url(location)?;
        url.query_pairs_mut().append_pair("alt", "media");
        let token = self.tokens.token().await?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;
        let bytes = Self::check(location, response)
            .await?
            .bytes()
            .await
            .map_err(transport)?;
        debug!(location = %location, bytes = bytes.len(), "downloaded object");
        Ok(bytes)
    }

    async fn write(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut url = self.url(&["upload", "storage", "v1", "b", &location.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &location.path);
        let token = self.tokens.token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(transport)?;
        Self::check(location, response).await?;
        debug!(location = %location, "uploaded object");
        Ok(())
    }

    async fn copy(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
    ) -> Result<ObjectLocation, StorageError> {
        let base = self.url(&[
            "storage",
            "v1",
            "b",
            &source.bucket,
            "o",
            &source.path,
            "rewriteTo",
            "b",
            &destination.bucket,
            "o",
            &destination.path,
        ])?;

        // Large objects may need several rewrite calls.
        let mut rewrite_token: Option<String> = None;
        loop {
            let mut url = base.clone();
            if let Some(token) = &rewrite_token {
                url.query_pairs_mut().append_pair("rewriteToken", token);
            }
            let token = self.tokens.token().await?;
            let response = self
                .client
                .post(url)
                .bearer_auth(token)
                .header(reqwest::header::CONTENT_LENGTH, 0)
                .send()
                .await
                .map_err(transport)?;
            let parsed: RewriteResponse = Self::check(source, response)
                .await?
                .json()
                .await
                .map_err(transport)?;
            if parsed.done {
                break;
            }
            match parsed.rewrite_token {
                Some(next) => rewrite_token = Some(next),
                None => {
                    return Err(StorageError::backend(
                        "rewrite incomplete but no rewriteToken returned",
                    ))
                }
            }
        }

        debug!(source = %source, destination = %destination, "copied object");
        Ok(destination.clone())
    }
}
