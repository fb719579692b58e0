use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{PublishError, TokenSource};

const PUBSUB_BASE_URL: &str = "https://pubsub.googleapis.com";

/// Publishes structured messages to a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one message and return the id the bus assigned to it.
    async fn publish(&self, topic: &str, message: &Value) -> Result<String, PublishError>;
}

/// Pub/Sub REST `topics.publish`.
pub struct PubSubPublisher {
    client: reqwest::Client,
    tokens: TokenSource,
    project_id: String,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

impl PubSubPublisher {
    pub fn new(client: reqwest::Client, tokens: TokenSource, project_id: impl Into<String>) -> Self {
        Self {
            client,
            tokens,
            project_id: project_id.into(),
            base_url: PUBSUB_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Accepts either a short topic id or a full `projects/<p>/topics/<t>` path.
    pub fn topic_path(&self, topic: &str) -> String {
        if topic.starts_with("projects/") {
            topic.to_string()
        } else {
            format!("projects/{}/topics/{}", self.project_id, topic)
        }
    }
}

#[async_trait]
impl Publisher for PubSubPublisher {
    async fn publish(&self, topic: &str, message: &Value) -> Result<String, PublishError> {
        let topic_path = self.topic_path(topic);
        let url = format!("{}/v1/{}:publish", self.base_url, topic_path);
        let body = json!({
            "messages": [{ "data": STANDARD.encode(message.to_string()) }]
        });
        let token = self.tokens.token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                topic: topic_path,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        let message_id = parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or(PublishError::MissingMessageId)?;
        debug!(topic = %topic_path, message_id = %message_id, "published message");
        Ok(message_id)
    }
}
