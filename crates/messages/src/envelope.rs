//! Push-delivery envelopes.
//!
//! Two body shapes reach a stage endpoint:
//!
//! - a Pub/Sub push envelope `{"message": {"data": "<base64>", ...}, "subscription": "..."}`
//! - a structured-mode CloudEvent whose `data` wraps the same `message` object
//!
//! Both carry the stage message as base64 of its JSON encoding.
use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::{MessageError, StageMessage};

/// The `message` object inside a push envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct PushMessage {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, rename = "messageId", alias = "message_id")]
    pub message_id: Option<String>,
    #[serde(default, rename = "publishTime", alias = "publish_time")]
    pub publish_time: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Body {
    Push {
        message: PushMessage,
    },
    CloudEvent {
        data: CloudEventData,
    },
}

#[derive(Debug, Deserialize)]
struct CloudEventData {
    message: PushMessage,
}

/// Extract the [`PushMessage`] from a raw push body.
pub fn parse_push(body: &[u8]) -> Result<PushMessage, MessageError> {
    let parsed: Body =
        serde_json::from_slice(body).map_err(|err| MessageError::Envelope(err.to_string()))?;
    Ok(match parsed {
        Body::Push { message } => message,
        Body::CloudEvent { data } => data.message,
    })
}

/// Return the base64-decoded payload bytes of a push body.
pub fn decode_push(body: &[u8]) -> Result<Vec<u8>, MessageError> {
    let message = parse_push(body)?;
    let data = message
        .data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| MessageError::Envelope("message has no data".to_string()))?;
    Ok(STANDARD.decode(data.trim())?)
}

/// Decode and validate a stage message carried by a push body.
///
/// Nothing about the message is trusted until this returns `Ok`.
pub fn decode_message<T>(body: &[u8]) -> Result<T, MessageError>
where
    T: DeserializeOwned + StageMessage,
{
    let payload = decode_push(body)?;
    let message: T = serde_json::from_slice(&payload)?;
    message.validate()?;
    Ok(message)
}

/// Build a push envelope for `payload`. Used by local tooling and tests.
pub fn encode_push(payload: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "message": {
            "data": STANDARD.encode(payload.to_string()),
            "messageId": "local",
        },
        "subscription": "local",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConvertedMessage;
    use serde_json::json;

    fn converted_payload() -> serde_json::Value {
        json!({
            "source_file": "gs://in/a.tif",
            "converted_files": ["gs://proc/a.png"],
            "page_count": 1
        })
    }

    #[test]
    fn decodes_pubsub_push() {
        let body = encode_push(&converted_payload()).to_string();
        let msg: ConvertedMessage = decode_message(body.as_bytes()).unwrap();
        assert_eq!(msg.source_file, "gs://in/a.tif");
        assert_eq!(msg.page_count, 1);
    }

    #[test]
    fn decodes_structured_cloud_event() {
        let data = STANDARD.encode(converted_payload().to_string());
        let body = json!({
            "specversion": "1.0",
            "type": "google.cloud.pubsub.topic.v1.messagePublished",
            "data": { "message": { "data": data, "messageId": "9" } }
        })
        .to_string();
        let msg: ConvertedMessage = decode_message(body.as_bytes()).unwrap();
        assert_eq!(msg.converted_files.len(), 1);
    }

    #[test]
    fn rejects_non_envelope_body() {
        let err = decode_push(b"{\"hello\": 1}").unwrap_err();
        assert!(matches!(err, MessageError::Envelope(_)));
        assert!(matches!(decode_push(b"not json"), Err(MessageError::Envelope(_))));
    }

    #[test]
    fn rejects_bad_base64_and_missing_data() {
        let body = json!({"message": {"data": "!!!"}}).to_string();
        assert!(matches!(
            decode_push(body.as_bytes()),
            Err(MessageError::Base64(_))
        ));

        let body = json!({"message": {"messageId": "1"}}).to_string();
        assert!(matches!(
            decode_push(body.as_bytes()),
            Err(MessageError::Envelope(_))
        ));
    }

    #[test]
    fn validation_runs_after_decoding() {
        let mut payload = converted_payload();
        payload["page_count"] = json!(0);
        let body = encode_push(&payload).to_string();
        let err = decode_message::<ConvertedMessage>(body.as_bytes()).unwrap_err();
        assert!(matches!(err, MessageError::InvalidField { .. }));
    }
}
