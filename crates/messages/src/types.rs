//! Stage message shapes exchanged over the bus.
//!
//! ```text
//! ConvertedMessage ──classify──▶ ClassifiedMessage ──extract──▶ ExtractedMessage
//! ```
//!
//! All three structs deny unknown fields and are checked by
//! [`StageMessage::validate`] right after deserialization. They are never
//! mutated once built; a stage constructs the next message from scratch.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{MessageError, TraceContext, VendorType};

/// Behaviour shared by every message a stage can receive.
pub trait StageMessage {
    /// Check invariants that serde alone cannot express.
    fn validate(&self) -> Result<(), MessageError>;

    /// The original document URI this message is about.
    fn source_file(&self) -> &str;
}

/// Published by the converter once a source document has been rendered to PNG pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvertedMessage {
    pub source_file: String,
    pub converted_files: Vec<String>,
    pub page_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
}

impl ConvertedMessage {
    pub fn trace_context(&self) -> TraceContext {
        TraceContext::from_fields(
            &self.source_file,
            self.trace_id.as_deref(),
            self.session_id.as_deref(),
            self.parent_span_id.as_deref(),
        )
    }
}

impl StageMessage for ConvertedMessage {
    fn validate(&self) -> Result<(), MessageError> {
        validate_uri("source_file", &self.source_file)?;
        validate_converted_files(&self.converted_files)?;
        if self.page_count == 0 {
            return Err(MessageError::invalid_field(
                "page_count",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    fn source_file(&self) -> &str {
        &self.source_file
    }
}

/// Published by the classification stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifiedMessage {
    pub source_file: String,
    pub converted_files: Vec<String>,
    pub vendor_type: VendorType,
    pub quality_score: f64,
    pub archived_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
}

impl ClassifiedMessage {
    pub fn trace_context(&self) -> TraceContext {
        TraceContext::from_fields(
            &self.source_file,
            self.trace_id.as_deref(),
            self.session_id.as_deref(),
            self.parent_span_id.as_deref(),
        )
    }
}

impl StageMessage for ClassifiedMessage {
    fn validate(&self) -> Result<(), MessageError> {
        validate_uri("source_file", &self.source_file)?;
        validate_converted_files(&self.converted_files)?;
        validate_score("quality_score", self.quality_score)?;
        validate_uri("archived_to", &self.archived_to)?;
        Ok(())
    }

    fn source_file(&self) -> &str {
        &self.source_file
    }
}

/// Published by the extraction stage once an invoice was extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractedMessage {
    pub trace_id: String,
    pub session_id: String,
    pub parent_span_id: String,
    pub source_file: String,
    pub vendor_type: VendorType,
    pub extraction_model: String,
    pub extraction_latency_ms: u64,
    pub confidence_score: f64,
    pub extracted_data: Value,
    pub prompt_name: String,
    pub prompt_version: String,
}

impl StageMessage for ExtractedMessage {
    fn validate(&self) -> Result<(), MessageError> {
        validate_uri("source_file", &self.source_file)?;
        if self.trace_id.trim().is_empty() {
            return Err(MessageError::invalid_field("trace_id", "must not be empty"));
        }
        if self.extraction_model.trim().is_empty() {
            return Err(MessageError::invalid_field(
                "extraction_model",
                "must not be empty",
            ));
        }
        validate_score("confidence_score", self.confidence_score)?;
        if !self.extracted_data.is_object() {
            return Err(MessageError::invalid_field(
                "extracted_data",
                "must be a JSON object",
            ));
        }
        Ok(())
    }

    fn source_file(&self) -> &str {
        &self.source_file
    }
}

fn validate_uri(field: &'static str, uri: &str) -> Result<(), MessageError> {
    cloud::parse_gcs_uri(uri)
        .map(|_| ())
        .map_err(|err| MessageError::invalid_field(field, err.to_string()))
}

fn validate_converted_files(files: &[String]) -> Result<(), MessageError> {
    if files.is_empty() {
        return Err(MessageError::invalid_field(
            "converted_files",
            "must contain at least one URI",
        ));
    }
    files
        .iter()
        .try_for_each(|uri| validate_uri("converted_files", uri))
}

fn validate_score(field: &'static str, value: f64) -> Result<(), MessageError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MessageError::invalid_field(
            field,
            format!("must be a finite non-negative number, got {value}"),
        ))
    }
}
