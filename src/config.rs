//! Pipeline configuration.
//!
//! [`PipelineConfig`] is loaded once at startup and handed to the stage
//! constructors. Sources, later ones winning:
//!
//! 1. an optional `pipeline.{toml,yaml,json}` file in the working directory
//! 2. `PIPELINE__*` environment variables, `__` separating nested keys
//!
//! ```toml
//! project_id = "acme-invoices"
//! archive_bucket = "acme-archive"
//! failed_bucket = "acme-failed"
//!
//! [[classifier.vendor_rules]]
//! vendor = "ACME"
//! patterns = ["ACME-*", "*_acme_*"]
//!
//! [langfuse]
//! enabled = true
//! public_key = "pk-lf-..."
//! secret_key = "sk-lf-..."
//! ```
//!
//! The same keys work from the environment, e.g.
//! `PIPELINE__ARCHIVE_BUCKET=acme-archive` or `PIPELINE__LANGFUSE__ENABLED=true`.

use std::collections::BTreeMap;
use std::time::Duration;

use classify::{ClassifierConfig, VendorClassifier};
use extract::{PromptRegistry, PromptTemplate, RetryConfig};
use messages::VendorType;
use observe::LangfuseConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Cloud project that owns the topics and the Vertex AI endpoint.
    #[serde(default)]
    pub project_id: String,

    /// Vertex AI region, or `global`.
    #[serde(default = "default_region")]
    pub region: String,

    /// Receives a copy of every classified original.
    #[serde(default)]
    pub archive_bucket: String,

    /// Receives originals whose extraction failed, plus an error record.
    #[serde(default)]
    pub failed_bucket: String,

    #[serde(default = "default_classified_topic")]
    pub classified_topic: String,

    #[serde(default = "default_extracted_topic")]
    pub extracted_topic: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Enables the OpenRouter fallback when set.
    #[serde(default)]
    pub openrouter_api_key: Option<String>,

    #[serde(default = "default_openrouter_model")]
    pub openrouter_model: String,

    /// Timeout applied to every outbound HTTP request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub langfuse: LangfuseConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Per-vendor prompt overrides; other vendors get the generic prompt.
    #[serde(default)]
    pub prompts: BTreeMap<VendorType, PromptTemplate>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            region: default_region(),
            archive_bucket: String::new(),
            failed_bucket: String::new(),
            classified_topic: default_classified_topic(),
            extracted_topic: default_extracted_topic(),
            gemini_model: default_gemini_model(),
            openrouter_api_key: None,
            openrouter_model: default_openrouter_model(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
            langfuse: LangfuseConfig::default(),
            classifier: ClassifierConfig::default(),
            prompts: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Load from `pipeline.*` and `PIPELINE__*`, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("pipeline").required(false))
            .add_source(
                config::Environment::with_prefix("PIPELINE")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    /// Parse a TOML document, for tests and embedded defaults.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml));
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("project_id", &self.project_id),
            ("archive_bucket", &self.archive_bucket),
            ("failed_bucket", &self.failed_bucket),
            ("classified_topic", &self.classified_topic),
            ("extracted_topic", &self.extracted_topic),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field));
            }
        }

        if self.archive_bucket == self.failed_bucket {
            return Err(ConfigError::Validation(
                "archive_bucket and failed_bucket must differ".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be >= 1".to_string(),
            ));
        }

        let quality = &self.classifier.quality;
        if quality.min_brightness > quality.max_brightness {
            return Err(ConfigError::Validation(format!(
                "classifier.quality.min_brightness ({}) exceeds max_brightness ({})",
                quality.min_brightness, quality.max_brightness
            )));
        }
        VendorClassifier::new(&self.classifier.vendor_rules)
            .map_err(|e| ConfigError::Validation(format!("classifier.vendor_rules: {e}")))?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn prompt_registry(&self) -> PromptRegistry {
        PromptRegistry::new(self.prompts.clone())
    }

    /// The OpenRouter key, if one with content is configured.
    pub fn openrouter_key(&self) -> Option<&str> {
        self.openrouter_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

fn default_region() -> String {
    "us-central1".to_string()
}

fn default_classified_topic() -> String {
    "invoice-classified".to_string()
}

fn default_extracted_topic() -> String {
    "invoice-extracted".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_openrouter_model() -> String {
    "google/gemini-2.5-flash".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
project_id = "acme-invoices"
archive_bucket = "archive"
failed_bucket = "failed"
"#;

    #[test]
    fn minimal_document_gets_defaults() {
        let cfg = PipelineConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(cfg.project_id, "acme-invoices");
        assert_eq!(cfg.region, "us-central1");
        assert_eq!(cfg.classified_topic, "invoice-classified");
        assert_eq!(cfg.extracted_topic, "invoice-extracted");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.retry, RetryConfig::default());
        assert!(!cfg.langfuse.enabled);
        assert!(cfg.openrouter_key().is_none());
    }

    #[test]
    fn nested_sections_are_read() {
        let toml = format!(
            r#"{MINIMAL}
openrouter_api_key = "or-key"

[retry]
max_retries = 4
base_delay = 250

[[classifier.vendor_rules]]
vendor = "acme"
patterns = ["ACME-*"]

[prompts.ACME]
name = "invoice-extraction-acme"
version = "2"
system = "sys"
instruction = "extract"
"#
        );
        let cfg = PipelineConfig::from_toml(&toml).unwrap();
        assert_eq!(cfg.openrouter_key(), Some("or-key"));
        assert_eq!(cfg.retry.max_retries, 4);
        assert_eq!(cfg.retry.base_delay, Duration::from_millis(250));
        assert_eq!(cfg.classifier.vendor_rules[0].vendor.as_str(), "ACME");

        let acme = VendorType::new("ACME").unwrap();
        assert_eq!(cfg.prompt_registry().for_vendor(&acme).version, "2");
    }

    #[test]
    fn missing_buckets_are_rejected() {
        let err = PipelineConfig::from_toml("project_id = \"p\"").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("archive_bucket")));
    }

    #[test]
    fn identical_buckets_are_rejected() {
        let cfg = PipelineConfig {
            project_id: "p".into(),
            archive_bucket: "same".into(),
            failed_bucket: "same".into(),
            ..PipelineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn blank_fallback_key_disables_fallback() {
        let cfg = PipelineConfig {
            openrouter_api_key: Some("   ".into()),
            ..PipelineConfig::default()
        };
        assert!(cfg.openrouter_key().is_none());
    }

    #[test]
    fn vendor_rule_without_patterns_is_rejected() {
        let mut cfg = PipelineConfig::from_toml(MINIMAL).unwrap();
        cfg.classifier.vendor_rules.push(classify::VendorRule {
            vendor: VendorType::new("ACME").unwrap(),
            patterns: Vec::new(),
        });
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }
}
