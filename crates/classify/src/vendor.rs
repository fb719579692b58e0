use messages::VendorType;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{ClassifyError, QualityConfig};

const FILENAME_CONFIDENCE: f64 = 0.95;
const PATH_CONFIDENCE: f64 = 0.85;
const CONVERTED_CONFIDENCE: f64 = 0.8;
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Glob patterns (`*`, `?`, case-insensitive) that identify one vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorRule {
    pub vendor: VendorType,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub vendor_rules: Vec<VendorRule>,
    pub quality: QualityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    FilenamePattern,
    PathPattern,
    ConvertedFilenamePattern,
    Default,
}

impl DetectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMethod::FilenamePattern => "filename_pattern",
            DetectionMethod::PathPattern => "path_pattern",
            DetectionMethod::ConvertedFilenamePattern => "converted_filename_pattern",
            DetectionMethod::Default => "default",
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub vendor_type: VendorType,
    pub confidence: f64,
    pub detection_method: DetectionMethod,
    pub matched_pattern: Option<String>,
}

struct CompiledPattern {
    vendor: VendorType,
    source: String,
    regex: Regex,
}

/// Deterministic vendor detection from object names.
///
/// Rules are tried in configuration order within each stage:
///
/// 1. source file name
/// 2. source object path (bucket excluded)
/// 3. converted page file names
///
/// The first match wins; with no match the vendor is `GENERIC`.
pub struct VendorClassifier {
    patterns: Vec<CompiledPattern>,
}

impl VendorClassifier {
    pub fn new(rules: &[VendorRule]) -> Result<Self, ClassifyError> {
        let mut patterns = Vec::new();
        for rule in rules {
            if rule.patterns.is_empty() {
                return Err(ClassifyError::EmptyRule(rule.vendor.to_string()));
            }
            for pattern in &rule.patterns {
                patterns.push(CompiledPattern {
                    vendor: rule.vendor.clone(),
                    source: pattern.clone(),
                    regex: glob_to_regex(pattern)?,
                });
            }
        }
        Ok(Self { patterns })
    }

    pub fn classify(&self, source_file: &str, converted_files: &[String]) -> Classification {
        let source_path = object_path(source_file);
        let source_name = file_name(source_path);

        if let Some(hit) = self.first_match(std::iter::once(source_name)) {
            return hit.classification(FILENAME_CONFIDENCE, DetectionMethod::FilenamePattern);
        }
        if let Some(hit) = self.first_match(std::iter::once(source_path)) {
            return hit.classification(PATH_CONFIDENCE, DetectionMethod::PathPattern);
        }
        let converted_names = converted_files.iter().map(|f| file_name(object_path(f)));
        if let Some(hit) = self.first_match(converted_names) {
            return hit.classification(
                CONVERTED_CONFIDENCE,
                DetectionMethod::ConvertedFilenamePattern,
            );
        }

        Classification {
            vendor_type: VendorType::generic(),
            confidence: DEFAULT_CONFIDENCE,
            detection_method: DetectionMethod::Default,
            matched_pattern: None,
        }
    }

    fn first_match<'a>(
        &self,
        candidates: impl Iterator<Item = &'a str> + Clone,
    ) -> Option<&CompiledPattern> {
        self.patterns
            .iter()
            .find(|p| candidates.clone().any(|c| p.regex.is_match(c)))
    }
}

impl CompiledPattern {
    fn classification(&self, confidence: f64, method: DetectionMethod) -> Classification {
        Classification {
            vendor_type: self.vendor.clone(),
            confidence,
            detection_method: method,
            matched_pattern: Some(self.source.clone()),
        }
    }
}

fn glob_to_regex(pattern: &str) -> Result<Regex, ClassifyError> {
    if pattern.trim().is_empty() {
        return Err(ClassifyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern is empty".to_string(),
        });
    }
    let mut expr = String::from("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| ClassifyError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn object_path(uri: &str) -> &str {
    uri.strip_prefix("gs://")
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, path)| path)
        .unwrap_or(uri)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(vendor: &str, patterns: &[&str]) -> VendorRule {
        VendorRule {
            vendor: VendorType::new(vendor).unwrap(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn classifier() -> VendorClassifier {
        VendorClassifier::new(&[
            rule("ACME", &["ACME-*", "acme_??.tif"]),
            rule("GLOBEX", &["*/globex/*"]),
        ])
        .unwrap()
    }

    #[test]
    fn source_file_name_wins_first() {
        let c = classifier().classify("gs://in/globex/acme-0042.tif", &[]);
        assert_eq!(c.vendor_type.as_str(), "ACME");
        assert_eq!(c.detection_method, DetectionMethod::FilenamePattern);
        assert_eq!(c.confidence, 0.95);
        assert_eq!(c.matched_pattern.as_deref(), Some("ACME-*"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        let c = classifier().classify("gs://in/ACME_12.TIF", &[]);
        assert_eq!(c.matched_pattern.as_deref(), Some("acme_??.tif"));
        let c = classifier().classify("gs://in/acme_123.tif", &[]);
        assert!(c.vendor_type.is_generic());
    }

    #[test]
    fn path_pattern_matches_directories() {
        let c = classifier().classify("gs://in/2024/globex/scan.tif", &[]);
        assert_eq!(c.vendor_type.as_str(), "GLOBEX");
        assert_eq!(c.detection_method, DetectionMethod::PathPattern);
        assert_eq!(c.confidence, 0.85);
    }

    #[test]
    fn converted_file_names_are_last_resort() {
        let c = classifier().classify(
            "gs://in/a.tif",
            &["gs://proc/ACME-a_page_1.png".to_string()],
        );
        assert_eq!(c.vendor_type.as_str(), "ACME");
        assert_eq!(c.detection_method.as_str(), "converted_filename_pattern");
        assert_eq!(c.confidence, 0.8);
    }

    #[test]
    fn no_match_falls_back_to_generic() {
        let c = classifier().classify("gs://in/a.tif", &["gs://proc/a.png".to_string()]);
        assert!(c.vendor_type.is_generic());
        assert_eq!(c.detection_method, DetectionMethod::Default);
        assert_eq!(c.confidence, 0.5);
        assert_eq!(c.matched_pattern, None);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let c = VendorClassifier::new(&[rule("DOT", &["a.b*"])]).unwrap();
        assert!(c.classify("gs://in/axb.tif", &[]).vendor_type.is_generic());
        assert_eq!(c.classify("gs://in/a.b.tif", &[]).vendor_type.as_str(), "DOT");
    }

    #[test]
    fn empty_rules_and_patterns_are_rejected() {
        assert!(matches!(
            VendorClassifier::new(&[rule("ACME", &[])]),
            Err(ClassifyError::EmptyRule(_))
        ));
        assert!(matches!(
            VendorClassifier::new(&[rule("ACME", &[" "])]),
            Err(ClassifyError::InvalidPattern { .. })
        ));
    }
}
