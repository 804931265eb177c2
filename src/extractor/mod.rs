//! Document extractor module
//!
//! This module decodes raw document bytes into plain text and asks the model
//! to extract a structured record: project, problems, solutions, root causes,
//! and lessons learned. Any decode or parse failure yields "no usable record"
//! for the caller rather than crashing the pipeline.

mod decode;
pub mod error;

pub use error::ExtractError;

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::config::PipelineConfig;
use crate::model::LanguageModel;

/// Structured fields extracted from an RCA document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RcaFields {
    /// Project the incident belongs to
    #[serde(default)]
    pub project_name: Option<String>,

    /// Identified problems
    #[serde(default)]
    pub problems: Vec<String>,

    /// Applied solutions
    #[serde(default)]
    pub solutions: Vec<String>,

    /// Identified root causes
    #[serde(default)]
    pub root_causes: Vec<String>,

    /// Key lessons learned
    #[serde(default)]
    pub lessons_learned: Vec<String>,
}

/// Result of a successful extraction
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Filename the bytes came from
    pub filename: String,

    /// The full decoded text
    pub full_content: String,

    /// Structured fields extracted by the model
    pub fields: RcaFields,
}

/// Extracts structured records from raw document bytes
#[derive(Clone)]
pub struct DocumentExtractor {
    model: Arc<dyn LanguageModel>,
    input_limit: usize,
}

impl DocumentExtractor {
    /// Create a new extractor
    pub fn new(model: Arc<dyn LanguageModel>, config: &PipelineConfig) -> Self {
        Self {
            model,
            input_limit: config.extraction_input_limit,
        }
    }

    /// Decode bytes and extract a structured record
    ///
    /// Only the leading `extraction_input_limit` characters of the decoded
    /// text are forwarded to the model; the full text is preserved in the
    /// result.
    #[instrument(skip(self, bytes))]
    pub async fn extract(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<ExtractedDocument, ExtractError> {
        let full_content = decode::decode_bytes(bytes, filename)?;
        debug!("Decoded {} characters from {}", full_content.len(), filename);

        let excerpt: String = full_content.chars().take(self.input_limit).collect();
        let prompt = build_extraction_prompt(&excerpt);

        let response = self
            .model
            .generate(&prompt)
            .await
            .map_err(|e| ExtractError::Generation(e.to_string()))?;
        trace!("Extraction response of length {}", response.len());

        let fields = parse_extraction_response(&response)?;

        Ok(ExtractedDocument {
            filename: filename.to_string(),
            full_content,
            fields,
        })
    }
}

/// Build the fixed-schema extraction prompt
fn build_extraction_prompt(content: &str) -> String {
    format!(
        "Analyze the following RCA document content and extract structured information.\n\
         Return ONLY a valid JSON object with the specified keys.\n\n\
         Document Content:\n{}\n\n\
         JSON format to extract:\n\
         {{\n\
         \x20   \"project_name\": \"string\",\n\
         \x20   \"problems\": [\"list of identified problems\"],\n\
         \x20   \"solutions\": [\"list of applied solutions\"],\n\
         \x20   \"root_causes\": [\"list of root causes\"],\n\
         \x20   \"lessons_learned\": [\"list of key lessons learned\"]\n\
         }}",
        content
    )
}

/// Parse the model reply into structured fields
///
/// A fenced JSON block wins when present; otherwise the raw reply must itself
/// be the JSON object.
fn parse_extraction_response(response: &str) -> Result<RcaFields, ExtractError> {
    let fence = Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("valid regex");
    let payload = fence
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| response.trim());

    serde_json::from_str(payload).map_err(|e| ExtractError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockModel;

    const EXTRACTION_JSON: &str = r#"{
        "project_name": "checkout",
        "problems": ["API latency spiked"],
        "solutions": ["Scaled out the pool"],
        "root_causes": ["Connection pool exhausted"],
        "lessons_learned": ["Alert on pool saturation"]
    }"#;

    fn extractor_with(model: &MockModel) -> DocumentExtractor {
        DocumentExtractor::new(Arc::new(model.clone()), &PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_extract_with_fenced_json() {
        let model = MockModel::new();
        model.push_response(&format!("Here you go:\n```json\n{}\n```", EXTRACTION_JSON));
        let extractor = extractor_with(&model);

        let extracted = extractor
            .extract(b"The checkout API timed out.", "incident.md")
            .await
            .unwrap();

        assert_eq!(extracted.filename, "incident.md");
        assert_eq!(extracted.full_content, "The checkout API timed out.");
        assert_eq!(extracted.fields.project_name.as_deref(), Some("checkout"));
        assert_eq!(extracted.fields.problems, vec!["API latency spiked"]);
    }

    #[tokio::test]
    async fn test_extract_with_raw_json_fallback() {
        let model = MockModel::new();
        model.push_response(EXTRACTION_JSON);
        let extractor = extractor_with(&model);

        let extracted = extractor
            .extract(b"content", "incident.txt")
            .await
            .unwrap();
        assert_eq!(
            extracted.fields.root_causes,
            vec!["Connection pool exhausted"]
        );
    }

    #[tokio::test]
    async fn test_non_json_reply_is_a_parse_error() {
        let model = MockModel::with_response("I could not analyze this document.");
        let extractor = extractor_with(&model);

        let err = extractor.extract(b"content", "incident.txt").await.unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unsupported_extension_skips_the_model() {
        let model = MockModel::new();
        let extractor = extractor_with(&model);

        let err = extractor.extract(b"content", "incident.bin").await.unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
        assert_eq!(model.generation_calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_is_reported() {
        let model = MockModel::new();
        model.fail_generation(true);
        let extractor = extractor_with(&model);

        let err = extractor.extract(b"content", "incident.txt").await.unwrap_err();
        assert!(matches!(err, ExtractError::Generation(_)));
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let fields = parse_extraction_response(r#"{"project_name": "checkout"}"#).unwrap();
        assert_eq!(fields.project_name.as_deref(), Some("checkout"));
        assert!(fields.problems.is_empty());
        assert!(fields.lessons_learned.is_empty());
    }

    #[test]
    fn test_prompt_embeds_content() {
        let prompt = build_extraction_prompt("the content excerpt");
        assert!(prompt.contains("the content excerpt"));
        assert!(prompt.contains("\"lessons_learned\""));
    }
}
