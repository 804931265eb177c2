//! Type definitions for the Gemini API
//!
//! This module contains the core data structures for interacting with the Gemini API.

use serde::{Deserialize, Serialize};

/// Content represents a piece of content that can be processed by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    /// The role of the content (e.g., "user", "model")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// The parts that make up this content
    pub parts: Vec<Part>,
}

impl Default for Content {
    fn default() -> Self {
        Self::new()
    }
}

impl Content {
    /// Create a new empty content
    pub fn new() -> Self {
        Self {
            role: None,
            parts: Vec::new(),
        }
    }

    /// Set the role for this content
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Add text to this content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::Text(text.into()));
        self
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::new().with_text(text)
    }
}

/// A part of content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    /// Text content
    #[serde(rename = "text")]
    Text(String),
}

/// Generation configuration for content generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Temperature controls randomness in generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Top-p controls diversity by limiting to tokens with cumulative probability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Maximum output tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i32>,

    /// Stop sequences to end generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// Response from content generation
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    /// The generated candidates
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Get the text from the first candidate, concatenating its text parts
    pub fn text(&self) -> String {
        let mut out = String::new();
        if let Some(candidate) = self.candidates.first() {
            if let Some(content) = candidate.content.as_ref() {
                for part in &content.parts {
                    let Part::Text(text) = part;
                    out.push_str(text);
                }
            }
        }
        out
    }
}

/// A generated candidate
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    /// The content of the candidate
    #[serde(default)]
    pub content: Option<Content>,
}

/// Response from embedding content
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedContentResponse {
    /// The embedding for the content
    pub embedding: ContentEmbedding,
}

/// An embedding vector
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEmbedding {
    /// The vector values
    pub values: Vec<f32>,
}

/// HTTP options for the API client
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// API version to use
    pub api_version: String,

    /// Whether to automatically retry requests when rate limited
    pub retry_on_rate_limit: bool,

    /// Maximum number of retry attempts for rate-limited requests
    pub max_retries: u32,

    /// Default retry delay in seconds if no Retry-After header is provided
    pub default_retry_after_secs: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            api_version: "v1beta".to_string(),
            retry_on_rate_limit: false,
            max_retries: 3,
            default_retry_after_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_builder() {
        let content = Content::new().with_role("user").with_text("Hello");

        assert_eq!(content.role.as_deref(), Some("user"));
        assert_eq!(content.parts.len(), 1);
        let Part::Text(text) = &content.parts[0];
        assert_eq!(text, "Hello");
    }

    #[test]
    fn test_content_wire_format() {
        let content = Content::new().with_text("Hello");
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json, serde_json::json!({"parts": [{"text": "Hello"}]}));
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {
                        "parts": [{"text": "Hello, "}, {"text": "world"}]
                    }
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(response.text(), "Hello, world");
    }

    #[test]
    fn test_response_text_empty_candidates() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), "");
    }

    #[test]
    fn test_embed_response_parsing() {
        let response: EmbedContentResponse =
            serde_json::from_str(r#"{"embedding": {"values": [0.1, 0.2, 0.3]}}"#).unwrap();
        assert_eq!(response.embedding.values, vec![0.1, 0.2, 0.3]);
    }
}
