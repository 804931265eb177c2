//! Models service for the Gemini API
//!
//! This module provides functionality for interacting with Gemini models,
//! including content generation, streamed generation, and embedding.

use crate::error::{Error, Result};
use crate::gemini::http::HttpClient;
use crate::gemini::prelude::{
    Content, EmbedContentResponse, GenerateContentResponse, GenerationConfig,
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use tracing::{debug, instrument};

/// A stream of partial generation responses
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<GenerateContentResponse>> + Send>>;

/// Request for generating content
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    /// The contents to generate from
    contents: Vec<Content>,

    /// Generation configuration
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,

    /// The system prompt
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

/// Request for embedding content
#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    /// The content to embed
    content: Content,
}

/// Service for interacting with Gemini models
#[derive(Clone)]
pub struct ModelsService {
    /// HTTP client for making API requests
    http_client: HttpClient,
}

impl ModelsService {
    /// Create a new models service
    pub(crate) fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }

    /// Generate content from a model
    #[instrument(skip(self, contents), level = "debug")]
    pub async fn generate_content(
        &self,
        model: impl Into<String> + std::fmt::Debug,
        system_instruction: Option<Content>,
        contents: Vec<Content>,
    ) -> Result<GenerateContentResponse> {
        self.generate_content_with_config(model, system_instruction, contents, None)
            .await
    }

    /// Generate content with configuration
    #[instrument(skip(self, contents, config), level = "debug")]
    pub async fn generate_content_with_config(
        &self,
        model: impl Into<String> + std::fmt::Debug,
        system_instruction: Option<Content>,
        contents: Vec<Content>,
        config: Option<GenerationConfig>,
    ) -> Result<GenerateContentResponse> {
        let model = model.into();

        let request = GenerateContentRequest {
            contents,
            generation_config: config,
            system_instruction,
        };

        let path = format!("models/{}:generateContent", model);

        debug!("Generating content from model {}", model);
        self.http_client.post(&path, &request).await
    }

    /// Stream generated content from a model
    ///
    /// The response is consumed as server-sent events; each event carries a
    /// partial `GenerateContentResponse` whose text is the next fragment.
    #[instrument(skip(self, contents), level = "debug")]
    pub async fn stream_generate_content(
        &self,
        model: impl Into<String> + std::fmt::Debug,
        system_instruction: Option<Content>,
        contents: Vec<Content>,
    ) -> Result<ResponseStream> {
        let model = model.into();

        let request = GenerateContentRequest {
            contents,
            generation_config: None,
            system_instruction,
        };

        let path = format!("models/{}:streamGenerateContent", model);

        debug!("Streaming content from model {}", model);
        let response = self.http_client.post_stream(&path, &request).await?;

        let stream = async_stream::try_stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(Error::Http)?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE events are newline-delimited; only `data:` lines carry payloads
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    if let Some(payload) = line.strip_prefix("data:") {
                        let payload = payload.trim();
                        if payload.is_empty() {
                            continue;
                        }
                        let parsed: GenerateContentResponse = serde_json::from_str(payload)
                            .map_err(Error::Json)?;
                        yield parsed;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    /// Generate embeddings from content
    #[instrument(skip(self, contents), level = "debug")]
    pub async fn embed_content(
        &self,
        model: impl Into<String> + std::fmt::Debug,
        contents: impl Into<Content>,
    ) -> Result<EmbedContentResponse> {
        let model = model.into();
        let content = contents.into();

        let request = EmbedContentRequest { content };

        let path = format!("models/{}:embedContent", model);

        debug!("Generating embeddings from model {}", model);
        self.http_client.post(&path, &request).await
    }
}
