//! # LLM Provider Module
//!
//! This module provides the seam between the pipeline and the language model
//! provider, with built-in rate limiting to prevent API quota exhaustion.
//!
//! ## Key Components
//!
//! - `LanguageModel`: The provider contract consumed by the pipeline —
//!   blocking generation, streamed generation, and embedding
//! - `GeminiModel`: The Gemini-backed implementation with rate limiting
//! - `MockModel`: A scriptable implementation for tests
//!
//! Components take an `Arc<dyn LanguageModel>` so a different provider (or a
//! test double) can be substituted without touching callers.

use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::gemini;
use crate::gemini::prelude::Content;

pub mod mock;

pub use mock::MockModel;

/// A stream of generated text fragments in arrival order
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Contract for a language model provider
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a complete response for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate a response as a stream of text fragments
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream>;

    /// Embed a text into a fixed-length vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Gemini-backed language model with client-side rate limiting
#[derive(Clone)]
pub struct GeminiModel {
    client: gemini::Client,
    generation_model: String,
    embedding_model: String,
    completion_limiter: Arc<DefaultDirectRateLimiter>,
    embedding_limiter: Arc<DefaultDirectRateLimiter>,
}

impl GeminiModel {
    /// Create a new model with standard-tier rate limits
    pub fn new(client: gemini::Client, config: &PipelineConfig) -> Self {
        Self::with_quotas(client, config, 2000, 1000)
    }

    /// Create a new model with free-tier rate limits
    pub fn new_free(client: gemini::Client, config: &PipelineConfig) -> Self {
        Self::with_quotas(client, config, 30, 1000)
    }

    fn with_quotas(
        client: gemini::Client,
        config: &PipelineConfig,
        completions_per_minute: u32,
        embeddings_per_minute: u32,
    ) -> Self {
        let completion_limiter = RateLimiter::direct(Quota::per_minute(
            NonZeroU32::new(completions_per_minute).expect("must create rate limit"),
        ));
        let embedding_limiter = RateLimiter::direct(Quota::per_minute(
            NonZeroU32::new(embeddings_per_minute).expect("must create rate limit"),
        ));
        Self {
            client,
            generation_model: config.generation_model.clone(),
            embedding_model: config.embedding_model.clone(),
            completion_limiter: Arc::new(completion_limiter),
            embedding_limiter: Arc::new(embedding_limiter),
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.completion_limiter.until_ready().await;
        debug!("Generating with model {}", self.generation_model);

        let content = Content::new().with_role("user").with_text(prompt);
        let response = self
            .client
            .models()
            .generate_content(self.generation_model.clone(), None, vec![content])
            .await?;
        Ok(response.text())
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        self.completion_limiter.until_ready().await;
        debug!("Streaming with model {}", self.generation_model);

        let content = Content::new().with_role("user").with_text(prompt);
        let stream = self
            .client
            .models()
            .stream_generate_content(self.generation_model.clone(), None, vec![content])
            .await?;
        Ok(Box::pin(stream.map(|r| r.map(|response| response.text()))))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedding_limiter.until_ready().await;
        debug!("Embedding with model {}", self.embedding_model);

        let content = Content::new().with_text(text);
        let response = self
            .client
            .models()
            .embed_content(self.embedding_model.clone(), content)
            .await?;
        Ok(response.embedding.values)
    }
}
