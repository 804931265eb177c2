//! # Pipeline Configuration Module
//!
//! This module provides configuration for the retrieval-augmented
//! recommendation pipeline: which models to call, how much text to forward
//! to them, and how many similar incidents to retrieve. It uses a builder
//! pattern for flexible configuration.
//!
//! ## Key Components
//!
//! - `PipelineConfig`: The main configuration struct with pipeline parameters
//! - `PipelineConfigBuilder`: Builder pattern implementation for easier configuration

/// Configuration for the recommendation pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model used for extraction, routing, and recommendation generation
    pub generation_model: String,

    /// Model used for embedding documents and queries
    pub embedding_model: String,

    /// Dimensions of the embedding vectors
    pub embedding_dimensions: usize,

    /// Maximum number of document characters forwarded to the extraction prompt
    pub extraction_input_limit: usize,

    /// Maximum number of context characters forwarded to the general-answer prompt
    pub general_context_limit: usize,

    /// Default number of similar incidents to retrieve
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation_model: "gemini-2.0-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            embedding_dimensions: 768,
            extraction_input_limit: 8000,
            general_context_limit: 25000,
            top_n: 5,
        }
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// Set the generation model
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    /// Set the embedding model
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the embedding dimensions
    pub fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.config.embedding_dimensions = dimensions;
        self
    }

    /// Set the extraction input limit in characters
    pub fn extraction_input_limit(mut self, limit: usize) -> Self {
        self.config.extraction_input_limit = limit;
        self
    }

    /// Set the general context limit in characters
    pub fn general_context_limit(mut self, limit: usize) -> Self {
        self.config.general_context_limit = limit;
        self
    }

    /// Set the default number of retrieved incidents
    pub fn top_n(mut self, top_n: usize) -> Self {
        self.config.top_n = top_n;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

impl PipelineConfig {
    /// Create a new builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }
}
