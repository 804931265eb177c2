//! # Recall - RCA Knowledge Base with Retrieval-Augmented Recommendations
//!
//! This crate implements a knowledge base over historical incident reports
//! (Root-Cause-Analyses, "RCAs"). It ingests heterogeneous documents into
//! structured records, indexes them by embedding for semantic similarity
//! search, and turns retrieved context into actionable remediation
//! recommendations through a large language model.
//!
//! ## Features
//!
//! - Document ingestion with content-hash change detection
//! - LLM-driven structured extraction from text, Word, and PDF documents
//! - Vector indexing with LibSQL and nearest-neighbor queries
//! - Intent routing between a technical problem-solver and a general
//!   knowledge assistant
//! - Recommendation generation from ranked historical incidents
//! - Chat sessions with persisted history, blocking or streamed replies
//! - Async API with Tokio
//! - Robust error handling and logging
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use recall::chat::ChatPipeline;
//! use recall::config::PipelineConfig;
//! use recall::model::{GeminiModel, LanguageModel};
//! use recall::router::LlmIntentRouter;
//! use recall::{index::VectorIndex, store::Store};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let client = recall::gemini::Client::with_api_key("your-api-key");
//!     let model: Arc<dyn LanguageModel> = Arc::new(GeminiModel::new(client, &config));
//!
//!     let db = libsql::Builder::new_local("recall.db").build().await?;
//!     let store = Store::new(db.connect()?).await?;
//!     let index = VectorIndex::new(db.connect()?, config.embedding_dimensions).await?;
//!
//!     let router = Arc::new(LlmIntentRouter::new(model.clone()));
//!     let pipeline = ChatPipeline::new(store.clone(), index, model, router, &config);
//!
//!     let session = store.create_session(None).await?;
//!     let reply = pipeline.respond(&session.id, "the database is timing out").await?;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```

mod error;

pub mod chat;
pub mod config;
pub mod extractor;
pub mod gemini;
pub mod index;
pub mod model;
pub mod recommend;
pub mod router;
pub mod search;
pub mod source;
pub mod store;
pub mod sync;

pub use error::Error;

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::error::Result;
}
