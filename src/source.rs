//! Document source module
//!
//! This module provides the contract for external document stores the sync
//! pipeline reconciles against: enumerate available documents with their
//! content hashes, then download bytes for the ones that changed.

mod dir;
mod memory;

pub use dir::DirSource;
pub use memory::MemorySource;

use async_trait::async_trait;

use crate::error::Result;

/// A document available from an external source
#[derive(Debug, Clone)]
pub struct Blob {
    /// Name of the document within the source
    pub name: String,

    /// Fingerprint of the document bytes
    pub content_hash: String,
}

/// Contract for an external document store
#[async_trait]
pub trait BlobSource: Send + Sync {
    /// Enumerate all available documents with their content hashes
    async fn list(&self) -> Result<Vec<Blob>>;

    /// Download the bytes of a document
    async fn download(&self, blob: &Blob) -> Result<Vec<u8>>;
}
