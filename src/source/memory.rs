//! In-memory document source
//!
//! Useful for tests and demos; hashes are computed the same way as the
//! directory source so change detection behaves identically.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::source::{Blob, BlobSource, dir::content_hash};

/// Document source backed by an in-memory map
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document
    pub fn insert(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), bytes.into());
    }

    /// Remove a document
    pub fn remove(&self, name: &str) {
        self.files.lock().unwrap().remove(name);
    }
}

#[async_trait]
impl BlobSource for MemorySource {
    async fn list(&self) -> Result<Vec<Blob>> {
        let files = self.files.lock().unwrap();
        Ok(files
            .iter()
            .map(|(name, bytes)| Blob {
                name: name.clone(),
                content_hash: content_hash(bytes),
            })
            .collect())
    }

    async fn download(&self, blob: &Blob) -> Result<Vec<u8>> {
        let files = self.files.lock().unwrap();
        files
            .get(&blob.name)
            .cloned()
            .ok_or_else(|| Error::Source(format!("Unknown document: {}", blob.name)))
    }
}
