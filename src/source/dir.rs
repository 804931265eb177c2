//! Local directory document source

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::source::{Blob, BlobSource};

/// Document source backed by a local directory
///
/// Regular files directly under the root are exposed as blobs; the content
/// hash is the SHA-256 of the file bytes.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Create a source over a directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobSource for DirSource {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn list(&self) -> Result<Vec<Blob>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| Error::Source(format!("Failed to read {}: {}", self.root.display(), e)))?;

        let mut blobs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Source(format!("Failed to read directory entry: {}", e)))?
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| Error::Source(format!("Failed to read {}: {}", path.display(), e)))?;

            blobs.push(Blob {
                name,
                content_hash: content_hash(&bytes),
            });
        }

        // Deterministic order across filesystems
        blobs.sort_by(|a, b| a.name.cmp(&b.name));

        debug!("Listed {} documents", blobs.len());
        Ok(blobs)
    }

    async fn download(&self, blob: &Blob) -> Result<Vec<u8>> {
        let path = self.root.join(&blob.name);
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::Source(format!("Failed to read {}: {}", path.display(), e)))
    }
}

/// SHA-256 hex fingerprint of document bytes
pub(crate) fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
