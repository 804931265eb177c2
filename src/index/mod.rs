//! Vector index module
//!
//! This module maps RCA document identifiers to embedding vectors and minimal
//! display metadata, and answers nearest-neighbor queries by embedding.

pub mod error;
mod schema;
mod vector;

pub use error::IndexError;
pub use vector::VectorIndex;

/// Display metadata shadowed alongside an embedding
#[derive(Debug, Clone)]
pub struct VectorMetadata {
    /// Filename of the owning document
    pub filename: String,

    /// Project of the owning document
    pub project_name: Option<String>,
}

/// A nearest-neighbor match returned by the index
#[derive(Debug, Clone)]
pub struct VectorMatch {
    /// Identifier of the owning document
    pub doc_id: String,

    /// Filename of the owning document
    pub filename: String,

    /// Project of the owning document
    pub project_name: Option<String>,

    /// Raw distance reported by the index (smaller is closer)
    pub distance: f64,
}

/// Convert an embedding to its persisted little-endian f32 blob form
pub fn embedding_to_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a persisted blob back to an embedding
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    let mut values = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(chunk);
        values.push(f32::from_le_bytes(bytes));
    }
    values
}
