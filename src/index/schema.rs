//! # Vector Index Schema Module
//!
//! This module defines the schema for the vector index: one row per RCA
//! document, keyed by the document id rendered as text, holding the embedding
//! and a shadow copy of the display metadata.
//!
//! The embedding column uses the `F32_BLOB` vector type with a
//! `libsql_vector_idx` index for efficient nearest-neighbor queries. Vector
//! index creation may fail on engines without vector support; queries then
//! fall back to an exact scan.

use crate::index::error::IndexError;
use libsql::{Connection, params};
use tracing::warn;

/// Initialize the vector index schema
pub async fn initialize_schema(conn: &Connection, dimensions: usize) -> Result<(), IndexError> {
    // Create vectors table
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS rca_vectors (
                doc_id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                project_name TEXT,
                embedding F32_BLOB({}) NOT NULL
            )",
            dimensions
        ),
        params![],
    )
    .await
    .map_err(|e| IndexError::Schema(format!("Failed to create rca_vectors table: {}", e)))?;

    // Create vector index for embeddings
    let vector_index_result = conn
        .execute(
            "CREATE INDEX IF NOT EXISTS rca_vectors_idx ON rca_vectors (libsql_vector_idx(embedding))",
            params![],
        )
        .await;

    if let Err(e) = vector_index_result {
        warn!(
            "Failed to create vector index: {}. Falling back to exact scans.",
            e
        );
    }

    Ok(())
}
