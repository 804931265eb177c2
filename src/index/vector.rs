//! Vector index operations

use libsql::{Connection, Row, params};
use tracing::{debug, instrument};

use crate::index::error::IndexError;
use crate::index::{VectorMatch, VectorMetadata, blob_to_embedding, embedding_to_blob, schema};

/// Embedding index for RCA documents
///
/// One entry per document; an upsert replaces both the vector and the shadow
/// metadata. The entry lifecycle is tied 1:1 to the owning document.
#[derive(Clone)]
pub struct VectorIndex {
    conn: Connection,
}

impl VectorIndex {
    /// Create a new vector index on an existing connection
    #[instrument(skip(conn))]
    pub async fn new(conn: Connection, dimensions: usize) -> Result<Self, IndexError> {
        // Initialize schema
        schema::initialize_schema(&conn, dimensions).await?;

        Ok(Self { conn })
    }

    /// Create a new vector index from a database path
    pub async fn new_from_path(path: &str, dimensions: usize) -> Result<Self, IndexError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| IndexError::Connection(format!("Failed to open database: {}", e)))?;

        let conn = db
            .connect()
            .map_err(|e| IndexError::Connection(format!("Failed to connect to database: {}", e)))?;

        Self::new(conn, dimensions).await
    }

    /// Insert or replace the entry for a document
    #[instrument(skip(self, embedding, metadata))]
    pub async fn upsert(
        &self,
        doc_id: &str,
        embedding: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<(), IndexError> {
        self.conn
            .execute(
                "INSERT INTO rca_vectors (doc_id, filename, project_name, embedding)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(doc_id) DO UPDATE SET
                 filename = excluded.filename,
                 project_name = excluded.project_name,
                 embedding = excluded.embedding",
                params![
                    doc_id,
                    metadata.filename.clone(),
                    opt_text(metadata.project_name.as_deref()),
                    libsql::Value::Blob(embedding_to_blob(embedding)),
                ],
            )
            .await
            .map_err(|e| IndexError::Query(format!("Failed to upsert vector: {}", e)))?;

        Ok(())
    }

    /// Remove the entry for a document
    pub async fn remove(&self, doc_id: &str) -> Result<(), IndexError> {
        self.conn
            .execute("DELETE FROM rca_vectors WHERE doc_id = ?", params![doc_id])
            .await
            .map_err(|e| IndexError::Query(format!("Failed to remove vector: {}", e)))?;

        Ok(())
    }

    /// Query the index for up to `k` nearest entries, best match first
    ///
    /// Tries the `vector_top_k` index path first and falls back to an exact
    /// scan when vector search is unavailable.
    #[instrument(skip(self, embedding))]
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorMatch>, IndexError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        match self.indexed_query(embedding, k).await {
            Ok(matches) => Ok(matches),
            Err(e) => {
                debug!("Vector index query failed ({}), using exact scan", e);
                self.exact_scan(embedding, k).await
            }
        }
    }

    /// Query using the `vector_top_k` index function
    async fn indexed_query(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<VectorMatch>, IndexError> {
        let blob = embedding_to_blob(embedding);

        let mut rows = self
            .conn
            .query(
                "SELECT v.doc_id, v.filename, v.project_name,
                        vector_distance_cos(v.embedding, ?) AS distance
                 FROM vector_top_k('rca_vectors_idx', ?, ?) AS t
                 JOIN rca_vectors v ON v.rowid = t.id
                 ORDER BY distance ASC",
                params![
                    libsql::Value::Blob(blob.clone()),
                    libsql::Value::Blob(blob),
                    k as i64,
                ],
            )
            .await
            .map_err(|e| IndexError::Query(format!("Failed to query vector index: {}", e)))?;

        let mut matches = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            matches.push(row_to_match(&row)?);
        }

        Ok(matches)
    }

    /// Exact nearest-neighbor scan computed client-side
    async fn exact_scan(&self, embedding: &[f32], k: usize) -> Result<Vec<VectorMatch>, IndexError> {
        let mut rows = self
            .conn
            .query(
                "SELECT doc_id, filename, project_name, embedding FROM rca_vectors",
                params![],
            )
            .await
            .map_err(|e| IndexError::Query(format!("Failed to scan vectors: {}", e)))?;

        let mut matches = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let blob: Vec<u8> = row
                .get(3)
                .map_err(|e| IndexError::Data(format!("Failed to get embedding: {}", e)))?;
            let candidate = blob_to_embedding(&blob);

            matches.push(VectorMatch {
                doc_id: row
                    .get(0)
                    .map_err(|e| IndexError::Data(format!("Failed to get doc_id: {}", e)))?,
                filename: row
                    .get(1)
                    .map_err(|e| IndexError::Data(format!("Failed to get filename: {}", e)))?,
                project_name: get_opt_text(&row, 2)?,
                distance: cosine_distance(embedding, &candidate),
            });
        }

        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(k);
        Ok(matches)
    }
}

fn opt_text(value: Option<&str>) -> libsql::Value {
    match value {
        Some(v) => libsql::Value::from(v),
        None => libsql::Value::Null,
    }
}

/// Read a nullable text column
fn get_opt_text(row: &Row, idx: i32) -> Result<Option<String>, IndexError> {
    match row.get_value(idx) {
        Ok(libsql::Value::Text(text)) => Ok(Some(text)),
        Ok(libsql::Value::Null) => Ok(None),
        Ok(other) => Err(IndexError::Data(format!(
            "Unexpected value in column {}: {:?}",
            idx, other
        ))),
        Err(e) => Err(IndexError::Data(format!(
            "Failed to get column {}: {}",
            idx, e
        ))),
    }
}

/// Convert a database row to a VectorMatch
fn row_to_match(row: &Row) -> Result<VectorMatch, IndexError> {
    Ok(VectorMatch {
        doc_id: row
            .get(0)
            .map_err(|e| IndexError::Data(format!("Failed to get doc_id: {}", e)))?,
        filename: row
            .get(1)
            .map_err(|e| IndexError::Data(format!("Failed to get filename: {}", e)))?,
        project_name: get_opt_text(row, 2)?,
        distance: row
            .get(3)
            .map_err(|e| IndexError::Data(format!("Failed to get distance: {}", e)))?,
    })
}

/// Cosine distance between two vectors, 1.0 for degenerate inputs
fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    async fn setup_test_index() -> (VectorIndex, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir
            .path()
            .join("vectors.db")
            .to_string_lossy()
            .to_string();

        let index = VectorIndex::new_from_path(&db_path, 4).await.unwrap();

        (index, temp_dir)
    }

    fn metadata(filename: &str) -> VectorMetadata {
        VectorMetadata {
            filename: filename.to_string(),
            project_name: Some("checkout".to_string()),
        }
    }

    #[tokio::test]
    async fn test_query_ranks_by_distance() {
        let (index, _temp_dir) = setup_test_index().await;

        index
            .upsert("1", &[1.0, 0.0, 0.0, 0.0], &metadata("close.md"))
            .await
            .unwrap();
        index
            .upsert("2", &[0.0, 1.0, 0.0, 0.0], &metadata("orthogonal.md"))
            .await
            .unwrap();
        index
            .upsert("3", &[0.9, 0.1, 0.0, 0.0], &metadata("near.md"))
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0, 0.0, 0.0], 3).await.unwrap();

        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].doc_id, "1");
        assert_eq!(matches[1].doc_id, "3");
        assert_eq!(matches[2].doc_id, "2");
        assert!(matches[0].distance <= matches[1].distance);
        assert!(matches[1].distance <= matches[2].distance);
    }

    #[tokio::test]
    async fn test_query_respects_k() {
        let (index, _temp_dir) = setup_test_index().await;

        for i in 0..5 {
            index
                .upsert(
                    &i.to_string(),
                    &[1.0, i as f32 * 0.1, 0.0, 0.0],
                    &metadata(&format!("doc-{}.md", i)),
                )
                .await
                .unwrap();
        }

        let matches = index.query(&[1.0, 0.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(matches.len(), 2);

        let none = index.query(&[1.0, 0.0, 0.0, 0.0], 0).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_matches() {
        let (index, _temp_dir) = setup_test_index().await;
        let matches = index.query(&[1.0, 0.0, 0.0, 0.0], 5).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_entry() {
        let (index, _temp_dir) = setup_test_index().await;

        index
            .upsert("1", &[1.0, 0.0, 0.0, 0.0], &metadata("old.md"))
            .await
            .unwrap();
        index
            .upsert("1", &[0.0, 1.0, 0.0, 0.0], &metadata("new.md"))
            .await
            .unwrap();

        let matches = index.query(&[0.0, 1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].filename, "new.md");
        assert!(matches[0].distance < 1e-6);
    }

    #[tokio::test]
    async fn test_remove_deletes_entry() {
        let (index, _temp_dir) = setup_test_index().await;

        index
            .upsert("1", &[1.0, 0.0, 0.0, 0.0], &metadata("doc.md"))
            .await
            .unwrap();
        index.remove("1").await.unwrap();

        let matches = index.query(&[1.0, 0.0, 0.0, 0.0], 5).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_exact_scan_matches_ranking() {
        let (index, _temp_dir) = setup_test_index().await;

        index
            .upsert("1", &[1.0, 0.0, 0.0, 0.0], &metadata("a.md"))
            .await
            .unwrap();
        index
            .upsert("2", &[-1.0, 0.0, 0.0, 0.0], &metadata("b.md"))
            .await
            .unwrap();

        let matches = index.exact_scan(&[1.0, 0.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(matches[0].doc_id, "1");
        assert!(matches[0].distance < 1e-6);
        // Opposite vector sits at the far end of the cosine range
        assert!((matches[1].distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_degenerate_inputs() {
        assert_eq!(cosine_distance(&[], &[]), 1.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
    }
}
