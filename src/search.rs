//! Similarity search module
//!
//! This module embeds a free-text problem description, queries the vector
//! index for the nearest historical incidents, and joins the results back to
//! full knowledge-store records with a normalized similarity score.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::index::VectorIndex;
use crate::model::LanguageModel;
use crate::store::Store;

/// A ranked similar incident
///
/// Snapshots of these are persisted with technical assistant replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcaMatch {
    /// Id of the matched document
    pub rca_id: i64,

    /// Filename of the matched document
    pub filename: String,

    /// Project of the matched document
    pub project_name: Option<String>,

    /// Identified problems
    pub problems: Vec<String>,

    /// Applied solutions
    pub solutions: Vec<String>,

    /// Identified root causes
    pub root_causes: Vec<String>,

    /// Similarity in [0, 100], rounded to 2 decimals
    pub similarity_score: f64,
}

/// Embedding-based search over the knowledge base
#[derive(Clone)]
pub struct SimilaritySearch {
    store: Store,
    index: VectorIndex,
    model: Arc<dyn LanguageModel>,
}

impl SimilaritySearch {
    /// Create a new similarity search over the given store and index
    pub fn new(store: Store, index: VectorIndex, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            store,
            index,
            model,
        }
    }

    /// Find up to `top_n` incidents similar to the query
    ///
    /// The vector index ranking is preserved; re-joining records by id never
    /// reorders the output. An empty index result yields an empty list.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, top_n: usize) -> Result<Vec<RcaMatch>> {
        let embedding = self.model.embed(query).await?;
        let matches = self.index.query(&embedding, top_n).await?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = matches
            .iter()
            .filter_map(|m| m.doc_id.parse().ok())
            .collect();
        let documents = self.store.documents_by_ids(&ids).await?;
        let by_id: HashMap<i64, _> = documents.into_iter().map(|d| (d.id, d)).collect();

        let mut results = Vec::new();
        for m in &matches {
            let id: i64 = match m.doc_id.parse() {
                Ok(id) => id,
                Err(_) => continue,
            };
            if let Some(doc) = by_id.get(&id) {
                results.push(RcaMatch {
                    rca_id: doc.id,
                    filename: doc.filename.clone(),
                    project_name: doc.project_name.clone(),
                    problems: doc.problems.clone(),
                    solutions: doc.solutions.clone(),
                    root_causes: doc.root_causes.clone(),
                    similarity_score: similarity_from_distance(m.distance),
                });
            }
        }

        debug!("Found {} similar incidents", results.len());
        Ok(results)
    }
}

/// Map an index distance to a similarity score
///
/// `max(0, 1 - distance) * 100`, rounded to 2 decimals. The clamp keeps the
/// score inside [0, 100] even when the distance exceeds 1.
pub fn similarity_from_distance(distance: f64) -> f64 {
    let similarity = (1.0 - distance).max(0.0) * 100.0;
    (similarity * 100.0).round() / 100.0
}
