//! Sync orchestration module
//!
//! This module reconciles an external document source against the knowledge
//! store and the vector index. Content hashes gate the expensive work: only
//! new or changed documents are downloaded, extracted, and re-embedded, so an
//! unchanged document costs no model calls. One bad document never aborts a
//! run; store and index failures do.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::extractor::{DocumentExtractor, RcaFields};
use crate::index::{VectorIndex, VectorMetadata};
use crate::model::LanguageModel;
use crate::source::BlobSource;
use crate::store::{NewDocument, Store};

/// Counts of per-document outcomes for a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Newly ingested documents
    pub processed: usize,

    /// Documents re-ingested because their hash changed
    pub updated: usize,

    /// Documents left untouched because their hash matched
    pub skipped: usize,

    /// Documents that failed to download, decode, extract, or embed
    pub errors: usize,
}

/// Outcome of a single document within a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Newly ingested
    Processed,
    /// Re-ingested with a changed hash
    Updated,
    /// Unchanged, no work performed
    Skipped,
    /// Failed and skipped until the next run
    Failed,
}

/// Per-document progress event emitted during a sync run
#[derive(Debug, Clone)]
pub struct SyncEvent {
    /// Name of the document
    pub filename: String,

    /// What happened to it
    pub outcome: SyncOutcome,
}

/// Reconciles an external source with the store and the index
#[derive(Clone)]
pub struct SyncPipeline {
    store: Store,
    index: VectorIndex,
    extractor: DocumentExtractor,
    model: Arc<dyn LanguageModel>,
}

impl SyncPipeline {
    /// Create a new sync pipeline
    pub fn new(
        store: Store,
        index: VectorIndex,
        model: Arc<dyn LanguageModel>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            index,
            extractor: DocumentExtractor::new(model.clone(), config),
            model,
        }
    }

    /// Run a full sync against a source
    pub async fn run(&self, source: &dyn BlobSource) -> Result<SyncReport> {
        self.run_with_progress(source, None).await
    }

    /// Run a full sync, reporting per-document outcomes to a channel
    #[instrument(skip(self, source, progress))]
    pub async fn run_with_progress(
        &self,
        source: &dyn BlobSource,
        progress: Option<mpsc::Sender<SyncEvent>>,
    ) -> Result<SyncReport> {
        let blobs = source.list().await?;
        // One hash-map load per run, not one query per file
        let existing = self.store.document_hashes().await?;

        let mut report = SyncReport::default();

        for blob in blobs {
            let filename = blob
                .name
                .rsplit('/')
                .next()
                .unwrap_or(blob.name.as_str())
                .to_string();

            if existing.get(&filename) == Some(&blob.content_hash) {
                report.skipped += 1;
                emit(&progress, &filename, SyncOutcome::Skipped).await;
                continue;
            }

            let bytes = match source.download(&blob).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to download {}: {}", filename, e);
                    report.errors += 1;
                    emit(&progress, &filename, SyncOutcome::Failed).await;
                    continue;
                }
            };

            let extracted = match self.extractor.extract(&bytes, &filename).await {
                Ok(extracted) => extracted,
                Err(e) => {
                    warn!("Error processing file {}: {}", filename, e);
                    report.errors += 1;
                    emit(&progress, &filename, SyncOutcome::Failed).await;
                    continue;
                }
            };

            // Embed before writing to the store: a failed embedding must leave
            // the stored hash unmatched so the document retries next run
            let embedding = match self.model.embed(&embedding_input(&extracted.fields)).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!("Failed to embed {}: {}", filename, e);
                    report.errors += 1;
                    emit(&progress, &filename, SyncOutcome::Failed).await;
                    continue;
                }
            };

            let document = NewDocument {
                filename: filename.clone(),
                source_path: blob.name.clone(),
                project_name: extracted.fields.project_name.clone(),
                problems: extracted.fields.problems.clone(),
                solutions: extracted.fields.solutions.clone(),
                root_causes: extracted.fields.root_causes.clone(),
                lessons_learned: extracted.fields.lessons_learned.clone(),
                full_content: extracted.full_content,
                content_hash: blob.content_hash.clone(),
            };

            // Store and index failures are infrastructure errors and abort the run
            let id = self.store.upsert_document(&document).await?;
            self.index
                .upsert(
                    &id.to_string(),
                    &embedding,
                    &VectorMetadata {
                        filename: filename.clone(),
                        project_name: document.project_name.clone(),
                    },
                )
                .await?;

            let outcome = if existing.contains_key(&filename) {
                report.updated += 1;
                SyncOutcome::Updated
            } else {
                report.processed += 1;
                SyncOutcome::Processed
            };
            emit(&progress, &filename, outcome).await;
        }

        info!(
            "Sync completed: {} processed, {} updated, {} skipped, {} errors",
            report.processed, report.updated, report.skipped, report.errors
        );
        Ok(report)
    }
}

/// Compose the embedding input from the extracted fields
fn embedding_input(fields: &RcaFields) -> String {
    format!(
        "Project: {}\nProblems: {}\nRoot Causes: {}\nSolutions: {}",
        fields.project_name.as_deref().unwrap_or("N/A"),
        fields.problems.join(", "),
        fields.root_causes.join(", "),
        fields.solutions.join(", "),
    )
}

async fn emit(progress: &Option<mpsc::Sender<SyncEvent>>, filename: &str, outcome: SyncOutcome) {
    if let Some(sender) = progress {
        // Ignore errors from sending (e.g., if the receiver is dropped)
        let _ = sender
            .send(SyncEvent {
                filename: filename.to_string(),
                outcome,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    use crate::model::MockModel;
    use crate::source::MemorySource;

    const EXTRACTION_JSON: &str = r#"{
        "project_name": "checkout",
        "problems": ["API latency spiked"],
        "solutions": ["Scaled out the pool"],
        "root_causes": ["Connection pool exhausted"],
        "lessons_learned": ["Alert on pool saturation"]
    }"#;

    async fn setup() -> (SyncPipeline, Store, VectorIndex, MockModel, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir
            .path()
            .join("recall.db")
            .to_string_lossy()
            .to_string();

        let db = libsql::Builder::new_local(&db_path).build().await.unwrap();
        let store = Store::new(db.connect().unwrap()).await.unwrap();
        let index = VectorIndex::new(db.connect().unwrap(), 4).await.unwrap();

        let model = MockModel::with_response(EXTRACTION_JSON);
        model.set_embedding(vec![1.0, 0.0, 0.0, 0.0]);

        let config = PipelineConfig::builder().embedding_dimensions(4).build();
        let pipeline = SyncPipeline::new(
            store.clone(),
            index.clone(),
            Arc::new(model.clone()),
            &config,
        );

        (pipeline, store, index, model, temp_dir)
    }

    #[tokio::test]
    async fn test_first_run_processes_everything() {
        let (pipeline, store, index, model, _tmp) = setup().await;

        let source = MemorySource::new();
        source.insert("a.md", b"incident a".to_vec());
        source.insert("b.md", b"incident b".to_vec());

        let report = pipeline.run(&source).await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                processed: 2,
                updated: 0,
                skipped: 0,
                errors: 0
            }
        );
        assert_eq!(store.document_count().await.unwrap(), 2);
        assert_eq!(model.generation_calls(), 2);
        assert_eq!(model.embedding_calls(), 2);

        let matches = index.query(&[1.0, 0.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_documents_are_skipped_without_model_calls() {
        let (pipeline, _store, _index, model, _tmp) = setup().await;

        let source = MemorySource::new();
        source.insert("a.md", b"incident a".to_vec());
        source.insert("b.md", b"incident b".to_vec());

        pipeline.run(&source).await.unwrap();
        let generations = model.generation_calls();
        let embeddings = model.embedding_calls();

        let report = pipeline.run(&source).await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                processed: 0,
                updated: 0,
                skipped: 2,
                errors: 0
            }
        );
        // The second run performed no extraction or embedding calls
        assert_eq!(model.generation_calls(), generations);
        assert_eq!(model.embedding_calls(), embeddings);
    }

    #[tokio::test]
    async fn test_changed_document_updates_in_place() {
        let (pipeline, store, _index, model, _tmp) = setup().await;

        let source = MemorySource::new();
        source.insert("a.md", b"incident v1".to_vec());
        pipeline.run(&source).await.unwrap();

        let original_id = store.document_id("a.md").await.unwrap().unwrap();
        let generations = model.generation_calls();
        let embeddings = model.embedding_calls();

        source.insert("a.md", b"incident v2".to_vec());
        let report = pipeline.run(&source).await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                processed: 0,
                updated: 1,
                skipped: 0,
                errors: 0
            }
        );
        // Exactly one extraction and one embedding call for the change
        assert_eq!(model.generation_calls(), generations + 1);
        assert_eq!(model.embedding_calls(), embeddings + 1);
        // The id survives the update
        let updated_id = store.document_id("a.md").await.unwrap().unwrap();
        assert_eq!(original_id, updated_id);
        assert_eq!(store.document_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_one_bad_document_does_not_abort_the_run() {
        let (pipeline, store, _index, model, _tmp) = setup().await;

        let source = MemorySource::new();
        source.insert("bad.md", b"unparseable".to_vec());
        source.insert("good.md", b"incident".to_vec());

        // bad.md is processed first (sources list in name order)
        model.push_response("this is not json");

        let report = pipeline.run(&source).await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                processed: 1,
                updated: 0,
                skipped: 0,
                errors: 1
            }
        );
        assert_eq!(store.document_count().await.unwrap(), 1);
        // The failed document left no stored hash, so the next run retries it
        let hashes = store.document_hashes().await.unwrap();
        assert!(!hashes.contains_key("bad.md"));
        assert!(hashes.contains_key("good.md"));
    }

    #[tokio::test]
    async fn test_unsupported_extension_counts_as_error_without_model_call() {
        let (pipeline, _store, _index, model, _tmp) = setup().await;

        let source = MemorySource::new();
        source.insert("image.png", b"\x89PNG".to_vec());

        let report = pipeline.run(&source).await.unwrap();

        assert_eq!(report.errors, 1);
        assert_eq!(model.generation_calls(), 0);
        assert_eq!(model.embedding_calls(), 0);
    }

    #[tokio::test]
    async fn test_progress_events_cover_every_document() {
        let (pipeline, _store, _index, _model, _tmp) = setup().await;

        let source = MemorySource::new();
        source.insert("a.md", b"incident a".to_vec());
        source.insert("b.md", b"incident b".to_vec());

        let (tx, mut rx) = mpsc::channel(16);
        pipeline.run_with_progress(&source, Some(tx)).await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.outcome == SyncOutcome::Processed));
    }

    #[test]
    fn test_embedding_input_format() {
        let fields = RcaFields {
            project_name: Some("checkout".to_string()),
            problems: vec!["a".to_string(), "b".to_string()],
            solutions: vec!["s".to_string()],
            root_causes: vec!["r".to_string()],
            lessons_learned: vec![],
        };

        let input = embedding_input(&fields);
        assert_eq!(
            input,
            "Project: checkout\nProblems: a, b\nRoot Causes: r\nSolutions: s"
        );
    }
}
