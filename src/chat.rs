//! Chat pipeline module
//!
//! This module owns a routed chat turn: persist the user message, classify
//! the intent, answer through the technical specialist (similarity search +
//! recommendation) or the general assistant, and persist the reply.
//!
//! The streamed variant yields fragments in arrival order and persists the
//! full concatenation only after the stream is drained; a caller that drops
//! the stream mid-flight persists nothing, so a partial reply is never stored
//! as a complete message.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::model::{LanguageModel, TextStream};
use crate::recommend::Recommender;
use crate::router::{IntentClassifier, QueryIntent};
use crate::search::{RcaMatch, SimilaritySearch};
use crate::store::{MessageRole, Store};

/// A completed chat reply
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// The assistant's reply text
    pub text: String,

    /// Similar incidents backing a technical reply
    pub matches: Option<Vec<RcaMatch>>,
}

/// Routed chat over the knowledge base
#[derive(Clone)]
pub struct ChatPipeline {
    store: Store,
    router: Arc<dyn IntentClassifier>,
    search: SimilaritySearch,
    recommender: Recommender,
    top_n: usize,
}

impl ChatPipeline {
    /// Create a new chat pipeline
    pub fn new(
        store: Store,
        index: VectorIndex,
        model: Arc<dyn LanguageModel>,
        router: Arc<dyn IntentClassifier>,
        config: &PipelineConfig,
    ) -> Self {
        let search = SimilaritySearch::new(store.clone(), index, model.clone());
        let recommender = Recommender::new(model, store.clone(), config);
        Self {
            store,
            router,
            search,
            recommender,
            top_n: config.top_n,
        }
    }

    /// Handle one chat turn, blocking until the full reply is available
    #[instrument(skip(self, message))]
    pub async fn respond(&self, session_id: &str, message: &str) -> Result<ChatReply> {
        self.store
            .append_message(session_id, MessageRole::User, message, None)
            .await?;

        let intent = self.router.classify(message).await;
        debug!("Routing query as {}", intent);

        let reply = match intent {
            QueryIntent::TechnicalProblemSolving => {
                let matches = self.search.search(message, self.top_n).await?;
                let text = self.recommender.recommend(message, &matches).await;
                ChatReply {
                    text,
                    matches: if matches.is_empty() {
                        None
                    } else {
                        Some(matches)
                    },
                }
            }
            QueryIntent::GeneralKnowledgeQuery => ChatReply {
                text: self.recommender.answer_general(message).await?,
                matches: None,
            },
        };

        self.store
            .append_message(
                session_id,
                MessageRole::Assistant,
                &reply.text,
                reply.matches.as_deref(),
            )
            .await?;

        Ok(reply)
    }

    /// Handle one chat turn as a stream of reply fragments
    ///
    /// The assistant message is appended to the session only after the last
    /// fragment has been yielded.
    #[instrument(skip(self, message))]
    pub async fn respond_stream(&self, session_id: &str, message: &str) -> Result<TextStream> {
        self.store
            .append_message(session_id, MessageRole::User, message, None)
            .await?;

        let intent = self.router.classify(message).await;
        debug!("Routing query as {}", intent);

        let store = self.store.clone();
        let session_id = session_id.to_string();

        match intent {
            QueryIntent::TechnicalProblemSolving => {
                let matches = self.search.search(message, self.top_n).await?;
                let text = self.recommender.recommend(message, &matches).await;

                // The recommendation is produced whole, so it streams as a
                // single fragment
                let stream = async_stream::try_stream! {
                    yield text.clone();

                    let matched = if matches.is_empty() { None } else { Some(matches.as_slice()) };
                    store
                        .append_message(&session_id, MessageRole::Assistant, &text, matched)
                        .await?;
                };
                Ok(Box::pin(stream))
            }
            QueryIntent::GeneralKnowledgeQuery => {
                let upstream = self.recommender.answer_general_stream(message).await?;

                let stream = async_stream::try_stream! {
                    let mut upstream = upstream;
                    let mut full_text = String::new();

                    while let Some(fragment) = futures::StreamExt::next(&mut upstream).await {
                        let fragment = fragment?;
                        full_text.push_str(&fragment);
                        yield fragment;
                    }

                    store
                        .append_message(&session_id, MessageRole::Assistant, &full_text, None)
                        .await?;
                };
                Ok(Box::pin(stream))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::StreamExt;
    use tempfile::tempdir;

    use crate::index::VectorMetadata;
    use crate::model::MockModel;
    use crate::recommend::EMPTY_KNOWLEDGE_BASE_MESSAGE;
    use crate::router::LlmIntentRouter;
    use crate::store::NewDocument;

    const EXTRACTION_FIELDS: [&str; 3] = ["timeouts", "add retries", "slow query"];

    fn sample_document(filename: &str) -> NewDocument {
        NewDocument {
            filename: filename.to_string(),
            source_path: format!("incoming/{}", filename),
            project_name: Some("checkout".to_string()),
            problems: vec![EXTRACTION_FIELDS[0].to_string()],
            solutions: vec![EXTRACTION_FIELDS[1].to_string()],
            root_causes: vec![EXTRACTION_FIELDS[2].to_string()],
            lessons_learned: vec![],
            full_content: "full text".to_string(),
            content_hash: "hash".to_string(),
        }
    }

    async fn setup() -> (ChatPipeline, Store, VectorIndex, MockModel, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir
            .path()
            .join("recall.db")
            .to_string_lossy()
            .to_string();

        let db = libsql::Builder::new_local(&db_path).build().await.unwrap();
        let store = Store::new(db.connect().unwrap()).await.unwrap();
        let index = VectorIndex::new(db.connect().unwrap(), 4).await.unwrap();

        let model = MockModel::new();
        model.set_embedding(vec![1.0, 0.0, 0.0, 0.0]);

        let config = PipelineConfig::builder().embedding_dimensions(4).build();
        let router = Arc::new(LlmIntentRouter::new(Arc::new(model.clone())));
        let pipeline = ChatPipeline::new(
            store.clone(),
            index.clone(),
            Arc::new(model.clone()),
            router,
            &config,
        );

        (pipeline, store, index, model, temp_dir)
    }

    async fn seed_incident(store: &Store, index: &VectorIndex) {
        let id = store
            .upsert_document(&sample_document("incident.md"))
            .await
            .unwrap();
        index
            .upsert(
                &id.to_string(),
                &[1.0, 0.0, 0.0, 0.0],
                &VectorMetadata {
                    filename: "incident.md".to_string(),
                    project_name: Some("checkout".to_string()),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_technical_turn_persists_matches() {
        let (pipeline, store, index, model, _tmp) = setup().await;
        seed_incident(&store, &index).await;

        let session = store.create_session(None).await.unwrap();
        model.push_response("technical_problem_solving");
        model.push_response("Recommendation text");

        let reply = pipeline
            .respond(&session.id, "the database is timing out")
            .await
            .unwrap();

        assert_eq!(reply.text, "Recommendation text");
        let matches = reply.matches.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].filename, "incident.md");

        let messages = store.list_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert!(messages[0].matched_rcas.is_none());
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "Recommendation text");
        assert_eq!(messages[1].matched_rcas.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_general_turn_persists_without_matches() {
        let (pipeline, store, index, model, _tmp) = setup().await;
        seed_incident(&store, &index).await;

        let session = store.create_session(None).await.unwrap();
        model.push_response("general_knowledge_query");
        model.push_response("There is one RCA.");

        let reply = pipeline
            .respond(&session.id, "how many RCAs do you have?")
            .await
            .unwrap();

        assert_eq!(reply.text, "There is one RCA.");
        assert!(reply.matches.is_none());

        let messages = store.list_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].matched_rcas.is_none());
    }

    #[tokio::test]
    async fn test_technical_turn_with_empty_base_stores_no_matches() {
        let (pipeline, store, _index, model, _tmp) = setup().await;

        let session = store.create_session(None).await.unwrap();
        model.push_response("technical_problem_solving");

        let reply = pipeline
            .respond(&session.id, "the database is timing out")
            .await
            .unwrap();

        // No matches means the fixed message without a generation call for it
        assert!(reply.text.contains("No similar problems"));
        assert!(reply.matches.is_none());
        assert_eq!(model.generation_calls(), 1); // intent classification only

        let messages = store.list_messages(&session.id).await.unwrap();
        assert!(messages[1].matched_rcas.is_none());
    }

    #[tokio::test]
    async fn test_streamed_general_turn_persists_after_drain() {
        let (pipeline, store, index, model, _tmp) = setup().await;
        seed_incident(&store, &index).await;

        let session = store.create_session(None).await.unwrap();
        model.push_response("general_knowledge_query");
        model.push_response("a streamed answer split into several fragments");

        let stream = pipeline
            .respond_stream(&session.id, "tell me about the knowledge base")
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect::<Vec<_>>().await;

        assert!(fragments.len() > 1);
        let full: String = fragments.concat();
        assert_eq!(full, "a streamed answer split into several fragments");

        let messages = store.list_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, full);
        assert!(messages[1].matched_rcas.is_none());
    }

    #[tokio::test]
    async fn test_streamed_technical_turn_persists_matches() {
        let (pipeline, store, index, model, _tmp) = setup().await;
        seed_incident(&store, &index).await;

        let session = store.create_session(None).await.unwrap();
        model.push_response("technical_problem_solving");
        model.push_response("Recommendation text");

        let stream = pipeline
            .respond_stream(&session.id, "the database is timing out")
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect::<Vec<_>>().await;

        assert_eq!(fragments, vec!["Recommendation text".to_string()]);

        let messages = store.list_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].matched_rcas.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_stream_persists_no_assistant_message() {
        let (pipeline, store, index, model, _tmp) = setup().await;
        seed_incident(&store, &index).await;

        let session = store.create_session(None).await.unwrap();
        model.push_response("general_knowledge_query");
        model.push_response("an answer that will never be delivered");

        let stream = pipeline
            .respond_stream(&session.id, "tell me about the knowledge base")
            .await
            .unwrap();
        // Caller disconnects before consuming anything
        drop(stream);

        let messages = store.list_messages(&session.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_general_turn_on_empty_base() {
        let (pipeline, store, _index, model, _tmp) = setup().await;

        let session = store.create_session(None).await.unwrap();
        model.push_response("general_knowledge_query");

        let reply = pipeline.respond(&session.id, "what do you know?").await.unwrap();
        assert_eq!(reply.text, EMPTY_KNOWLEDGE_BASE_MESSAGE);
    }
}
