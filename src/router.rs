//! Intent routing module
//!
//! This module classifies a free-text query into one of two intents so the
//! chat pipeline can pick a generation path: a technical problem gets the
//! retrieval-augmented specialist, everything else the general assistant.
//!
//! The classifier sits behind a trait so a stricter implementation can be
//! substituted without touching callers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::model::LanguageModel;

/// The two generation paths a query can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// The user describes a live technical problem and wants a solution
    TechnicalProblemSolving,
    /// The user asks about the knowledge base or converses generally
    GeneralKnowledgeQuery,
}

impl QueryIntent {
    /// The label used in prompts and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::TechnicalProblemSolving => "technical_problem_solving",
            QueryIntent::GeneralKnowledgeQuery => "general_knowledge_query",
        }
    }
}

impl std::fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract for classifying a query into an intent
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify a query; implementations must not fail, degrading to the
    /// safer general path instead
    async fn classify(&self, query: &str) -> QueryIntent;
}

/// LLM-backed intent classifier
///
/// The model reply is matched on the substring `technical_problem_solving`
/// rather than strict equality; this deliberately tolerates verbose model
/// output.
pub struct LlmIntentRouter {
    model: Arc<dyn LanguageModel>,
}

impl LlmIntentRouter {
    /// Create a new router
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentRouter {
    #[instrument(skip(self))]
    async fn classify(&self, query: &str) -> QueryIntent {
        let prompt = build_classification_prompt(query);

        match self.model.generate(&prompt).await {
            Ok(response) => {
                let response = response.to_lowercase();
                let response = response.trim();
                let intent = if response.contains("technical_problem_solving") {
                    QueryIntent::TechnicalProblemSolving
                } else {
                    QueryIntent::GeneralKnowledgeQuery
                };
                debug!("Classified query as {}", intent);
                intent
            }
            Err(e) => {
                warn!("Intent classification failed, defaulting to general query: {}", e);
                QueryIntent::GeneralKnowledgeQuery
            }
        }
    }
}

/// Build the two-category classification prompt
fn build_classification_prompt(query: &str) -> String {
    format!(
        "You are a high-level query routing system. Your only job is to classify the user's \
         request into one of two categories.\n\n\
         Categories:\n\
         1. \"technical_problem_solving\": The user is describing a live, ongoing technical \
         problem, an error, or a system failure and is looking for a solution. Examples: \
         \"The database is timing out again\", \"I'm getting 500 errors on the checkout page\", \
         \"Our main VM just crashed\".\n\
         2. \"general_knowledge_query\": The user is asking a question *about* the knowledge \
         base (e.g., \"how many...\", \"list...\", \"tell me about...\"), or is having a \
         general conversation.\n\n\
         User Query: \"{}\"\n\n\
         Analyze the query and respond with just the category name.\n\
         Example response: general_knowledge_query",
        query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockModel;

    fn router_with(model: &MockModel) -> LlmIntentRouter {
        LlmIntentRouter::new(Arc::new(model.clone()))
    }

    #[tokio::test]
    async fn test_technical_problem_routes_to_specialist() {
        let model = MockModel::new();
        model.push_response("technical_problem_solving");
        let router = router_with(&model);

        let intent = router.classify("the database is timing out").await;
        assert_eq!(intent, QueryIntent::TechnicalProblemSolving);
    }

    #[tokio::test]
    async fn test_knowledge_question_routes_to_generalist() {
        let model = MockModel::new();
        model.push_response("general_knowledge_query");
        let router = router_with(&model);

        let intent = router.classify("how many RCAs do you have?").await;
        assert_eq!(intent, QueryIntent::GeneralKnowledgeQuery);
    }

    #[tokio::test]
    async fn test_verbose_reply_matches_by_substring() {
        let model = MockModel::new();
        model.push_response("The category is: TECHNICAL_PROBLEM_SOLVING, because...");
        let router = router_with(&model);

        let intent = router.classify("checkout page is down").await;
        assert_eq!(intent, QueryIntent::TechnicalProblemSolving);
    }

    #[tokio::test]
    async fn test_unrecognized_reply_defaults_to_general() {
        let model = MockModel::with_response("no idea");
        let router = router_with(&model);

        let intent = router.classify("anything").await;
        assert_eq!(intent, QueryIntent::GeneralKnowledgeQuery);
    }

    #[tokio::test]
    async fn test_generation_error_defaults_to_general() {
        let model = MockModel::new();
        model.fail_generation(true);
        let router = router_with(&model);

        let intent = router.classify("the database is timing out").await;
        assert_eq!(intent, QueryIntent::GeneralKnowledgeQuery);
    }

    #[test]
    fn test_prompt_embeds_query() {
        let prompt = build_classification_prompt("my query");
        assert!(prompt.contains("\"my query\""));
        assert!(prompt.contains("technical_problem_solving"));
        assert!(prompt.contains("general_knowledge_query"));
    }
}
