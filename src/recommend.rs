//! Recommendation generation module
//!
//! This module turns retrieved context into user-facing answers. Technical
//! mode builds a structured prompt from ranked similar incidents and asks the
//! model for a five-section remediation recommendation. General mode answers
//! questions over a summary of the whole knowledge base, blocking or
//! streamed. Generation failures degrade to a user-visible apology string;
//! store failures propagate.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{instrument, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::model::{LanguageModel, TextStream};
use crate::search::RcaMatch;
use crate::store::{RcaDocument, Store};

/// Fixed reply when similarity search finds nothing
pub const NO_MATCHES_MESSAGE: &str = "No similar problems were found in the knowledge base. \
     The knowledge base may need to be synced or expanded.";

/// Fixed reply when the knowledge base holds no documents
pub const EMPTY_KNOWLEDGE_BASE_MESSAGE: &str = "The RCA knowledge base is currently empty.";

/// Fragment emitted when a stream fails mid-flight
const STREAM_FAILURE_MESSAGE: &str = "Sorry, an error occurred while generating the response.";

/// Generates recommendations and general answers from the knowledge base
#[derive(Clone)]
pub struct Recommender {
    model: Arc<dyn LanguageModel>,
    store: Store,
    context_limit: usize,
}

impl Recommender {
    /// Create a new recommender
    pub fn new(model: Arc<dyn LanguageModel>, store: Store, config: &PipelineConfig) -> Self {
        Self {
            model,
            store,
            context_limit: config.general_context_limit,
        }
    }

    /// Generate a remediation recommendation from ranked similar incidents
    ///
    /// With no matches the fixed no-matches message is returned without
    /// calling the model.
    #[instrument(skip(self, matches), fields(matches = matches.len()))]
    pub async fn recommend(&self, problem: &str, matches: &[RcaMatch]) -> String {
        if matches.is_empty() {
            return NO_MATCHES_MESSAGE.to_string();
        }

        let prompt = build_recommendation_prompt(problem, matches);
        match self.model.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Recommendation generation failed: {}", e);
                apology(&e.to_string())
            }
        }
    }

    /// Answer a general question over the whole knowledge base
    #[instrument(skip(self))]
    pub async fn answer_general(&self, query: &str) -> Result<String> {
        let documents = self.store.list_documents().await?;
        if documents.is_empty() {
            return Ok(EMPTY_KNOWLEDGE_BASE_MESSAGE.to_string());
        }

        let prompt = build_general_prompt(query, &documents, self.context_limit);
        match self.model.generate(&prompt).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!("General answer generation failed: {}", e);
                Ok(apology(&e.to_string()))
            }
        }
    }

    /// Answer a general question as a stream of text fragments
    ///
    /// Fragments arrive in model order; a mid-stream failure yields a final
    /// apology fragment instead of an error.
    #[instrument(skip(self))]
    pub async fn answer_general_stream(&self, query: &str) -> Result<TextStream> {
        let documents = self.store.list_documents().await?;
        if documents.is_empty() {
            return Ok(one_shot(EMPTY_KNOWLEDGE_BASE_MESSAGE.to_string()));
        }

        let prompt = build_general_prompt(query, &documents, self.context_limit);
        let upstream = match self.model.generate_stream(&prompt).await {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!("General answer generation failed: {}", e);
                return Ok(one_shot(apology(&e.to_string())));
            }
        };

        let stream = async_stream::stream! {
            let mut upstream = upstream;
            while let Some(item) = upstream.next().await {
                match item {
                    Ok(fragment) => yield Ok(fragment),
                    Err(e) => {
                        warn!("Error during streaming: {}", e);
                        yield Ok(STREAM_FAILURE_MESSAGE.to_string());
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn apology(error: &str) -> String {
    format!(
        "I encountered an issue while generating a response. The error was: {}",
        error
    )
}

fn one_shot(text: String) -> TextStream {
    Box::pin(futures::stream::once(async move { Ok(text) }))
}

/// Build the technical-mode prompt from the problem and ranked incidents
fn build_recommendation_prompt(problem: &str, matches: &[RcaMatch]) -> String {
    let mut prompt = format!(
        "You are an expert Senior Site Reliability Engineer (SRE) and Root Cause Analysis \
         specialist.\n\
         Your task is to provide a comprehensive solution recommendation for a new problem \
         based on historical RCA data.\n\n\
         **Current Problem Description:**\n\
         \"{}\"\n\n\
         **Retrieved Similar Historical Incidents (ranked by relevance):**\n",
        problem
    );

    for (i, m) in matches.iter().enumerate() {
        prompt.push_str(&format!(
            "\n---\n\
             **Incident #{} (Similarity: {:.2}%)**\n\
             - **File:** {}\n\
             - **Project:** {}\n\
             - **Problem Summary:** {}\n\
             - **Identified Root Causes:** {}\n\
             - **Successful Solutions Applied:** {}\n",
            i + 1,
            m.similarity_score,
            m.filename,
            m.project_name.as_deref().unwrap_or("N/A"),
            m.problems.join("; "),
            m.root_causes.join("; "),
            m.solutions.join("; "),
        ));
    }

    prompt.push_str(
        "\n---\n\
         **Your Analysis and Recommendations:**\n\n\
         Based on your expert analysis of the current problem and the historical data provided, \
         generate a structured response with the following sections:\n\n\
         1.  **Problem Synopsis:** Briefly synthesize the user's current problem and explain \
         *why* the retrieved incidents are relevant. Highlight the common themes.\n\
         2.  **Top Recommended Solutions:** Provide a prioritized list of actionable solutions \
         derived from the most successful historical data. For each solution, explain the \
         reasoning behind its recommendation.\n\
         3.  **Step-by-Step Implementation Plan:** For the #1 recommended solution, provide a \
         clear, step-by-step guide for implementation.\n\
         4.  **Potential Risks and Mitigation:** What are the potential risks of implementing \
         the proposed solutions? Suggest ways to mitigate these risks.\n\
         5.  **Further Investigation Questions:** What clarifying questions should be asked to \
         get more context about the current problem? This will help refine the diagnosis.\n\n\
         Format your response using Markdown for clarity and readability.",
    );

    prompt
}

/// Build the general-mode prompt over a knowledge-base summary
///
/// The context block covers every document but is truncated to
/// `context_limit` characters to respect the model's input budget.
fn build_general_prompt(query: &str, documents: &[RcaDocument], context_limit: usize) -> String {
    let mut context =
        String::from("Here is a summary of all the RCA documents in the knowledge base:\n\n");
    for doc in documents {
        context.push_str(&format!(
            "--- Document: {} ---\n\
             Project: {}\n\
             Problems: {}\n\
             Solutions: {}\n\n",
            doc.filename,
            doc.project_name.as_deref().unwrap_or("N/A"),
            doc.problems.join(", "),
            doc.solutions.join(", "),
        ));
    }
    let context: String = context.chars().take(context_limit).collect();

    format!(
        "You are a helpful and knowledgeable RCA assistant. Your task is to answer the user's \
         question accurately based ONLY on the context provided below from the knowledge base. \
         If the answer is not contained within the provided context, state that you do not \
         have that specific information. \
         --- KNOWLEDGE BASE CONTEXT --- {} \
         --- USER'S QUESTION --- {} \
         --- YOUR ANSWER ---",
        context, query
    )
}
