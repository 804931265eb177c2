//! # Mock Language Model for Testing
//!
//! Provides a `MockModel` that implements the `LanguageModel` trait for use in
//! tests. It allows scripting responses, injecting failures, and counting
//! calls to verify how many generation and embedding requests a pipeline
//! actually issued.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;

use crate::error::{Error, Result};
use crate::model::{LanguageModel, TextStream};

/// Number of characters per fragment yielded by the mock stream
const STREAM_FRAGMENT_CHARS: usize = 8;

/// A mock language model for testing purposes.
///
/// Scripted responses are consumed front-to-back; when the queue is empty the
/// default response is returned. The same text source feeds both the blocking
/// and the streamed path, so a streamed reply concatenates to the blocking one.
#[derive(Debug, Clone, Default)]
pub struct MockModel {
    responses: Arc<Mutex<VecDeque<String>>>,
    default_response: Arc<Mutex<String>>,
    embedding: Arc<Mutex<Vec<f32>>>,
    fail_generation: Arc<AtomicBool>,
    generation_calls: Arc<AtomicUsize>,
    embedding_calls: Arc<AtomicUsize>,
}

impl MockModel {
    /// Creates a new mock model that returns an empty response by default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock model with a fixed default response.
    pub fn with_response(text: &str) -> Self {
        let model = Self::new();
        model.set_default_response(text);
        model
    }

    /// Sets the response returned whenever the scripted queue is empty.
    pub fn set_default_response(&self, text: &str) {
        *self.default_response.lock().unwrap() = text.to_string();
    }

    /// Queues a scripted response, consumed by the next generation call.
    pub fn push_response(&self, text: &str) {
        self.responses.lock().unwrap().push_back(text.to_string());
    }

    /// Sets the vector returned by `embed`.
    pub fn set_embedding(&self, vector: Vec<f32>) {
        *self.embedding.lock().unwrap() = vector;
    }

    /// Makes generation calls fail until reset.
    pub fn fail_generation(&self, fail: bool) {
        self.fail_generation.store(fail, Ordering::SeqCst);
    }

    /// Number of generation calls issued so far (blocking and streamed).
    pub fn generation_calls(&self) -> usize {
        self.generation_calls.load(Ordering::SeqCst)
    }

    /// Number of embedding calls issued so far.
    pub fn embedding_calls(&self) -> usize {
        self.embedding_calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> String {
        let mut queue = self.responses.lock().unwrap();
        queue
            .pop_front()
            .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.generation_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_generation.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status_code: 500,
                message: "mock generation failure".to_string(),
            });
        }
        Ok(self.next_response())
    }

    async fn generate_stream(&self, _prompt: &str) -> Result<TextStream> {
        self.generation_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_generation.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status_code: 500,
                message: "mock generation failure".to_string(),
            });
        }
        let text = self.next_response();
        let fragments: Vec<Result<String>> = text
            .chars()
            .collect::<Vec<_>>()
            .chunks(STREAM_FRAGMENT_CHARS)
            .map(|chunk| Ok(chunk.iter().collect()))
            .collect();
        Ok(Box::pin(stream::iter(fragments)))
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.embedding_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.embedding.lock().unwrap().clone())
    }
}
