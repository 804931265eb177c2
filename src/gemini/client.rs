//! Client implementation for the Gemini API
//!
//! This module provides the main client interface for interacting with the Gemini API.

use crate::gemini::http::HttpClient;
use crate::gemini::models::ModelsService;
use crate::gemini::prelude::HttpOptions;

/// Client for the Gemini API
///
/// This is the main entry point for interacting with the Gemini API.
/// It provides access to the models service for generation and embedding.
#[derive(Clone)]
pub struct Client {
    http_client: HttpClient,
}

impl Client {
    /// Create a new client with an API key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let http_client = HttpClient::with_api_key(api_key.into());
        Self { http_client }
    }

    /// Create a new client with an API key and custom HTTP options
    pub fn with_options(api_key: impl Into<String>, options: HttpOptions) -> Self {
        let http_client = HttpClient::with_api_key_and_options(api_key.into(), options);
        Self { http_client }
    }

    /// Create a new client that retries automatically when rate limited
    ///
    /// This is a convenience method for long-running ingestion jobs where a
    /// transient 429 should not abort the whole run.
    pub fn with_api_key_rate_limited(api_key: impl Into<String>) -> Self {
        let options = HttpOptions {
            retry_on_rate_limit: true,
            max_retries: 5,
            default_retry_after_secs: 2,
            ..HttpOptions::default()
        };
        Self::with_options(api_key, options)
    }

    /// Access the models service
    pub fn models(&self) -> ModelsService {
        ModelsService::new(self.http_client.clone())
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(api_key: impl Into<String>, base_url: String) -> Self {
        let mut http_client = HttpClient::with_api_key(api_key.into());
        http_client.set_base_url(base_url);
        Self { http_client }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_with_api_key() {
        let client = Client::with_api_key("test-api-key");
        // The models service is constructed from the shared HTTP client
        let _ = client.models();
    }
}
