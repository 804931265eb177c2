//! HTTP client implementation for the Gemini API
//!
//! This module provides the HTTP client for making requests to the Gemini API.
//! It handles authentication, request formatting, and response parsing, and can
//! be configured to automatically retry requests when rate limited (HTTP 429
//! responses) via the `retry_on_rate_limit`, `max_retries`, and
//! `default_retry_after_secs` options in the `HttpOptions` struct.

use crate::error::{Error, Result};
use crate::gemini::prelude::HttpOptions;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// HTTP client for making requests to the Gemini API
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: ReqwestClient,

    /// Base URL for API requests
    base_url: String,

    /// API key for authentication
    api_key: String,

    /// API version
    api_version: String,

    /// Whether to automatically retry requests when rate limited
    retry_on_rate_limit: bool,

    /// Maximum number of retry attempts for rate-limited requests
    max_retries: u32,

    /// Default retry delay in seconds if no Retry-After header is provided
    default_retry_after_secs: u64,
}

#[cfg(test)]
impl HttpClient {
    /// Set the base URL (for testing only)
    pub fn set_base_url(&mut self, url: String) {
        self.base_url = url;
    }
}

impl HttpClient {
    /// Create a new HTTP client with an API key
    pub fn with_api_key(api_key: String) -> Self {
        Self::with_api_key_and_options(api_key, HttpOptions::default())
    }

    /// Create a new HTTP client with an API key and custom options
    pub fn with_api_key_and_options(api_key: String, options: HttpOptions) -> Self {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key,
            api_version: options.api_version,
            retry_on_rate_limit: options.retry_on_rate_limit,
            max_retries: options.max_retries,
            default_retry_after_secs: options.default_retry_after_secs,
        }
    }

    /// Build a URL for the Gemini API
    fn build_url(&self, path: &str) -> Result<Url> {
        let url = format!("{}/{}/{}", self.base_url, self.api_version, path);
        Url::parse(&url).map_err(|e| Error::Other(format!("Invalid URL: {}", e)))
    }

    /// Prepare a POST request with a JSON body
    #[instrument(skip(self, body), level = "debug")]
    pub async fn post<T: DeserializeOwned, B: Serialize + std::fmt::Debug>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path)?;

        let request = self
            .client
            .post(url)
            .json(body)
            .query(&[("key", &self.api_key)]);

        debug!("Sending POST request to {}", path);
        self.execute_request(request).await
    }

    /// Prepare a POST request whose response body is consumed as a stream
    ///
    /// Returns the raw response so the caller can read incremental chunks
    /// (used for server-sent-events generation). Rate-limit retries are not
    /// applied here; a 429 surfaces as `Error::RateLimit`.
    #[instrument(skip(self, body), level = "debug")]
    pub async fn post_stream<B: Serialize + std::fmt::Debug>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response> {
        let url = self.build_url(path)?;

        let response = self
            .client
            .post(url)
            .json(body)
            .query(&[("key", &self.api_key), ("alt", &"sse".to_string())])
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = retry_after_secs(&response).unwrap_or(self.default_retry_after_secs);
        let response_text = response.text().await.map_err(Error::Http)?;
        error!("API error: {} - {}", status, response_text);

        Err(status_error(status, retry_after, response_text))
    }

    /// Execute an HTTP request and handle the response
    async fn execute_request<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let mut attempts = 0;

        loop {
            // Clone the request builder for each attempt
            let request_clone = request
                .try_clone()
                .ok_or_else(|| Error::Other("Failed to clone request for retry".to_string()))?;

            let response = request_clone.send().await.map_err(Error::Http)?;
            let status = response.status();

            // Check for rate limit response
            if status == StatusCode::TOO_MANY_REQUESTS {
                attempts += 1;

                let retry_after =
                    retry_after_secs(&response).unwrap_or(self.default_retry_after_secs);

                let response_text = response.text().await.map_err(Error::Http)?;
                error!("API error: {} - {}", status, response_text);

                // Check if we should retry
                if self.retry_on_rate_limit && attempts <= self.max_retries {
                    // Exponential backoff capped at 60 seconds
                    let exp_factor = u64::pow(2, attempts - 1);
                    let delay = std::cmp::min(retry_after.saturating_mul(exp_factor), 60);

                    debug!(
                        "Rate limited. Retrying after {} seconds (attempt {}/{})",
                        delay, attempts, self.max_retries
                    );

                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    continue;
                }

                // If we're not retrying or have exceeded max retries, return the error
                return Err(Error::RateLimit {
                    retry_after_secs: retry_after,
                });
            }

            // For non-rate-limit responses, process normally
            let response_text = response.text().await.map_err(Error::Http)?;

            if status.is_success() {
                return serde_json::from_str(&response_text).map_err(|e| {
                    error!("Failed to parse response: {}", e);
                    Error::UnexpectedResponse(format!("Failed to parse response: {}", e))
                });
            } else {
                error!("API error: {} - {}", status, response_text);
                return Err(status_error(status, self.default_retry_after_secs, response_text));
            }
        }
    }
}

/// Extract the Retry-After header value in seconds, if present
fn retry_after_secs(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}

/// Map a non-success status to an error
fn status_error(status: StatusCode, retry_after_secs: u64, message: String) -> Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Error::Auth("Invalid API key or credentials".to_string())
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Error::RateLimit { retry_after_secs }
    } else {
        Error::Api {
            status_code: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TestResponse {
        message: String,
    }

    #[tokio::test]
    async fn test_post_request_success() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("POST", "/v1beta/test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"message\": \"success\"}")
            .match_query(mockito::Matcher::Any)
            .expect(1)
            .create_async()
            .await;

        let mut client = HttpClient::with_api_key("test-key".to_string());
        client.set_base_url(server.url());

        let body = serde_json::json!({"test": "data"});
        let response: TestResponse = client.post("test", &body).await.unwrap();
        assert_eq!(response.message, "success");

        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_handling() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("POST", "/v1beta/test")
            .with_status(500)
            .with_body("Internal Server Error")
            .match_query(mockito::Matcher::Any)
            .create_async()
            .await;

        let mut client = HttpClient::with_api_key("test-key".to_string());
        client.set_base_url(server.url());

        let body = serde_json::json!({"test": "data"});
        let result: Result<TestResponse> = client.post("test", &body).await;
        assert!(matches!(result, Err(Error::Api { status_code: 500, .. })));

        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_auth_error() {
        let mut server = Server::new_async().await;
        let _mock_server = server
            .mock("POST", "/v1beta/test")
            .with_status(401)
            .with_body("Unauthorized")
            .match_query(mockito::Matcher::Any)
            .create_async()
            .await;

        let mut client = HttpClient::with_api_key("bad-key".to_string());
        client.set_base_url(server.url());

        let body = serde_json::json!({});
        let result: Result<TestResponse> = client.post("test", &body).await;
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_retry_success() {
        let mut server = Server::new_async().await;

        // First request returns 429 Too Many Requests
        let mock_rate_limit = server
            .mock("POST", "/v1beta/test")
            .with_status(429)
            .with_header("retry-after", "1")
            .with_body("{\"error\": {\"code\": 429, \"status\": \"RESOURCE_EXHAUSTED\"}}")
            .match_query(mockito::Matcher::Any)
            .expect(1)
            .create_async()
            .await;

        // Second request succeeds
        let mock_success = server
            .mock("POST", "/v1beta/test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"message\": \"success after retry\"}")
            .match_query(mockito::Matcher::Any)
            .expect(1)
            .create_async()
            .await;

        // Create client with rate limit retry enabled
        let options = HttpOptions {
            retry_on_rate_limit: true,
            default_retry_after_secs: 1,
            ..HttpOptions::default()
        };

        let mut client = HttpClient::with_api_key_and_options("test-key".to_string(), options);
        client.set_base_url(server.url());

        let body = serde_json::json!({});
        let response: TestResponse = client.post("test", &body).await.unwrap();
        assert_eq!(response.message, "success after retry");

        mock_rate_limit.assert_async().await;
        mock_success.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_max_retries_exceeded() {
        let mut server = Server::new_async().await;

        // Mock that always returns 429
        let mock_rate_limit = server
            .mock("POST", "/v1beta/test")
            .with_status(429)
            .with_header("retry-after", "1")
            .with_body("{\"error\": {\"code\": 429, \"status\": \"RESOURCE_EXHAUSTED\"}}")
            .match_query(mockito::Matcher::Any)
            .expect(2) // Expect initial request + 1 retry
            .create_async()
            .await;

        let options = HttpOptions {
            retry_on_rate_limit: true,
            max_retries: 1,
            default_retry_after_secs: 1,
            ..HttpOptions::default()
        };

        let mut client = HttpClient::with_api_key_and_options("test-key".to_string(), options);
        client.set_base_url(server.url());

        let body = serde_json::json!({});
        let result: Result<TestResponse> = client.post("test", &body).await;
        assert!(matches!(
            result,
            Err(Error::RateLimit {
                retry_after_secs: 1
            })
        ));

        mock_rate_limit.assert_async().await;
    }
}
