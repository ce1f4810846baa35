//! Embedding client for OpenAI-compatible `/embeddings` endpoints.
//!
//! Blocking `reqwest` client. Transient failures (429, 5xx, connect or
//! timeout errors) are retried here with exponential backoff so callers only
//! ever see a final success or a hard failure.
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Embedder, EmbedderError};

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    send_dimensions: bool,
    max_attempts: usize,
}

impl OpenAiEmbedder {
    /// Build a client for `{base_url}/embeddings`.
    ///
    /// `dimensions` is enforced on every returned vector. It is only sent to
    /// the API after [`OpenAiEmbedder::request_dimensions`], since older
    /// models and many compatible servers reject the field. `max_attempts`
    /// counts the first request too and is clamped to at least one.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimensions: usize,
        timeout: Duration,
        max_attempts: usize,
    ) -> Result<Self, EmbedderError> {
        if api_key.trim().is_empty() {
            return Err(EmbedderError::Config("missing API key".into()));
        }
        if model.trim().is_empty() {
            return Err(EmbedderError::Config("missing model name".into()));
        }
        if dimensions == 0 {
            return Err(EmbedderError::Config("dimensions must be positive".into()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| EmbedderError::Config(format!("invalid API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbedderError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: embeddings_endpoint(base_url),
            model: model.to_string(),
            dimensions,
            send_dimensions: false,
            max_attempts: max_attempts.max(1),
        })
    }

    /// Ask the API to shorten its vectors to `dimensions`.
    #[must_use]
    pub fn request_dimensions(mut self, enabled: bool) -> Self {
        self.send_dimensions = enabled;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, inputs: &'a [&'a str]) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.send_dimensions.then_some(self.dimensions),
        }
    }

    fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let request = self.build_request(inputs);

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp.json().map_err(|e| {
                            EmbedderError::Request(format!("invalid response body: {e}"))
                        })?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        return self.check(parsed, inputs.len());
                    }

                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt < self.max_attempts {
                        warn!("Embedding API returned {status}, retrying (attempt {attempt})");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(EmbedderError::Api {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    if is_retryable(&e) && attempt < self.max_attempts {
                        warn!("Embedding request failed: {e}, retrying (attempt {attempt})");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(EmbedderError::Request(e.to_string()));
                }
            }
        }
    }

    fn check(
        &self,
        parsed: EmbeddingResponse,
        expected_count: usize,
    ) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if parsed.data.is_empty() {
            return Err(EmbedderError::EmptyResponse);
        }
        if parsed.data.len() != expected_count {
            return Err(EmbedderError::Request(format!(
                "API returned {} embeddings for {} inputs",
                parsed.data.len(),
                expected_count
            )));
        }
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimensions,
                actual: bad.len(),
            });
        }
        debug!("Embedded {} input(s) with {}", vectors.len(), self.model);
        Ok(vectors)
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.request(&[text])?
            .into_iter()
            .next()
            .ok_or(EmbedderError::EmptyResponse)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn embeddings_endpoint(base_url: &str) -> String {
    format!("{}/embeddings", base_url.trim_end_matches('/'))
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}
