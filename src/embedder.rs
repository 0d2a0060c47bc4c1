//! Embedding service client.
//!
//! The embedding model is an opaque external service reached over HTTP
//! (Ollama-compatible). The trait seam keeps retrievers and tests
//! independent of the wire protocol; any service failure surfaces as
//! [`Error::EmbeddingUnavailable`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    passage::Passage,
};

/// An external text-embedding service.
///
/// Assumed deterministic for identical input and model version. The core
/// caches nothing across restarts except via the persisted corpus store.
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text into a fixed-length vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Name of the model producing the vectors.
    fn model(&self) -> &str;
}

/// Embed every passage in order, failing on the first service error.
pub fn embed_passages(
    client: &dyn EmbeddingClient,
    passages: &[Passage],
) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(passages.len());
    for (i, passage) in passages.iter().enumerate() {
        tracing::debug!(
            "embedding passage {}/{} ({})",
            i + 1,
            passages.len(),
            passage.id
        );
        vectors.push(client.embed(&passage.text)?);
    }
    Ok(vectors)
}

/// Configuration for the Ollama-compatible embedding endpoint.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server (e.g. "http://localhost:11434").
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Blocking HTTP client for Ollama's `/api/embeddings` endpoint.
pub struct OllamaEmbeddingClient {
    client: reqwest::blocking::Client,
    config: OllamaConfig,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbeddingClient {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                Error::Config(format!("could not build HTTP client: {e}"))
            })?;
        Ok(Self { client, config })
    }
}

impl EmbeddingClient for OllamaEmbeddingClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/api/embeddings",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.config.model,
                prompt: text,
            })
            .send()
            .map_err(|e| Error::EmbeddingUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::EmbeddingUnavailable(format!(
                "{url} returned {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response.json().map_err(|e| {
            Error::EmbeddingUnavailable(format!("unreadable response: {e}"))
        })?;

        if parsed.embedding.is_empty() {
            return Err(Error::EmbeddingUnavailable(
                "service returned an empty embedding".into(),
            ));
        }
        Ok(parsed.embedding)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OllamaEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaEmbeddingClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;

    use super::*;

    /// Embedding client with canned vectors per exact text, for tests.
    pub struct MockEmbeddingClient {
        vectors: HashMap<String, Vec<f32>>,
        fallback: Option<Vec<f32>>,
        fail: bool,
    }

    impl MockEmbeddingClient {
        pub fn new() -> Self {
            Self {
                vectors: HashMap::new(),
                fallback: None,
                fail: false,
            }
        }

        pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.to_string(), vector);
            self
        }

        pub fn with_fallback(mut self, vector: Vec<f32>) -> Self {
            self.fallback = Some(vector);
            self
        }

        pub fn failing() -> Self {
            Self {
                vectors: HashMap::new(),
                fallback: None,
                fail: true,
            }
        }
    }

    impl EmbeddingClient for MockEmbeddingClient {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail {
                return Err(Error::EmbeddingUnavailable(
                    "mock embedding outage".into(),
                ));
            }
            self.vectors
                .get(text)
                .cloned()
                .or_else(|| self.fallback.clone())
                .ok_or_else(|| {
                    Error::EmbeddingUnavailable(format!(
                        "no canned vector for {text:?}"
                    ))
                })
        }

        fn model(&self) -> &str {
            "mock-embed"
        }
    }
}
