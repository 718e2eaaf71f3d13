//! OpenAI embeddings backend.
//!
//! Calls the `/v1/embeddings` endpoint of api.openai.com or any compatible
//! server via a base-url override.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;

/// Configuration for [`OpenAIEmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct OpenAIEmbeddingConfig {
    /// Bearer token for the embeddings API.
    pub api_key: String,
    /// Base URL without the `/embeddings` segment.
    pub base_url: String,
    /// Embedding model name.
    pub model: String,
    /// Output dimensionality reported (and, when overridden, requested).
    pub dimensions: usize,
}

impl OpenAIEmbeddingConfig {
    /// Config for the official endpoint with the default model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Point at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a different embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request truncated (Matryoshka) output of this many dimensions.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
#[derive(Debug)]
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    config: OpenAIEmbeddingConfig,
    /// Sent to the API only when the caller overrode the default, since the
    /// `dimensions` field is not accepted by every compatible server.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider from a config.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the API key is empty.
    pub fn new(config: OpenAIEmbeddingConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(RagError::Embedding {
                provider: "OpenAI".into(),
                message: "API key must not be empty".into(),
            });
        }
        let request_dimensions =
            (config.dimensions != DEFAULT_DIMENSIONS).then_some(config.dimensions);
        Ok(Self { client: reqwest::Client::new(), config, request_dimensions })
    }

    /// Create a provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| RagError::Embedding {
            provider: "OpenAI".into(),
            message: "OPENAI_API_KEY environment variable not set".into(),
        })?;
        Self::new(OpenAIEmbeddingConfig::new(api_key))
    }

    fn endpoint_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Deserialize)]
struct EmbeddingObject {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vectors = self.embed_batch(&[text]).await?;
        vectors.into_iter().next().ok_or_else(|| RagError::Embedding {
            provider: "OpenAI".into(),
            message: "API returned an empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(batch_size = texts.len(), model = %self.config.model, "embedding batch");

        let body = EmbeddingsRequest {
            model: &self.config.model,
            input: texts,
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(self.endpoint_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "embeddings request failed");
                RagError::Embedding {
                    provider: "OpenAI".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(%status, "embeddings API error");
            return Err(RagError::Embedding {
                provider: "OpenAI".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let parsed: EmbeddingsResponse = response.json().await.map_err(|e| RagError::Embedding {
            provider: "OpenAI".into(),
            message: format!("failed to parse response: {e}"),
        })?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_rejected() {
        let err = OpenAIEmbeddingProvider::new(OpenAIEmbeddingConfig::new("")).unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }));
    }

    #[test]
    fn dimension_override_is_sent_to_api() {
        let default = OpenAIEmbeddingProvider::new(OpenAIEmbeddingConfig::new("key")).unwrap();
        assert_eq!(default.request_dimensions, None);
        assert_eq!(default.dimensions(), DEFAULT_DIMENSIONS);

        let truncated = OpenAIEmbeddingProvider::new(
            OpenAIEmbeddingConfig::new("key").with_dimensions(256),
        )
        .unwrap();
        assert_eq!(truncated.request_dimensions, Some(256));
        assert_eq!(truncated.dimensions(), 256);
    }

    #[test]
    fn endpoint_url_tolerates_trailing_slash() {
        let provider = OpenAIEmbeddingProvider::new(
            OpenAIEmbeddingConfig::new("key").with_base_url("http://localhost:8000/v1/"),
        )
        .unwrap();
        assert_eq!(provider.endpoint_url(), "http://localhost:8000/v1/embeddings");
    }
}
