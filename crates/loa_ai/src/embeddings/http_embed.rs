use std::time::Duration;

use loa_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::{Embedder, MAX_EMBED_BATCH};

/// HTTP client for an OpenAI-style embeddings endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl HttpEmbedder {
    pub fn new(url: &str, api_key: &str, model: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl Embedder for HttpEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > MAX_EMBED_BATCH {
            return Err(AppError::new(
                "AI_EMBEDDINGS_FAILED",
                "Embedding batch exceeds the provider limit",
            )
            .with_details(format!("len={}; max={MAX_EMBED_BATCH}", texts.len())));
        }

        let req = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };
        let resp = ureq::post(&self.url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .send_json(serde_json::to_value(&req).map_err(|e| {
                AppError::new("AI_EMBEDDINGS_FAILED", "Failed to encode embeddings request")
                    .with_details(e.to_string())
            })?);

        match resp {
            Ok(r) if r.status() == 200 => {
                let v: EmbeddingsResponse = r.into_json().map_err(|e| {
                    AppError::new("AI_EMBEDDINGS_FAILED", "Failed to decode embeddings response")
                        .with_details(e.to_string())
                })?;
                if v.data.len() != texts.len() {
                    return Err(AppError::new(
                        "AI_EMBEDDINGS_FAILED",
                        "Embeddings response item count does not match the input",
                    )
                    .with_details(format!("expected={}; got={}", texts.len(), v.data.len())));
                }
                // Providers may return items out of order; index is the contract.
                let mut items = v.data;
                items.sort_by_key(|item| item.index);
                if items.iter().any(|item| item.embedding.is_empty()) {
                    return Err(AppError::new(
                        "AI_EMBEDDINGS_FAILED",
                        "Embeddings response contained an empty vector",
                    ));
                }
                Ok(items.into_iter().map(|item| item.embedding).collect())
            }
            Ok(r) => {
                let status = r.status();
                Err(
                    AppError::new("AI_EMBEDDINGS_FAILED", "Embeddings request failed")
                        .with_details(format!("status={status}"))
                        .with_retryable(status == 429 || status >= 500),
                )
            }
            Err(ureq::Error::Status(status, _)) => Err(AppError::new(
                "AI_EMBEDDINGS_FAILED",
                "Embeddings request failed",
            )
            .with_details(format!("status={status}"))
            .with_retryable(status == 429 || status >= 500)),
            Err(e) => Err(
                AppError::new("AI_EMBEDDINGS_FAILED", "Failed to call embeddings endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
