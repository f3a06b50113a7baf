use std::time::Duration;

use loa_core::domain::EmbeddedChunk;
use loa_core::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{sort_hits, IndexStats, MetadataFilter, RetrievalHit, VectorIndex, VectorMetadata};

/// Client for a REST vector database. Records are `{id, values, metadata}`;
/// queries take a vector, `top_k` and an equality filter.
#[derive(Debug, Clone)]
pub struct HttpIndex {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

/// Remote upserts are chunked to keep request bodies bounded.
const UPSERT_BATCH: usize = 100;

impl HttpIndex {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, AppError> {
        let url = format!("{}{path}", self.base_url);
        let resp = ureq::post(&url)
            .set("Api-Key", &self.api_key)
            .timeout(self.timeout)
            .send_json(body);

        match resp {
            Ok(r) if r.status() == 200 => r.into_json().map_err(|e| {
                AppError::new("AI_INDEX_BACKEND_FAILED", "Failed to decode vector store response")
                    .with_details(format!("url={url}; err={e}"))
            }),
            Ok(r) => Err(AppError::new(
                "AI_INDEX_BACKEND_FAILED",
                "Vector store returned an error status",
            )
            .with_details(format!("url={url}; status={}", r.status()))),
            Err(ureq::Error::Status(status, _)) => Err(AppError::new(
                "AI_INDEX_BACKEND_FAILED",
                "Vector store returned an error status",
            )
            .with_details(format!("url={url}; status={status}"))
            .with_retryable(status == 429 || status >= 500)),
            Err(e) => Err(
                AppError::new("AI_INDEX_BACKEND_FAILED", "Failed to reach the vector store")
                    .with_details(format!("url={url}; err={e}"))
                    .with_retryable(true),
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct UpsertRecord<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: VectorMetadata,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    metadata: Option<VectorMetadata>,
}

impl VectorIndex for HttpIndex {
    fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<usize, AppError> {
        let mut upserted = 0usize;
        for batch in chunks.chunks(UPSERT_BATCH) {
            let records: Vec<UpsertRecord<'_>> = batch
                .iter()
                .map(|e| UpsertRecord {
                    id: &e.chunk.chunk_id,
                    values: &e.embedding,
                    metadata: VectorMetadata::from_chunk(&e.chunk),
                })
                .collect();
            let records = serde_json::to_value(&records).map_err(|e| {
                AppError::new("AI_INDEX_UPSERT_FAILED", "Failed to encode upsert request")
                    .with_details(e.to_string())
            })?;
            let resp = self.post("/vectors/upsert", json!({ "vectors": records }))?;
            upserted += resp
                .get("upserted_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(batch.len() as u64) as usize;
        }
        Ok(upserted)
    }

    fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalHit>, AppError> {
        let mut body = json!({
            "vector": vector,
            "top_k": top_k,
            "include_metadata": true,
        });
        if let Some(f) = filter {
            body["filter"] = json!({ f.field.clone(): { "$eq": f.value } });
        }

        let resp = self.post("/query", body)?;
        let parsed: QueryResponse = serde_json::from_value(resp).map_err(|e| {
            AppError::new("AI_SEARCH_FAILED", "Failed to decode query response")
                .with_details(e.to_string())
        })?;

        let mut hits: Vec<RetrievalHit> = parsed
            .matches
            .into_iter()
            .filter_map(|m| {
                let meta = m.metadata?;
                Some(RetrievalHit::from_metadata(
                    m.id,
                    m.score.clamp(0.0, 1.0),
                    &meta,
                ))
            })
            .collect();

        // The backend promises score order; enforce it anyway.
        sort_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    fn stats(&self) -> Result<IndexStats, AppError> {
        let resp = self.post("/describe_index_stats", json!({}))?;
        Ok(IndexStats {
            vectors: resp
                .get("total_vector_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            dims: resp
                .get("dimension")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32),
        })
    }
}
