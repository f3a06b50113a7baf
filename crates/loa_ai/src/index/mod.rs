use loa_core::domain::{Category, Chunk, EmbeddedChunk};
use loa_core::error::AppError;
use serde::{Deserialize, Serialize};

pub mod file_index;
pub mod http_index;

pub use file_index::FileIndex;
pub use http_index::HttpIndex;

/// Retrieval previews and index metadata carry at most this many characters
/// of chunk text. A policy choice (citations never need more), not a
/// backend limit.
pub const METADATA_PREVIEW_CHARS: usize = 1000;

/// Metadata stored alongside every vector. Field names are part of the
/// external contract; callers must not depend on backend-specific extras.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VectorMetadata {
    pub text: String,
    pub source: String,
    pub law_name: String,
    pub category: String,
    pub chunk_number: u32,
    pub total_chunks: u32,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_number: Option<String>,
}

impl VectorMetadata {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            text: truncate_chars(&chunk.text, METADATA_PREVIEW_CHARS),
            source: chunk.meta.source_id.clone(),
            law_name: chunk.meta.title.clone(),
            category: chunk.meta.category.as_str().to_string(),
            chunk_number: chunk.meta.ordinal,
            total_chunks: chunk.meta.total_chunks,
            url: chunk.meta.url.clone().unwrap_or_default(),
            article_number: chunk.meta.article_number.clone(),
        }
    }

    /// Equality-filterable view of a metadata field.
    pub(crate) fn field(&self, name: &str) -> Option<String> {
        match name {
            "source" => Some(self.source.clone()),
            "law_name" => Some(self.law_name.clone()),
            "category" => Some(self.category.clone()),
            "url" => Some(self.url.clone()),
            "article_number" => self.article_number.clone(),
            _ => None,
        }
    }
}

/// One retrieval result: similarity score plus everything needed to render
/// a citation without re-reading the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalHit {
    pub chunk_id: String,
    pub score: f32,
    pub title: String,
    pub category: String,
    pub article_number: Option<String>,
    pub url: Option<String>,
    pub source_id: String,
    pub text: String,
}

impl RetrievalHit {
    pub(crate) fn from_metadata(chunk_id: String, score: f32, meta: &VectorMetadata) -> Self {
        Self {
            chunk_id,
            score,
            title: meta.law_name.clone(),
            category: meta.category.clone(),
            article_number: meta.article_number.clone(),
            url: if meta.url.is_empty() {
                None
            } else {
                Some(meta.url.clone())
            },
            source_id: meta.source.clone(),
            text: truncate_chars(&meta.text, METADATA_PREVIEW_CHARS),
        }
    }
}

/// Equality match on one metadata field, e.g. `category = "laboral"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataFilter {
    pub field: String,
    pub value: String,
}

impl MetadataFilter {
    pub fn category(category: Category) -> Self {
        Self {
            field: "category".to_string(),
            value: category.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub vectors: u64,
    pub dims: Option<u32>,
}

/// Narrow seam over the vector store so backends can be swapped without
/// touching triage or the assembler. The index is a process-wide shared
/// client; implementations must be safe to share across request tasks.
pub trait VectorIndex: Send + Sync {
    /// Idempotent by `chunk_id`; safe to re-run after partial ingestion.
    fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<usize, AppError>;

    /// Cosine-similarity search, hits sorted by descending score.
    fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalHit>, AppError>;

    fn stats(&self) -> Result<IndexStats, AppError>;
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

/// Descending score, `chunk_id` ascending as a deterministic tie-break.
pub(crate) fn sort_hits(hits: &mut [RetrievalHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}
