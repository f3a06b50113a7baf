use loa_core::error::AppError;

use crate::embeddings::Embedder;
use crate::index::{MetadataFilter, RetrievalHit, VectorIndex};

pub mod similarity;

/// Embed a query and search the index. Hits come back sorted by descending
/// score. Failures here are fatal to the retrieval step only; the response
/// assembler degrades to no-RAG on error.
pub fn search_hits(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    query: &str,
    top_k: usize,
    filter: Option<&MetadataFilter>,
) -> Result<Vec<RetrievalHit>, AppError> {
    let q = query.trim();
    if q.is_empty() {
        return Err(AppError::new(
            "AI_SEARCH_FAILED",
            "Query must not be empty",
        ));
    }

    let vectors = embedder.embed_batch(&[q])?;
    let vector = vectors.into_iter().next().ok_or_else(|| {
        AppError::new(
            "AI_EMBEDDINGS_FAILED",
            "Embedder returned no vector for the query",
        )
    })?;

    index.search(&vector, top_k.max(1), filter)
}
