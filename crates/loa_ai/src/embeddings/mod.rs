use std::time::Duration;

use loa_core::domain::{Chunk, EmbeddedChunk, IngestWarning};
use loa_core::error::AppError;

pub mod http_embed;

pub use http_embed::HttpEmbedder;

/// Upstream embedding providers reject larger batches; the ingestor never
/// sends more than this many texts per request.
pub const MAX_EMBED_BATCH: usize = 100;

/// Minimum pause between consecutive embedding batches during ingestion.
pub const INTER_BATCH_PAUSE: Duration = Duration::from_millis(500);

/// Bounded retries for transient upstream failures.
pub const DEFAULT_RETRIES: usize = 2;

pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError>;

    fn model(&self) -> &str;
}

/// Outcome of embedding a chunk set: chunks whose batch failed after
/// retries are reported as warnings, never as batch failure.
#[derive(Debug)]
pub struct EmbedRunReport {
    pub embedded: Vec<EmbeddedChunk>,
    pub failed_chunk_ids: Vec<String>,
    pub warnings: Vec<IngestWarning>,
}

/// Retry a transient operation with bounded attempts. Non-retryable errors
/// are surfaced immediately.
pub fn with_retries<T>(
    retries: usize,
    mut op: impl FnMut() -> Result<T, AppError>,
) -> Result<T, AppError> {
    let mut attempt = 0usize;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if e.retryable && attempt < retries => {
                attempt += 1;
                tracing::warn!(error = %e, attempt, "transient failure; retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Embed chunks in batches of at most [`MAX_EMBED_BATCH`], pausing between
/// batches, with [`DEFAULT_RETRIES`] retries per batch. A batch that still
/// fails marks its chunks as failed and the run continues.
pub fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    embedded_at: &str,
) -> EmbedRunReport {
    let mut report = EmbedRunReport {
        embedded: Vec::with_capacity(chunks.len()),
        failed_chunk_ids: Vec::new(),
        warnings: Vec::new(),
    };

    for (i, batch) in chunks.chunks(MAX_EMBED_BATCH).enumerate() {
        if i > 0 {
            std::thread::sleep(INTER_BATCH_PAUSE);
        }
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        match with_retries(DEFAULT_RETRIES, || embedder.embed_batch(&texts)) {
            Ok(vectors) if vectors.len() == batch.len() => {
                for (chunk, embedding) in batch.iter().zip(vectors) {
                    report.embedded.push(EmbeddedChunk {
                        chunk: chunk.clone(),
                        embedding,
                        embedding_model: embedder.model().to_string(),
                        embedded_at: embedded_at.to_string(),
                    });
                }
            }
            Ok(vectors) => {
                report.warnings.push(
                    IngestWarning::new(
                        "INGEST_EMBED_BATCH_MISMATCH",
                        "Embedding batch returned the wrong number of vectors",
                    )
                    .with_details(format!(
                        "batch={i}; expected={}; got={}",
                        batch.len(),
                        vectors.len()
                    )),
                );
                report
                    .failed_chunk_ids
                    .extend(batch.iter().map(|c| c.chunk_id.clone()));
            }
            Err(e) => {
                tracing::warn!(batch = i, error = %e, "embedding batch failed after retries");
                report.warnings.push(
                    IngestWarning::new(
                        "INGEST_EMBED_BATCH_FAILED",
                        "Embedding batch failed after retries",
                    )
                    .with_details(format!("batch={i}; err={e}")),
                );
                report
                    .failed_chunk_ids
                    .extend(batch.iter().map(|c| c.chunk_id.clone()));
            }
        }
    }

    report
}
