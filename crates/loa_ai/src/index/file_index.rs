use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use loa_core::domain::EmbeddedChunk;
use loa_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::retrieve::similarity;

use super::{sort_hits, IndexStats, MetadataFilter, RetrievalHit, VectorIndex, VectorMetadata};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct StoredRecord {
    values: Vec<f32>,
    text_sha256: String,
    embedding_model: String,
    metadata: VectorMetadata,
}

/// Local vector store backed by one JSON file. The default backend for
/// single-tenant batch ingestion and for tests; the remote store exposes
/// the same seam.
#[derive(Debug, Clone)]
pub struct FileIndex {
    root: PathBuf,
}

impl FileIndex {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn records_path(&self) -> PathBuf {
        self.root.join("index_records.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::new("AI_INDEX_IO_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={e}", self.root.display()))
        })
    }

    fn read_records(&self) -> Result<BTreeMap<String, StoredRecord>, AppError> {
        let path = self.records_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let bytes = fs::read(&path).map_err(|e| {
            AppError::new("AI_INDEX_IO_FAILED", "Failed to read index records")
                .with_details(format!("path={}; err={e}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::new("AI_INDEX_IO_FAILED", "Failed to decode index records")
                .with_details(format!("path={}; err={e}", path.display()))
        })
    }

    fn write_records(&self, records: &BTreeMap<String, StoredRecord>) -> Result<(), AppError> {
        self.ensure_dirs()?;
        let path = self.records_path();
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_string(records).map_err(|e| {
            AppError::new("AI_INDEX_IO_FAILED", "Failed to encode index records")
                .with_details(e.to_string())
        })?;
        fs::write(&tmp, json.as_bytes()).map_err(|e| {
            AppError::new("AI_INDEX_IO_FAILED", "Failed to write index records")
                .with_details(format!("path={}; err={e}", tmp.display()))
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            AppError::new("AI_INDEX_IO_FAILED", "Failed to finalize index records write")
                .with_details(format!("tmp={}; dest={}; err={e}", tmp.display(), path.display()))
        })?;
        Ok(())
    }
}

impl VectorIndex for FileIndex {
    fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<usize, AppError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let mut records = self.read_records()?;
        let mut dims = records.values().next().map(|r| r.values.len());

        let mut written = 0usize;
        for embedded in chunks {
            if embedded.embedding.is_empty() {
                return Err(AppError::new(
                    "AI_INDEX_UPSERT_FAILED",
                    "Refusing to upsert an empty vector",
                )
                .with_details(format!("chunk_id={}", embedded.chunk.chunk_id)));
            }
            if let Some(dims) = dims {
                if embedded.embedding.len() != dims {
                    return Err(AppError::new(
                        "AI_INDEX_UPSERT_FAILED",
                        "Vector dimension does not match the index",
                    )
                    .with_details(format!(
                        "chunk_id={}; expected={dims}; got={}",
                        embedded.chunk.chunk_id,
                        embedded.embedding.len()
                    )));
                }
            } else {
                dims = Some(embedded.embedding.len());
            }

            // Identical content re-upserts are no-ops; the text hash gates it.
            if let Some(current) = records.get(&embedded.chunk.chunk_id) {
                if current.text_sha256 == embedded.chunk.text_sha256
                    && current.embedding_model == embedded.embedding_model
                {
                    continue;
                }
            }

            records.insert(
                embedded.chunk.chunk_id.clone(),
                StoredRecord {
                    values: embedded.embedding.clone(),
                    text_sha256: embedded.chunk.text_sha256.clone(),
                    embedding_model: embedded.embedding_model.clone(),
                    metadata: VectorMetadata::from_chunk(&embedded.chunk),
                },
            );
            written += 1;
        }

        if written > 0 {
            self.write_records(&records)?;
        }
        Ok(written)
    }

    fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalHit>, AppError> {
        let records = self.read_records()?;
        let qnorm = similarity::l2_norm(vector);
        if qnorm == 0.0 {
            return Err(AppError::new(
                "AI_SEARCH_FAILED",
                "Query embedding norm is zero",
            ));
        }

        let mut hits: Vec<RetrievalHit> = Vec::new();
        for (chunk_id, record) in records.iter() {
            if record.values.len() != vector.len() {
                return Err(AppError::new(
                    "AI_SEARCH_FAILED",
                    "Query embedding dims do not match the index",
                )
                .with_details(format!(
                    "chunk_id={chunk_id}; index={}; query={}",
                    record.values.len(),
                    vector.len()
                )));
            }
            if let Some(f) = filter {
                if record.metadata.field(&f.field).as_deref() != Some(f.value.as_str()) {
                    continue;
                }
            }
            let vnorm = similarity::l2_norm(&record.values);
            if vnorm == 0.0 {
                continue;
            }
            let score = similarity::cosine_similarity(vector, &record.values, qnorm, vnorm)
                .clamp(0.0, 1.0);
            hits.push(RetrievalHit::from_metadata(
                chunk_id.clone(),
                score,
                &record.metadata,
            ));
        }

        sort_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    fn stats(&self) -> Result<IndexStats, AppError> {
        let records = self.read_records()?;
        Ok(IndexStats {
            vectors: records.len() as u64,
            dims: records.values().next().map(|r| r.values.len() as u32),
        })
    }
}
