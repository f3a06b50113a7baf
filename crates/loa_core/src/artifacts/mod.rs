use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Category, Chunk, ChunkMeta, EmbeddedChunk, SourceKind};
use crate::error::AppError;

/// Metadata block of the on-disk chunk artifact. Field names are part of
/// the build-output contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkArtifactMeta {
    pub source: String,
    pub source_id: String,
    pub law_name: String,
    pub category: String,
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_number: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub scraped_at: String,
    pub processed_at: String,
}

/// One entry of the chunk artifact: a JSON array of these is the output of
/// the scrape stage and the input of the embedding stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkArtifactRecord {
    pub chunk_id: String,
    pub chunk_number: u32,
    pub total_chunks: u32,
    pub text: String,
    pub size: usize,
    pub metadata: ChunkArtifactMeta,
}

impl ChunkArtifactRecord {
    pub fn from_chunk(chunk: &Chunk, processed_at: &str) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            chunk_number: chunk.meta.ordinal,
            total_chunks: chunk.meta.total_chunks,
            size: chunk.text.chars().count(),
            text: chunk.text.clone(),
            metadata: ChunkArtifactMeta {
                source: chunk.meta.origin.clone(),
                source_id: chunk.meta.source_id.clone(),
                law_name: chunk.meta.title.clone(),
                category: chunk.meta.category.as_str().to_string(),
                url: chunk.meta.url.clone(),
                article_number: chunk.meta.article_number.clone(),
                kind: chunk.meta.kind.as_str().to_string(),
                scraped_at: chunk.meta.fetched_at.clone(),
                processed_at: processed_at.to_string(),
            },
        }
    }

    /// Rebuild the in-memory chunk, e.g. when the embedding stage runs from
    /// a previously written artifact (`--skip-scraping`).
    pub fn to_chunk(&self) -> Result<Chunk, AppError> {
        let category = Category::parse(&self.metadata.category).ok_or_else(|| {
            AppError::new("ARTIFACT_INVALID", "Chunk artifact has an unknown category")
                .with_details(format!(
                    "chunk_id={}; category={}",
                    self.chunk_id, self.metadata.category
                ))
        })?;
        let kind = SourceKind::parse(&self.metadata.kind).ok_or_else(|| {
            AppError::new("ARTIFACT_INVALID", "Chunk artifact has an unknown source type")
                .with_details(format!(
                    "chunk_id={}; type={}",
                    self.chunk_id, self.metadata.kind
                ))
        })?;
        Ok(Chunk {
            chunk_id: self.chunk_id.clone(),
            text_sha256: crate::chunker::sha256_hex(&self.text),
            text: self.text.clone(),
            meta: ChunkMeta {
                source_id: self.metadata.source_id.clone(),
                kind,
                title: self.metadata.law_name.clone(),
                category,
                url: self.metadata.url.clone(),
                article_number: self.metadata.article_number.clone(),
                origin: self.metadata.source.clone(),
                fetched_at: self.metadata.scraped_at.clone(),
                ordinal: self.chunk_number,
                total_chunks: self.total_chunks,
            },
        })
    }
}

/// Chunk artifact entry augmented with its vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingArtifactRecord {
    #[serde(flatten)]
    pub chunk: ChunkArtifactRecord,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub embedded_at: String,
}

impl EmbeddingArtifactRecord {
    pub fn from_embedded(embedded: &EmbeddedChunk, processed_at: &str) -> Self {
        Self {
            chunk: ChunkArtifactRecord::from_chunk(&embedded.chunk, processed_at),
            embedding_dim: embedded.embedding.len(),
            embedding: embedded.embedding.clone(),
            embedding_model: embedded.embedding_model.clone(),
            embedded_at: embedded.embedded_at.clone(),
        }
    }
}

pub fn write_chunk_artifact(path: &Path, records: &[ChunkArtifactRecord]) -> Result<(), AppError> {
    write_json_atomic(path, records)
}

pub fn read_chunk_artifact(path: &Path) -> Result<Vec<ChunkArtifactRecord>, AppError> {
    read_json(path)
}

pub fn write_embedding_artifact(
    path: &Path,
    records: &[EmbeddingArtifactRecord],
) -> Result<(), AppError> {
    write_json_atomic(path, records)
}

pub fn read_embedding_artifact(path: &Path) -> Result<Vec<EmbeddingArtifactRecord>, AppError> {
    read_json(path)
}

/// Artifacts are written via tmp + rename so a crashed run never leaves a
/// truncated JSON file behind.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new("ARTIFACT_WRITE_FAILED", "Failed to create artifact directory")
                .with_details(format!("path={}; err={e}", parent.display()))
        })?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("ARTIFACT_WRITE_FAILED", "Failed to encode artifact")
            .with_details(e.to_string())
    })?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("ARTIFACT_WRITE_FAILED", "Failed to write artifact")
            .with_details(format!("path={}; err={e}", tmp.display()))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("ARTIFACT_WRITE_FAILED", "Failed to finalize artifact write")
            .with_details(format!("tmp={}; dest={}; err={e}", tmp.display(), path.display()))
    })?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("ARTIFACT_READ_FAILED", "Failed to read artifact")
            .with_details(format!("path={}; err={e}", path.display()))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("ARTIFACT_READ_FAILED", "Failed to decode artifact")
            .with_details(format!("path={}; err={e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{chunk_document, ChunkingConfig};
    use crate::domain::{DocumentContent, RawDocument};
    use pretty_assertions::assert_eq;

    fn sample_doc() -> RawDocument {
        RawDocument {
            source_id: "guia_finiquito".to_string(),
            kind: SourceKind::RegulatorGuide,
            title: "Guía sobre Finiquito".to_string(),
            category: Category::Laboral,
            url: Some("https://example.cl/finiquito".to_string()),
            origin: "guides".to_string(),
            fetched_at: "2026-08-01T00:00:00Z".to_string(),
            content: DocumentContent::Body(
                "El finiquito debe constar por escrito.\n\nDebe ratificarse ante ministro de fe."
                    .to_string(),
            ),
        }
    }

    #[test]
    fn chunk_artifact_round_trips_to_chunks() {
        let chunks = chunk_document(&sample_doc(), &ChunkingConfig::default());
        let records: Vec<ChunkArtifactRecord> = chunks
            .iter()
            .map(|c| ChunkArtifactRecord::from_chunk(c, "2026-08-01T00:05:00Z"))
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.json");
        write_chunk_artifact(&path, &records).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let back = read_chunk_artifact(&path).unwrap();
        assert_eq!(back, records);
        let rebuilt: Vec<Chunk> = back.iter().map(|r| r.to_chunk().unwrap()).collect();
        assert_eq!(rebuilt, chunks);
    }

    #[test]
    fn artifact_metadata_uses_contract_field_names() {
        let chunks = chunk_document(&sample_doc(), &ChunkingConfig::default());
        let record = ChunkArtifactRecord::from_chunk(&chunks[0], "2026-08-01T00:05:00Z");
        let json = serde_json::to_value(&record).unwrap();
        let meta = &json["metadata"];
        assert_eq!(meta["law_name"], "Guía sobre Finiquito");
        assert_eq!(meta["type"], "regulator_guide");
        assert_eq!(meta["category"], "laboral");
        assert!(json["chunk_number"].is_number());
        assert!(json["size"].is_number());
    }
}
