use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Category, DocumentContent, RawDocument, SourceKind};
use crate::error::AppError;

use super::{now_rfc3339_utc, AdapterOutput, SourceAdapter};

const DEFAULT_GUIDES: &str = include_str!("../../assets/regulator_guides.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuideEntry {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub url: Option<String>,
    pub body: String,
}

/// Curated regulator-guide content. Mostly static; shipped as a versioned
/// asset and overridable from a file on disk.
pub struct GuideAdapter {
    entries: Vec<GuideEntry>,
}

impl GuideAdapter {
    pub fn new(entries: Vec<GuideEntry>) -> Self {
        Self { entries }
    }

    pub fn from_default_catalog() -> Result<Self, AppError> {
        let entries: Vec<GuideEntry> = serde_json::from_str(DEFAULT_GUIDES).map_err(|e| {
            AppError::new(
                "INGEST_CATALOG_INVALID",
                "Failed to decode the bundled guide catalog",
            )
            .with_details(e.to_string())
        })?;
        Ok(Self::new(entries))
    }

    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("INGEST_CATALOG_INVALID", "Failed to read guide catalog file")
                .with_details(format!("path={}; err={e}", path.display()))
        })?;
        let entries: Vec<GuideEntry> = serde_json::from_str(&raw).map_err(|e| {
            AppError::new("INGEST_CATALOG_INVALID", "Failed to decode guide catalog file")
                .with_details(format!("path={}; err={e}", path.display()))
        })?;
        Ok(Self::new(entries))
    }
}

impl SourceAdapter for GuideAdapter {
    fn name(&self) -> &'static str {
        "guides"
    }

    fn fetch_and_parse(&self) -> Result<AdapterOutput, AppError> {
        let fetched_at = now_rfc3339_utc()?;
        let documents = self
            .entries
            .iter()
            .filter(|entry| !entry.body.trim().is_empty())
            .map(|entry| RawDocument {
                source_id: entry.id.clone(),
                kind: SourceKind::RegulatorGuide,
                title: entry.title.clone(),
                category: entry.category,
                url: entry.url.clone(),
                origin: self.name().to_string(),
                fetched_at: fetched_at.clone(),
                content: DocumentContent::Body(entry.body.clone()),
            })
            .collect();

        Ok(AdapterOutput {
            documents,
            warnings: Vec::new(),
        })
    }
}
