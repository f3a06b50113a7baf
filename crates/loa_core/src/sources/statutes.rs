use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::domain::{Article, Category, DocumentContent, IngestWarning, RawDocument, SourceKind};
use crate::error::AppError;

use super::{now_rfc3339_utc, AdapterOutput, Pacer, SourceAdapter};

/// User agent sent with every upstream fetch so the ingestor is
/// identifiable in server logs.
pub const INGEST_USER_AGENT: &str = "loa-ingest/0.1 (orientacion legal; contacto@loa.cl)";

const DEFAULT_CATALOG: &str = include_str!("../../assets/statute_sources.json");

/// One statute to fetch: stable id, display title, legal area and the
/// upstream HTML page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatuteSpec {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub url: String,
}

pub struct StatuteAdapter {
    specs: Vec<StatuteSpec>,
    agent: ureq::Agent,
    min_fetch_interval: Duration,
}

impl StatuteAdapter {
    pub fn new(specs: Vec<StatuteSpec>) -> Self {
        Self {
            specs,
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
            min_fetch_interval: Duration::from_secs(1),
        }
    }

    /// The curated statute catalog bundled with the crate.
    pub fn from_default_catalog() -> Result<Self, AppError> {
        let specs: Vec<StatuteSpec> = serde_json::from_str(DEFAULT_CATALOG).map_err(|e| {
            AppError::new(
                "INGEST_CATALOG_INVALID",
                "Failed to decode the bundled statute catalog",
            )
            .with_details(e.to_string())
        })?;
        Ok(Self::new(specs))
    }

    fn fetch_html(&self, url: &str) -> Result<String, AppError> {
        let resp = self
            .agent
            .get(url)
            .set("User-Agent", INGEST_USER_AGENT)
            .call();
        match resp {
            Ok(r) if r.status() == 200 => r.into_string().map_err(|e| {
                AppError::new("INGEST_FETCH_FAILED", "Failed to read statute page body")
                    .with_details(format!("url={url}; err={e}"))
            }),
            Ok(r) => Err(
                AppError::new("INGEST_FETCH_FAILED", "Statute page returned an error status")
                    .with_details(format!("url={url}; status={}", r.status())),
            ),
            Err(ureq::Error::Status(status, _)) => Err(
                AppError::new("INGEST_FETCH_FAILED", "Statute page returned an error status")
                    .with_details(format!("url={url}; status={status}"))
                    .with_retryable(status == 429 || status >= 500),
            ),
            Err(e) => Err(
                AppError::new("INGEST_FETCH_FAILED", "Failed to fetch statute page")
                    .with_details(format!("url={url}; err={e}"))
                    .with_retryable(true),
            ),
        }
    }
}

impl SourceAdapter for StatuteAdapter {
    fn name(&self) -> &'static str {
        "leychile"
    }

    fn fetch_and_parse(&self) -> Result<AdapterOutput, AppError> {
        let article_heading = article_heading_regex()?;
        let mut documents = Vec::new();
        let mut warnings = Vec::new();
        let mut pacer = Pacer::new(self.min_fetch_interval);

        for spec in &self.specs {
            pacer.wait();
            let html = match self.fetch_html(&spec.url) {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(source_id = %spec.id, error = %e, "statute fetch failed; skipping");
                    warnings.push(
                        IngestWarning::new("INGEST_SOURCE_SKIPPED", "Statute fetch failed")
                            .with_details(format!("source_id={}; err={e}", spec.id)),
                    );
                    continue;
                }
            };

            let text = html_to_text(&html);
            if text.trim().is_empty() {
                warnings.push(
                    IngestWarning::new("INGEST_SOURCE_EMPTY", "Statute page had no visible text")
                        .with_details(format!("source_id={}", spec.id)),
                );
                continue;
            }

            let content = match split_articles(&text, &article_heading) {
                Some(articles) => DocumentContent::Articles(articles),
                None => DocumentContent::Body(text),
            };

            documents.push(RawDocument {
                source_id: spec.id.clone(),
                kind: SourceKind::Statute,
                title: spec.title.clone(),
                category: spec.category,
                url: Some(spec.url.clone()),
                origin: self.name().to_string(),
                fetched_at: now_rfc3339_utc()?,
                content,
            });
        }

        Ok(AdapterOutput {
            documents,
            warnings,
        })
    }
}

fn article_heading_regex() -> Result<Regex, AppError> {
    // Matches "Artículo 12", "Articulo 5°", "Artículo 163 bis", and a bare
    // "Artículo" heading with no number, at the start of a line.
    Regex::new(r"(?m)^\s*Art[íi]culo\b\s*(\d{1,4}\s*(?:bis|ter|qu[aá]ter)?)?\s*[°º]?\s*[.:\-]?")
        .map_err(|e| {
            AppError::new("INGEST_PATTERN_INVALID", "Article heading pattern failed to compile")
                .with_details(e.to_string())
        })
}

/// Extract readable text from a statute page. Content-bearing elements are
/// joined as paragraphs; pages without them fall back to the whole body.
pub(crate) fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);

    let selector = match Selector::parse("p, h1, h2, h3, h4, li") {
        Ok(s) => s,
        Err(_) => return String::new(),
    };

    let mut blocks: Vec<String> = Vec::new();
    for element in doc.select(&selector) {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.trim();
        if !text.is_empty() {
            blocks.push(text.to_string());
        }
    }

    if blocks.is_empty() {
        if let Ok(body) = Selector::parse("body") {
            if let Some(el) = doc.select(&body).next() {
                return el.text().collect::<Vec<_>>().join("\n");
            }
        }
        return String::new();
    }

    blocks.join("\n\n")
}

/// Split statute text into articles on `Artículo N` headings. Headings
/// without a parseable number fall back to sequential ordinals. Returns
/// `None` when the page has no article structure at all.
pub(crate) fn split_articles(text: &str, heading: &Regex) -> Option<Vec<Article>> {
    let matches: Vec<(usize, usize, Option<String>)> = heading
        .captures_iter(text)
        .filter_map(|cap| {
            let m = cap.get(0)?;
            let number = cap
                .get(1)
                .map(|n| n.as_str().split_whitespace().collect::<Vec<_>>().join(" "));
            Some((m.start(), m.end(), number))
        })
        .collect();

    if matches.is_empty() {
        return None;
    }

    let mut articles = Vec::with_capacity(matches.len());
    for (i, (start, _, number)) in matches.iter().enumerate() {
        let end = matches
            .get(i + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(text.len());
        let body = text[*start..end].trim();
        if body.is_empty() {
            continue;
        }
        let number = match number {
            Some(n) if !n.is_empty() => n.clone(),
            _ => (i + 1).to_string(),
        };
        articles.push(Article {
            number,
            text: body.to_string(),
        });
    }

    if articles.is_empty() {
        None
    } else {
        Some(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_on_article_headings() {
        let text = "LEY DE EJEMPLO\n\nArtículo 1. Toda persona tiene derecho a orientación.\n\nArtículo 2°. El empleador deberá otorgar el finiquito.\n\nArtículo 163 bis. Norma especial.";
        let re = article_heading_regex().unwrap();
        let articles = split_articles(text, &re).unwrap();
        assert_eq!(articles.len(), 3);
        assert_eq!(articles[0].number, "1");
        assert_eq!(articles[1].number, "2");
        assert_eq!(articles[2].number, "163 bis");
        assert!(articles[1].text.contains("finiquito"));
    }

    #[test]
    fn heading_without_number_gets_sequential_ordinal() {
        let text = "Artículo 1. Primero.\n\nArtículo. Sin número.\n";
        let re = article_heading_regex().unwrap();
        let articles = split_articles(text, &re).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[1].number, "2");
    }

    #[test]
    fn text_without_headings_is_not_article_structured() {
        let re = article_heading_regex().unwrap();
        assert!(split_articles("guía general sin estructura", &re).is_none());
    }

    #[test]
    fn html_extraction_keeps_paragraphs_and_drops_markup() {
        let html = "<html><head><script>var x=1;</script></head><body>\
            <h1>Código del Trabajo</h1><p>Artículo 1. Las relaciones laborales.</p>\
            <p>Artículo 2. Son contratos.</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Código del Trabajo"));
        assert!(text.contains("Artículo 1. Las relaciones laborales."));
        assert!(!text.contains("var x"));
    }

    #[test]
    fn default_catalog_decodes() {
        let adapter = StatuteAdapter::from_default_catalog().unwrap();
        assert!(!adapter.specs.is_empty());
        for spec in &adapter.specs {
            assert!(spec.url.starts_with("https://"));
        }
    }
}
