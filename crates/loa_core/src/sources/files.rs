use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;

use crate::domain::{Category, DocumentContent, IngestWarning, RawDocument, SourceKind};
use crate::error::AppError;

use super::{now_rfc3339_utc, AdapterOutput, SourceAdapter};

/// Filename/folder keyword to legal-area mapping. Configuration, not
/// contract: callers may pass their own rules.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub keyword: String,
    pub category: Category,
}

impl CategoryRule {
    fn new(keyword: &str, category: Category) -> Self {
        Self {
            keyword: keyword.to_string(),
            category,
        }
    }
}

pub fn default_category_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("laboral", Category::Laboral),
        CategoryRule::new("trabajo", Category::Laboral),
        CategoryRule::new("despido", Category::Laboral),
        CategoryRule::new("finiquito", Category::Laboral),
        CategoryRule::new("familia", Category::Familia),
        CategoryRule::new("pension", Category::Familia),
        CategoryRule::new("divorcio", Category::Familia),
        CategoryRule::new("arriendo", Category::Arriendos),
        CategoryRule::new("arrendamiento", Category::Arriendos),
        CategoryRule::new("deuda", Category::Deudas),
        CategoryRule::new("cobranza", Category::Deudas),
        CategoryRule::new("consumidor", Category::Consumidor),
        CategoryRule::new("sernac", Category::Consumidor),
        CategoryRule::new("penal", Category::Penal),
        CategoryRule::new("migracion", Category::Migracion),
        CategoryRule::new("extranjeria", Category::Migracion),
        CategoryRule::new("administrativo", Category::Administrativo),
        CategoryRule::new("tributario", Category::Tributario),
        CategoryRule::new("impuesto", Category::Tributario),
        CategoryRule::new("sociedad", Category::Societario),
        CategoryRule::new("societario", Category::Societario),
        CategoryRule::new("marca", Category::PropiedadIntelectual),
        CategoryRule::new("patente", Category::PropiedadIntelectual),
        CategoryRule::new("notarial", Category::Notarial),
        CategoryRule::new("herencia", Category::Sucesiones),
        CategoryRule::new("sucesion", Category::Sucesiones),
        CategoryRule::new("banco", Category::Bancario),
        CategoryRule::new("bancario", Category::Bancario),
        CategoryRule::new("seguro", Category::Seguros),
        CategoryRule::new("contrato", Category::Civil),
        CategoryRule::new("civil", Category::Civil),
    ]
}

/// Loads lawyer notes from a local directory: one `RawDocument` per
/// `.txt`/`.md`/`.pdf`/`.docx` file. Category is inferred from the folder
/// first, then from filename keywords; everything else lands in `general`.
pub struct FileAdapter {
    root: PathBuf,
    rules: Vec<CategoryRule>,
}

impl FileAdapter {
    pub fn new(root: impl Into<PathBuf>, rules: Vec<CategoryRule>) -> Self {
        Self {
            root: root.into(),
            rules,
        }
    }

    fn infer_category(&self, path: &Path) -> Category {
        // Folder names win over filename keywords.
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let mut components: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
            .collect();
        // Last component is the filename; check folders before it.
        let file_name = components.pop().unwrap_or_default();

        for folder in &components {
            if let Some(cat) = Category::parse(folder) {
                return cat;
            }
            for rule in &self.rules {
                if folder.contains(&rule.keyword) {
                    return rule.category;
                }
            }
        }
        for rule in &self.rules {
            if file_name.contains(&rule.keyword) {
                return rule.category;
            }
        }
        Category::General
    }
}

impl SourceAdapter for FileAdapter {
    fn name(&self) -> &'static str {
        "files"
    }

    fn fetch_and_parse(&self) -> Result<AdapterOutput, AppError> {
        let mut documents = Vec::new();
        let mut warnings = Vec::new();

        if !self.root.is_dir() {
            warnings.push(
                IngestWarning::new("INGEST_DIR_MISSING", "Notes directory does not exist")
                    .with_details(format!("path={}", self.root.display())),
            );
            return Ok(AdapterOutput {
                documents,
                warnings,
            });
        }

        for path in collect_files(&self.root) {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();

            let text = match ext.as_str() {
                "txt" | "md" => fs::read_to_string(&path).map_err(|e| {
                    AppError::new("INGEST_FILE_UNREADABLE", "Failed to read note file")
                        .with_details(format!("path={}; err={e}", path.display()))
                }),
                "pdf" => pdf_to_text(&path),
                "docx" => docx_to_text(&path),
                _ => {
                    warnings.push(
                        IngestWarning::new("INGEST_FILE_UNSUPPORTED", "Unsupported note format")
                            .with_details(format!("path={}", path.display())),
                    );
                    continue;
                }
            };

            let text = match text {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "note skipped");
                    warnings.push(
                        IngestWarning::new("INGEST_FILE_SKIPPED", "Note could not be loaded")
                            .with_details(format!("path={}; err={e}", path.display())),
                    );
                    continue;
                }
            };

            if text.trim().is_empty() {
                warnings.push(
                    IngestWarning::new("INGEST_FILE_EMPTY", "Note contained no text")
                        .with_details(format!("path={}", path.display())),
                );
                continue;
            }

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "nota".to_string());

            documents.push(RawDocument {
                source_id: format!("note_{}", slug(&stem)),
                kind: SourceKind::Note,
                title: stem,
                category: self.infer_category(&path),
                url: None,
                origin: format!("{}/{}", self.name(), path.display()),
                fetched_at: now_rfc3339_utc()?,
                content: DocumentContent::Body(text),
            });
        }

        Ok(AdapterOutput {
            documents,
            warnings,
        })
    }
}

fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_sep = false;
    for c in s.to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
            prev_sep = false;
        } else if !prev_sep {
            out.push('_');
            prev_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

/// PDFs go through the `pdftotext` system binary; there is no in-process
/// PDF parser in the stack.
fn pdf_to_text(path: &Path) -> Result<String, AppError> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|e| {
            AppError::new("INGEST_PDF_TOOL_MISSING", "Failed to run pdftotext")
                .with_details(format!("path={}; err={e}", path.display()))
        })?;

    if !output.status.success() {
        return Err(
            AppError::new("INGEST_PDF_EXTRACT_FAILED", "pdftotext returned an error")
                .with_details(format!(
                    "path={}; stderr={}",
                    path.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                )),
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// A .docx file is a zip container; the document text lives in
/// `word/document.xml` inside `<w:t>` runs, with `</w:p>` closing each
/// paragraph.
fn docx_to_text(path: &Path) -> Result<String, AppError> {
    let file = fs::File::open(path).map_err(|e| {
        AppError::new("INGEST_FILE_UNREADABLE", "Failed to open docx file")
            .with_details(format!("path={}; err={e}", path.display()))
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        AppError::new("INGEST_DOCX_INVALID", "docx file is not a valid zip container")
            .with_details(format!("path={}; err={e}", path.display()))
    })?;
    let mut entry = archive.by_name("word/document.xml").map_err(|e| {
        AppError::new("INGEST_DOCX_INVALID", "docx file has no word/document.xml")
            .with_details(format!("path={}; err={e}", path.display()))
    })?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).map_err(|e| {
        AppError::new("INGEST_DOCX_INVALID", "Failed to read docx document body")
            .with_details(format!("path={}; err={e}", path.display()))
    })?;
    docx_xml_to_text(&xml)
}

fn docx_xml_to_text(xml: &str) -> Result<String, AppError> {
    let token = Regex::new(r"<w:t[^>]*>([^<]*)</w:t>|</w:p>").map_err(|e| {
        AppError::new("INGEST_PATTERN_INVALID", "docx text pattern failed to compile")
            .with_details(e.to_string())
    })?;

    let mut out = String::new();
    for cap in token.captures_iter(xml) {
        match cap.get(1) {
            Some(text) => out.push_str(&unescape_xml(text.as_str())),
            None => out.push_str("\n\n"),
        }
    }
    Ok(out.trim().to_string())
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
