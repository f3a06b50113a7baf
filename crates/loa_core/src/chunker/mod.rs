use sha2::{Digest, Sha256};

use crate::config::Tunables;
use crate::domain::{Chunk, ChunkMeta, DocumentContent, RawDocument};

/// Window sizes are measured in characters, not bytes; the corpus is
/// Spanish text and accented characters must never be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn from_tunables(t: &Tunables) -> Self {
        Self {
            max_chars: t.chunk_size,
            overlap: t.chunk_overlap,
        }
    }

    /// Window bodies are packed to `max_chars - overlap` so that the
    /// overlap prefix never pushes a chunk past `max_chars`.
    fn body_budget(&self) -> usize {
        self.max_chars.saturating_sub(self.overlap).max(1)
    }
}

pub fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Normalize raw document text: trim each line, collapse runs of spaces and
/// tabs, cap consecutive newlines at 2.
pub fn normalize_text(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in raw.lines() {
        let mut collapsed = String::with_capacity(line.len());
        let mut in_space = false;
        for c in line.trim().chars() {
            if c == ' ' || c == '\t' {
                if !in_space {
                    collapsed.push(' ');
                }
                in_space = true;
            } else {
                collapsed.push(c);
                in_space = false;
            }
        }
        lines.push(collapsed);
    }

    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0usize;
    for line in lines {
        if line.is_empty() {
            blank_run += 1;
            // At most one blank line survives (two consecutive newlines).
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&line);
    }
    out.trim_matches('\n').to_string()
}

/// Byte offsets (exclusive of the leading whitespace) where a new sentence
/// starts: terminal punctuation, then whitespace, then an uppercase letter
/// or inverted punctuation mark.
fn sentence_starts(text: &str) -> Vec<usize> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut starts = Vec::new();
    let mut i = 0usize;
    while i < chars.len() {
        let (_, c) = chars[i];
        if matches!(c, '.' | '?' | '!') {
            let mut j = i + 1;
            let mut saw_space = false;
            while j < chars.len() && chars[j].1.is_whitespace() {
                saw_space = true;
                j += 1;
            }
            if saw_space && j < chars.len() {
                let next = chars[j].1;
                if next.is_uppercase() || matches!(next, '¿' | '¡') {
                    starts.push(chars[j].0);
                    i = j;
                    continue;
                }
            }
        }
        i += 1;
    }
    starts
}

/// Byte offsets right after every paragraph separator.
fn paragraph_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i + 1 < bytes.len() {
        if bytes[i] == b'\n' && bytes[i + 1] == b'\n' {
            let mut j = i + 2;
            while j < bytes.len() && bytes[j] == b'\n' {
                j += 1;
            }
            if j < bytes.len() {
                starts.push(j);
            }
            i = j;
        } else {
            i += 1;
        }
    }
    starts
}

/// Byte index of the boundary after `budget` characters from `from`.
fn hard_cut(text: &str, from: usize, budget: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(budget)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split normalized text into contiguous window bodies whose concatenation
/// equals the input exactly. Greedy by paragraph; paragraphs larger than the
/// budget fall back to sentence boundaries, then to a hard character cut.
fn window_bodies(text: &str, budget: usize) -> Vec<(usize, usize)> {
    if text.is_empty() {
        return Vec::new();
    }
    let paragraphs = paragraph_starts(text);
    let sentences = sentence_starts(text);

    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < text.len() {
        let remaining = &text[pos..];
        if char_len(remaining) <= budget {
            out.push((pos, text.len()));
            break;
        }
        let limit = hard_cut(text, pos, budget);

        let cut = best_boundary(&paragraphs, pos, limit)
            .or_else(|| best_boundary(&sentences, pos, limit))
            .unwrap_or(limit);
        out.push((pos, cut));
        pos = cut;
    }
    out
}

/// Largest boundary in `(after, upto]`.
fn best_boundary(boundaries: &[usize], after: usize, upto: usize) -> Option<usize> {
    boundaries
        .iter()
        .copied()
        .filter(|&b| b > after && b <= upto)
        .max()
}

/// Take the last `overlap` characters of a window body.
fn overlap_tail(body: &str, overlap: usize) -> &str {
    let len = char_len(body);
    if len <= overlap {
        return body;
    }
    let start = body
        .char_indices()
        .nth(len - overlap)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &body[start..]
}

/// Split one logical text into chunk texts with the configured overlap.
/// Each window after the first is prefixed with the tail of the previous
/// window body, so stripping those prefixes reconstructs the source.
fn chunk_texts(text: &str, cfg: &ChunkingConfig) -> Vec<String> {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return Vec::new();
    }
    let bodies = window_bodies(&normalized, cfg.body_budget());
    let mut out: Vec<String> = Vec::with_capacity(bodies.len());
    let mut prev: Option<(usize, usize)> = None;
    for (start, end) in bodies {
        let body = &normalized[start..end];
        let text = match prev {
            None => body.to_string(),
            Some((ps, pe)) => {
                let tail = overlap_tail(&normalized[ps..pe], cfg.overlap);
                format!("{tail}{body}")
            }
        };
        out.push(text);
        prev = Some((start, end));
    }
    out
}

/// Chunk a raw document. Statutes are chunked per article with the article
/// number propagated; guides and notes chunk the whole body. Ordinals are
/// dense and 0-based across the document.
pub fn chunk_document(doc: &RawDocument, cfg: &ChunkingConfig) -> Vec<Chunk> {
    let mut pieces: Vec<(Option<String>, String)> = Vec::new();
    match &doc.content {
        DocumentContent::Articles(articles) => {
            for article in articles {
                for text in chunk_texts(&article.text, cfg) {
                    pieces.push((Some(article.number.clone()), text));
                }
            }
        }
        DocumentContent::Body(body) => {
            for text in chunk_texts(body, cfg) {
                pieces.push((None, text));
            }
        }
    }

    let total = pieces.len() as u32;
    pieces
        .into_iter()
        .enumerate()
        .map(|(ordinal, (article_number, text))| {
            let ordinal = ordinal as u32;
            Chunk {
                chunk_id: Chunk::id_for(&doc.source_id, ordinal),
                text_sha256: sha256_hex(&text),
                text,
                meta: ChunkMeta {
                    source_id: doc.source_id.clone(),
                    kind: doc.kind,
                    title: doc.title.clone(),
                    category: doc.category,
                    url: doc.url.clone(),
                    article_number,
                    origin: doc.origin.clone(),
                    fetched_at: doc.fetched_at.clone(),
                    ordinal,
                    total_chunks: total,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalization_collapses_spaces_and_caps_newlines() {
        let raw = "  uno   dos\t tres  \n\n\n\ncuatro \n   \ncinco";
        assert_eq!(normalize_text(raw), "uno dos tres\n\ncuatro\n\ncinco");
    }

    #[test]
    fn sentence_starts_require_capital_after_punctuation() {
        let text = "Primera frase. Segunda frase num. 2 sigue. ¿Tercera?";
        let starts = sentence_starts(text);
        assert_eq!(starts.len(), 2);
        assert!(text[starts[0]..].starts_with("Segunda"));
        assert!(text[starts[1]..].starts_with("¿Tercera"));
    }

    #[test]
    fn small_text_is_one_window() {
        let cfg = ChunkingConfig::default();
        let texts = chunk_texts("un texto corto", &cfg);
        assert_eq!(texts, vec!["un texto corto".to_string()]);
    }

    #[test]
    fn overlap_prefixes_repeat_the_previous_tail() {
        let cfg = ChunkingConfig {
            max_chars: 100,
            overlap: 20,
        };
        let body = "palabra ".repeat(60);
        let texts = chunk_texts(&body, &cfg);
        assert!(texts.len() > 1);
        for pair in texts.windows(2) {
            let prev = &pair[0];
            let next = &pair[1];
            // The second window starts with the last 20 chars of the
            // previous window body.
            let prev_tail: String = prev
                .chars()
                .rev()
                .take(cfg.overlap)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            assert!(next.starts_with(&prev_tail));
        }
    }
}
