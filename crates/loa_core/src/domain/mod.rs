use serde::{Deserialize, Serialize};

/// What kind of upstream source a document came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Statute,
    RegulatorGuide,
    Note,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Statute => "statute",
            SourceKind::RegulatorGuide => "regulator_guide",
            SourceKind::Note => "note",
        }
    }

    pub fn parse(s: &str) -> Option<SourceKind> {
        match s {
            "statute" => Some(SourceKind::Statute),
            "regulator_guide" => Some(SourceKind::RegulatorGuide),
            "note" => Some(SourceKind::Note),
            _ => None,
        }
    }
}

/// Closed set of legal area tags. `category` fields in chunk metadata and
/// query filters must come from this set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Laboral,
    Familia,
    Civil,
    Arriendos,
    Deudas,
    Consumidor,
    Penal,
    Migracion,
    Administrativo,
    Tributario,
    Societario,
    PropiedadIntelectual,
    Notarial,
    Sucesiones,
    Bancario,
    Seguros,
    General,
}

impl Category {
    pub const ALL: [Category; 17] = [
        Category::Laboral,
        Category::Familia,
        Category::Civil,
        Category::Arriendos,
        Category::Deudas,
        Category::Consumidor,
        Category::Penal,
        Category::Migracion,
        Category::Administrativo,
        Category::Tributario,
        Category::Societario,
        Category::PropiedadIntelectual,
        Category::Notarial,
        Category::Sucesiones,
        Category::Bancario,
        Category::Seguros,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Laboral => "laboral",
            Category::Familia => "familia",
            Category::Civil => "civil",
            Category::Arriendos => "arriendos",
            Category::Deudas => "deudas",
            Category::Consumidor => "consumidor",
            Category::Penal => "penal",
            Category::Migracion => "migracion",
            Category::Administrativo => "administrativo",
            Category::Tributario => "tributario",
            Category::Societario => "societario",
            Category::PropiedadIntelectual => "propiedad_intelectual",
            Category::Notarial => "notarial",
            Category::Sucesiones => "sucesiones",
            Category::Bancario => "bancario",
            Category::Seguros => "seguros",
            Category::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s.trim().to_lowercase())
    }

    /// Every category maps to a lawyer specialty; `general` routes to the
    /// broadest one.
    pub fn specialty(&self) -> SpecialtyTag {
        match self {
            Category::Laboral => SpecialtyTag::Laboral,
            Category::Familia => SpecialtyTag::Familia,
            Category::Civil | Category::General => SpecialtyTag::CivilYContratos,
            Category::Arriendos => SpecialtyTag::Arriendos,
            Category::Deudas => SpecialtyTag::DeudasYCobranza,
            Category::Consumidor => SpecialtyTag::Consumidor,
            Category::Penal => SpecialtyTag::Penal,
            Category::Migracion => SpecialtyTag::Migracion,
            Category::Administrativo => SpecialtyTag::Administrativo,
            Category::Tributario => SpecialtyTag::Tributario,
            Category::Societario => SpecialtyTag::Societario,
            Category::PropiedadIntelectual => SpecialtyTag::PropiedadIntelectual,
            Category::Notarial => SpecialtyTag::Notarial,
            Category::Sucesiones => SpecialtyTag::Herencias,
            Category::Bancario => SpecialtyTag::Bancario,
            Category::Seguros => SpecialtyTag::Seguros,
        }
    }
}

/// Closed set of lawyer specialty tags used for matching and handoff.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SpecialtyTag {
    Laboral,
    Familia,
    CivilYContratos,
    Arriendos,
    DeudasYCobranza,
    Consumidor,
    Penal,
    Migracion,
    Administrativo,
    Tributario,
    Societario,
    PropiedadIntelectual,
    Notarial,
    Herencias,
    Bancario,
    Seguros,
}

impl SpecialtyTag {
    pub fn display_name(&self) -> &'static str {
        match self {
            SpecialtyTag::Laboral => "Laboral",
            SpecialtyTag::Familia => "Familia",
            SpecialtyTag::CivilYContratos => "Civil y Contratos",
            SpecialtyTag::Arriendos => "Arriendos",
            SpecialtyTag::DeudasYCobranza => "Deudas y Cobranza",
            SpecialtyTag::Consumidor => "Consumidor",
            SpecialtyTag::Penal => "Penal",
            SpecialtyTag::Migracion => "Migración",
            SpecialtyTag::Administrativo => "Administrativo",
            SpecialtyTag::Tributario => "Tributario",
            SpecialtyTag::Societario => "Societario",
            SpecialtyTag::PropiedadIntelectual => "Propiedad Intelectual",
            SpecialtyTag::Notarial => "Notarial",
            SpecialtyTag::Herencias => "Herencias",
            SpecialtyTag::Bancario => "Bancario",
            SpecialtyTag::Seguros => "Seguros",
        }
    }
}

/// One article of a structured statute, with the number as printed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub number: String,
    pub text: String,
}

/// Structured statutes carry articles; guides and notes carry one body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentContent {
    Articles(Vec<Article>),
    Body(String),
}

/// One normalized upstream item produced by a source adapter.
///
/// `source_id` is stable and unique across an ingestion batch; `origin`
/// names the adapter or file that produced the document (provenance).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawDocument {
    pub source_id: String,
    pub kind: SourceKind,
    pub title: String,
    pub category: Category,
    pub url: Option<String>,
    pub origin: String,
    pub fetched_at: String,
    pub content: DocumentContent,
}

/// Metadata carried by every chunk. Enough to render a citation without
/// re-reading the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMeta {
    pub source_id: String,
    pub kind: SourceKind,
    pub title: String,
    pub category: Category,
    pub url: Option<String>,
    pub article_number: Option<String>,
    pub origin: String,
    pub fetched_at: String,
    pub ordinal: u32,
    pub total_chunks: u32,
}

/// The atomic unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    pub text_sha256: String,
    pub meta: ChunkMeta,
}

impl Chunk {
    /// Stable across re-ingest of the same source.
    pub fn id_for(source_id: &str, ordinal: u32) -> String {
        format!("{source_id}_{ordinal}")
    }
}

/// A chunk plus its vector. The vector store owns the authoritative copy;
/// the on-disk JSON artifact is a build product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
    pub embedded_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of conversation history. Ordered, append-only within a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Non-fatal ingestion problem. Batches collect these and continue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl IngestWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
