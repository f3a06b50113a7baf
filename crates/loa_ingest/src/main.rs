use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::Parser;

use loa_ai::embeddings::{embed_chunks, HttpEmbedder};
use loa_ai::index::{FileIndex, HttpIndex, VectorIndex};
use loa_core::artifacts::{
    read_chunk_artifact, write_chunk_artifact, write_embedding_artifact, ChunkArtifactRecord,
    EmbeddingArtifactRecord,
};
use loa_core::chunker::{chunk_document, ChunkingConfig};
use loa_core::config::Config;
use loa_core::domain::{Chunk, IngestWarning, RawDocument};
use loa_core::error::AppError;
use loa_core::sources::{
    now_rfc3339_utc, files::default_category_rules, FileAdapter, GuideAdapter, SourceAdapter,
    StatuteAdapter,
};

/// Batch ingestion for the legal corpus: scrape sources, chunk them, embed
/// the chunks and upsert them into the vector index.
#[derive(Debug, Parser)]
#[command(name = "loa-ingest", version)]
struct Args {
    /// Run the scrape+chunk stage only; skip embedding and upsert.
    #[arg(long)]
    scrape_only: bool,

    /// Skip scraping; embed from the existing chunk artifact.
    #[arg(long)]
    skip_scraping: bool,

    /// Log errors only.
    #[arg(long)]
    quiet: bool,

    /// Directory with lawyer notes (txt/md/pdf/docx).
    #[arg(long, default_value = "data/notes")]
    notes_dir: PathBuf,

    /// Output directory for build artifacts and the local index.
    #[arg(long, default_value = "build")]
    out_dir: PathBuf,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.quiet);
    if dotenvy::dotenv().is_ok() {
        tracing::debug!("loaded .env");
    }

    if let Err(e) = run(&args) {
        tracing::error!(code = %e.code, error = %e, "ingestion failed");
        if let Some(details) = &e.details {
            tracing::error!(details = %details, "failure details");
        }
        std::process::exit(1);
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(args: &Args) -> Result<(), AppError> {
    if args.scrape_only && args.skip_scraping {
        return Err(AppError::new(
            "CONFIG_FLAGS_CONFLICT",
            "--scrape-only and --skip-scraping are mutually exclusive",
        ));
    }

    let config = Config::from_env()?;
    let chunks_path = args.out_dir.join("chunks.json");

    let records = if args.skip_scraping {
        tracing::info!(path = %chunks_path.display(), "loading existing chunk artifact");
        read_chunk_artifact(&chunks_path)?
    } else {
        scrape_stage(args, &config, &chunks_path)?
    };

    if args.scrape_only {
        println!(
            "scrape complete: {} chunks written to {}",
            records.len(),
            chunks_path.display()
        );
        return Ok(());
    }

    embed_stage(args, &config, &records)
}

/// Stage 1: run all adapters, chunk every document, write the chunk
/// artifact. Mandatory: fails only when no source produced any data.
fn scrape_stage(
    args: &Args,
    config: &Config,
    chunks_path: &Path,
) -> Result<Vec<ChunkArtifactRecord>, AppError> {
    let adapters: Vec<Box<dyn SourceAdapter>> = vec![
        Box::new(StatuteAdapter::from_default_catalog()?),
        Box::new(GuideAdapter::from_default_catalog()?),
        Box::new(FileAdapter::new(&args.notes_dir, default_category_rules())),
    ];

    let mut documents: Vec<RawDocument> = Vec::new();
    let mut warnings: Vec<IngestWarning> = Vec::new();
    let mut seen_sources: BTreeSet<String> = BTreeSet::new();

    for adapter in &adapters {
        tracing::info!(adapter = adapter.name(), "fetching sources");
        match adapter.fetch_and_parse() {
            Ok(output) => {
                warnings.extend(output.warnings);
                for doc in output.documents {
                    if !seen_sources.insert(doc.source_id.clone()) {
                        warnings.push(
                            IngestWarning::new(
                                "INGEST_SOURCE_DUPLICATE",
                                "Duplicate source_id skipped",
                            )
                            .with_details(format!("source_id={}", doc.source_id)),
                        );
                        continue;
                    }
                    documents.push(doc);
                }
            }
            Err(e) => {
                tracing::warn!(adapter = adapter.name(), error = %e, "adapter failed; continuing");
                warnings.push(
                    IngestWarning::new("INGEST_ADAPTER_FAILED", "Adapter failed entirely")
                        .with_details(format!("adapter={}; err={e}", adapter.name())),
                );
            }
        }
    }

    for warning in &warnings {
        tracing::warn!(code = %warning.code, message = %warning.message, "ingest warning");
    }

    if documents.is_empty() {
        return Err(AppError::new(
            "INGEST_NO_SOURCES",
            "No source produced any document; nothing to ingest",
        ));
    }

    let chunk_cfg = ChunkingConfig::from_tunables(&config.tunables);
    let processed_at = now_rfc3339_utc()?;
    let mut records: Vec<ChunkArtifactRecord> = Vec::new();
    for doc in &documents {
        for chunk in chunk_document(doc, &chunk_cfg) {
            records.push(ChunkArtifactRecord::from_chunk(&chunk, &processed_at));
        }
    }

    write_chunk_artifact(chunks_path, &records)?;
    tracing::info!(
        sources = documents.len(),
        chunks = records.len(),
        warnings = warnings.len(),
        "scrape stage complete"
    );
    Ok(records)
}

/// Stage 2: embed in batches, write the embedding artifact, upsert into
/// the index. Mandatory: fails when nothing could be embedded or the
/// upsert itself fails.
fn embed_stage(
    args: &Args,
    config: &Config,
    records: &[ChunkArtifactRecord],
) -> Result<(), AppError> {
    let chunks: Vec<Chunk> = records
        .iter()
        .map(|r| r.to_chunk())
        .collect::<Result<_, _>>()?;
    if chunks.is_empty() {
        return Err(AppError::new(
            "INGEST_NO_CHUNKS",
            "Chunk artifact is empty; nothing to embed",
        ));
    }

    let embedder = HttpEmbedder::new(
        &config.embeddings_url,
        config.require_embeddings_key()?,
        &config.embedding_model,
    );

    let embedded_at = now_rfc3339_utc()?;
    let report = embed_chunks(&embedder, &chunks, &embedded_at);
    for warning in &report.warnings {
        tracing::warn!(code = %warning.code, message = %warning.message, "embedding warning");
    }
    if report.embedded.is_empty() {
        return Err(AppError::new(
            "INGEST_EMBED_FAILED",
            "No chunk could be embedded",
        ));
    }

    let embeddings_path = args.out_dir.join("embeddings.json");
    let artifact: Vec<EmbeddingArtifactRecord> = report
        .embedded
        .iter()
        .map(|e| EmbeddingArtifactRecord::from_embedded(e, &embedded_at))
        .collect();
    write_embedding_artifact(&embeddings_path, &artifact)?;

    let index: Box<dyn VectorIndex> = match &config.vector_index_url {
        Some(url) => Box::new(HttpIndex::new(url, config.require_vector_index_key()?)),
        None => Box::new(FileIndex::open(args.out_dir.join("index"))),
    };
    let upserted = index.upsert(&report.embedded)?;
    let stats = index.stats()?;

    println!(
        "ingestion complete: {} chunks embedded ({} failed), {} upserted, index holds {} vectors",
        report.embedded.len(),
        report.failed_chunk_ids.len(),
        upserted,
        stats.vectors
    );
    Ok(())
}
