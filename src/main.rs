//! docrag - ingest documents and ask questions about them
//!
//! Usage:
//!   docrag ingest report-a.txt report-b.txt --query "total pages?"
//!   docrag list
//!   docrag delete report-a.txt
//!   docrag health --format json
//!   docrag query "How many pages in total?" --mode hybrid --top-k 60

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

use docrag_core::{CompletionGateway, EmbeddingGateway, QueryMode, QueryParam, UploadFile};
use docrag_orchestrator::{
    BatchOutcome, DeleteOutcome, DocumentEntry, HealthReport, HealthStatus, IngestReport,
    Orchestrator, ProviderStatus,
};
use docrag_provider::{ProviderConfig, StubCompletion, StubEmbedding, build_clients};

mod config;

use config::ServiceConfig;

/// Vector size of the offline stub embedding.
const OFFLINE_DIMENSION: usize = 64;

const DEFAULT_SUMMARY_QUERY: &str = "Summarize the uploaded documents.";

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "Document ingestion and hybrid retrieval over an LLM-backed knowledge base")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Use deterministic in-process providers instead of the remote APIs
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files, index them and summarize each batch
    Ingest {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Question asked against the index after each batch
        #[arg(short, long, default_value = DEFAULT_SUMMARY_QUERY)]
        query: String,
    },

    /// List indexed documents
    List,

    /// Delete a document by its uploaded filename
    Delete { filename: String },

    /// Check providers and store consistency
    Health,

    /// Ask a question against the indexed documents
    Query {
        text: String,

        /// Retrieval mode (local, global, hybrid, naive)
        #[arg(short, long, default_value = "hybrid")]
        mode: QueryMode,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long, default_value_t = 60)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = ServiceConfig::from_env()?;
    debug!(?config, "loaded service configuration");
    let orchestrator = build_orchestrator(&config, cli.offline).await?;

    match cli.command {
        Commands::Ingest { files, query } => {
            let uploads = read_uploads(&files).await?;
            let report = orchestrator.ingest(uploads, &query).await?;
            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => print_ingest(&report),
            }
        }
        Commands::List => {
            let documents = orchestrator.list_documents().await?;
            match cli.format {
                OutputFormat::Json => print_json(&documents)?,
                OutputFormat::Text => print_documents(&documents),
            }
        }
        Commands::Delete { filename } => {
            let outcome = orchestrator
                .delete_by_filename(&filename)
                .await
                .with_context(|| format!("Failed to delete '{filename}'"))?;
            match cli.format {
                OutputFormat::Json => print_json(&outcome)?,
                OutputFormat::Text => print_delete(&outcome),
            }
        }
        Commands::Health => {
            let report = orchestrator.self_test().await;
            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => print_health(&report),
            }
        }
        Commands::Query { text, mode, top_k } => {
            let answer = orchestrator.query(&text, &QueryParam::new(mode, top_k)).await?;
            match cli.format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "query": text,
                    "mode": mode,
                    "top_k": top_k,
                    "answer": answer,
                }))?,
                OutputFormat::Text => println!("{answer}"),
            }
        }
    }

    Ok(())
}

async fn build_orchestrator(config: &ServiceConfig, offline: bool) -> Result<Orchestrator> {
    let (embedding, completion): (Arc<dyn EmbeddingGateway>, Arc<dyn CompletionGateway>) = if offline {
        (
            Arc::new(StubEmbedding::new(OFFLINE_DIMENSION)),
            Arc::new(StubCompletion::new()),
        )
    } else {
        let provider = ProviderConfig::from_env()?;
        let (embedding, completion) = build_clients(&provider)?;
        (Arc::new(embedding), Arc::new(completion))
    };

    let orchestrator = Orchestrator::builder()
        .config(config.orchestrator.clone())
        .embedding(embedding)
        .completion(completion)
        .local_storage(config.index_config(), &config.storage_dir)
        .await?
        .build()?;
    Ok(orchestrator)
}

async fn read_uploads(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        uploads.push(UploadFile::new(filename, bytes));
    }
    Ok(uploads)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_ingest(report: &IngestReport) {
    for batch in &report.batches {
        println!(
            "{} Batch {} ({} file(s))",
            "📦".cyan(),
            batch.index + 1,
            batch.filenames.len()
        );
        match &batch.outcome {
            BatchOutcome::Summarized { filenames, summary } => {
                println!("{} Indexed: {}", "✅".green(), filenames.join(", "));
                println!("{}", summary);
            }
            BatchOutcome::IndexedWithoutSummary { filenames, error } => {
                println!("{} Indexed: {}", "✅".green(), filenames.join(", "));
                println!("{} Summary failed: {}", "⚠️".yellow(), error);
            }
            BatchOutcome::NotIndexed { error } => {
                println!("{} Nothing indexed: {}", "❌".red(), error);
            }
        }
        for failure in &batch.failures {
            println!("  {} {}: {}", "•".yellow(), failure.filename, failure.error);
        }
    }
}

fn print_documents(documents: &[DocumentEntry]) {
    if documents.is_empty() {
        println!("{}", "No documents indexed.".yellow());
        return;
    }
    println!("{}", "Documents".bold());
    for (i, doc) in documents.iter().enumerate() {
        println!(
            "  {}. {} {} ({} chunk(s))",
            i + 1,
            doc.filename.green(),
            doc.id.dimmed(),
            doc.chunk_count
        );
    }
}

fn print_delete(outcome: &DeleteOutcome) {
    println!("{} Deleted {} ({})", "🗑️".cyan(), outcome.filename.bold(), outcome.id);
    if !outcome.index_deleted {
        println!("  {} the index no longer held this document", "•".yellow());
    }
    if !outcome.blob_removed {
        println!("  {} the stored file was already gone", "•".yellow());
    }
}

fn print_health(report: &HealthReport) {
    let status = match report.status {
        HealthStatus::Ok => "ok".green(),
        HealthStatus::LlmError => "llm_error".yellow(),
        HealthStatus::FileError => "file_error".red(),
    };
    println!("{} {}", "Status:".bold(), status);

    let line = |name: &str, status: &ProviderStatus| match status {
        ProviderStatus::Ok => println!("  {} {}", "✅".green(), name),
        ProviderStatus::Error(message) => println!("  {} {}: {}", "❌".red(), name, message),
    };
    line("LLM", &report.llm);
    line("Embedding", &report.embedding);
    line("Index", &report.index);
    if let Some(dimension) = report.embedding_dimension {
        println!("  Embedding dimension: {dimension}");
    }

    let stores = &report.stores;
    println!(
        "  Files: {}  Indexed: {}  Pending: {}  Failed: {}",
        stores.blob_count, stores.indexed_count, stores.pending_count, stores.failed_count
    );
    for name in &stores.orphan_blobs {
        println!("  {} stored file without document: {}", "•".yellow(), name);
    }
    for name in &stores.missing_blobs {
        println!("  {} document without stored file: {}", "•".yellow(), name);
    }
    if let Some(error) = &stores.error {
        println!("  {} {}", "❌".red(), error);
    }
    if let Some(documents) = &report.documents {
        print_documents(documents);
    }
}
