use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use grounded_qa_core::{
    ChunkingConfig, Config, GroundedAnswerer, GuidePipeline, OllamaCompleter, OllamaEmbedder,
    SourceFetcher, SourceStatus, SqliteVectorStore, VectorStore,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "grounded-qa", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every configured source and store its chunks.
    Ingest,
    /// Retrieve context for a question and compose a grounded answer.
    Ask {
        /// The question to answer.
        #[arg(long)]
        query: String,
        /// Number of context chunks to retrieve.
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Report how many chunks the collection holds.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        Config::from_toml_file(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        info!(path = %cli.config.display(), "config file not found, using defaults");
        Config::default()
    };

    let store = SqliteVectorStore::open(
        &config.store.path,
        &config.store.collection,
        config.embedding.dimensions,
    )
    .await
    .context("opening vector store")?;

    let embedder = OllamaEmbedder::new(
        &config.embedding.base_url,
        config.embedding.model.clone(),
        config.embedding.dimensions,
        std::time::Duration::from_secs(config.embedding.timeout_secs),
    )
    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let fetcher = SourceFetcher::new(&config.fetch).context("building http client")?;
    let chunking = ChunkingConfig::new(
        config.chunking.max_chars,
        config.chunking.overlap_chars,
    )
    .context("validating chunking config")?;

    let top_k = match &cli.command {
        Command::Ask {
            top_k: Some(k), ..
        } => *k,
        _ => config.retrieval.top_k,
    };

    let pipeline = GuidePipeline::new(
        fetcher,
        config.html.clone(),
        chunking,
        embedder,
        store,
        top_k,
    );

    info!(started_at = %Utc::now().to_rfc3339(), "grounded-qa boot");

    match cli.command {
        Command::Ingest => {
            let sources = config.resolve_sources().context("resolving sources")?;
            if sources.is_empty() {
                println!("no sources configured; add [[sources]] entries to the config");
                return Ok(());
            }

            let report = pipeline.ingest_all(&sources).await;

            for outcome in &report.outcomes {
                match &outcome.status {
                    SourceStatus::Stored { chunks } => {
                        println!("stored  {} ({chunks} chunks)", outcome.url);
                    }
                    SourceStatus::Failed { stage, reason } => {
                        println!("failed  {} [{stage}] {reason}", outcome.url);
                    }
                }
            }
            println!(
                "{} stored, {} failed at {}",
                report.stored(),
                report.failed(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { query, .. } => {
            let retrieval = pipeline
                .retrieve(&query)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if retrieval.collection_uninitialized {
                println!("no documents loaded yet; run `grounded-qa ingest` first");
                return Ok(());
            }

            for hit in &retrieval.hits {
                println!(
                    "[distance {:.4}] source={} page={}",
                    hit.distance,
                    hit.metadata.source,
                    hit.metadata
                        .page
                        .map(|page| page.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
                println!("  {}", hit.text);
            }

            let completer = OllamaCompleter::new(
                &config.chat.base_url,
                config.chat.model.clone(),
                std::time::Duration::from_secs(config.chat.timeout_secs),
            )
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let answerer = GroundedAnswerer::new(
                completer,
                config.chat.prompt_template.clone(),
                config.chat.fallback_response.clone(),
                config.chat.temperature,
            );

            let started = std::time::Instant::now();
            let answer = answerer
                .compose_answer(&retrieval.hits, &query)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            info!(
                duration_ms = started.elapsed().as_millis() as u64,
                used_fallback = answer.used_fallback,
                "answer composed"
            );

            println!("\nanswer:\n{}", answer.text);
        }
        Command::Status => {
            let count = pipeline
                .store()
                .count()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!(
                "collection '{}' at {} holds {count} chunks",
                config.store.collection,
                config.store.path.display()
            );
        }
    }

    Ok(())
}
