//! Loads a text document into the vector index used for retrieval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use futures_util::{stream, StreamExt};
use serde_json::{json, Map};

use chillpanda_backend::core::config::{AppPaths, ConfigService};
use chillpanda_backend::core::logging;
use chillpanda_backend::llm::{Embedder, OpenAiClient};
use chillpanda_backend::rag::{
    Chunker, ChunkerConfig, IndexedChunk, PineconeControl, PineconeIndex, TextChunk, VectorIndex,
};

const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const READY_MAX_POLLS: usize = 60;

#[derive(Parser)]
#[command(name = "ingest")]
#[command(version, about = "Chunk, embed and upsert a document into the Chill Panda index")]
struct Cli {
    /// UTF-8 text file to ingest (extract PDFs to text first)
    #[arg(long)]
    file: PathBuf,

    /// Source label stored with every chunk
    #[arg(long, default_value = "chill-panda-book")]
    source: String,

    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,

    #[arg(long, default_value_t = 200)]
    chunk_overlap: usize,

    /// Chunks per embedding request
    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    /// Embedding requests in flight at once
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = Arc::new(AppPaths::new());
    let config = ConfigService::new(paths).load()?;
    logging::init_cli(&config.logging.level);

    if cli.chunk_size == 0 || cli.chunk_overlap >= cli.chunk_size {
        bail!("--chunk-overlap must be smaller than a non-zero --chunk-size");
    }
    let Some(pinecone_key) = config.rag.pinecone_api_key.clone() else {
        bail!("PINECONE_API_KEY is not configured");
    };

    let text = tokio::fs::read_to_string(&cli.file)
        .await
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;

    let chunker = Chunker::new(ChunkerConfig {
        chunk_size: cli.chunk_size,
        chunk_overlap: cli.chunk_overlap,
    });
    let chunks = chunker.split(&text, &cli.source);
    if chunks.is_empty() {
        bail!("{} contains no text", cli.file.display());
    }
    tracing::info!("Split {} into {} chunks", cli.file.display(), chunks.len());

    let timeout = Duration::from_secs(config.generation.timeout_secs);
    let embedder = OpenAiClient::new(
        &config.generation.base_url,
        config.generation.api_key.clone(),
        config.generation.model.clone(),
        config.rag.embedding_model.clone(),
        timeout,
    )?;

    let control = PineconeControl::new(
        &config.rag.control_plane_url,
        &pinecone_key,
        Duration::from_secs(config.rag.timeout_secs),
    )?;
    let description = control
        .ensure_index(&config.rag, READY_POLL_INTERVAL, READY_MAX_POLLS)
        .await?;
    let host = config
        .rag
        .index_host
        .clone()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or(description.host);
    let index = PineconeIndex::new(
        &host,
        &pinecone_key,
        config.rag.namespace.clone(),
        Duration::from_secs(config.rag.timeout_secs),
    )?;

    let batches: Vec<&[TextChunk]> = chunks.chunks(cli.batch_size.max(1)).collect();
    let total_batches = batches.len();
    let embedder = &embedder;
    let index = &index;

    let results: Vec<anyhow::Result<usize>> = stream::iter(batches.into_iter().enumerate())
        .map(|(idx, batch)| async move {
            let inputs: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder
                .embed(&inputs)
                .await
                .with_context(|| format!("Embedding batch {} failed", idx + 1))?;

            let records = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, values)| to_indexed(chunk, values))
                .collect();
            let upserted = index
                .upsert(records)
                .await
                .with_context(|| format!("Upserting batch {} failed", idx + 1))?;

            tracing::info!("Stored batch {}/{} ({} vectors)", idx + 1, total_batches, upserted);
            Ok::<usize, anyhow::Error>(upserted)
        })
        .buffer_unordered(cli.concurrency.max(1))
        .collect()
        .await;

    let mut stored = 0;
    for result in results {
        stored += result?;
    }

    tracing::info!(
        "Stored {} chunks from {} in index '{}'",
        stored,
        cli.file.display(),
        config.rag.index_name
    );
    Ok(())
}

fn to_indexed(chunk: &TextChunk, values: Vec<f32>) -> IndexedChunk {
    let mut metadata = Map::new();
    metadata.insert("chunk_id".to_string(), json!(chunk.chunk_index));
    IndexedChunk {
        id: format!("{}-{}", chunk.source, chunk.chunk_index),
        values,
        text: chunk.text.clone(),
        source: chunk.source.clone(),
        metadata,
    }
}
