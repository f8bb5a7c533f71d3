use crate::chunk::{chunk_text, ChunkingConfig};
use crate::config::HtmlSettings;
use crate::embed::Embedder;
use crate::error::{IngestError, QueryError};
use crate::extract::extract;
use crate::fetch::SourceFetcher;
use crate::models::{
    Chunk, ChunkMetadata, ChunkRecord, ExtractedDocument, IngestionReport, RawContent, Retrieval,
    Source, SourceOutcome, SourceStatus, Stage,
};
use crate::stores::VectorStore;
use chrono::Utc;
use tracing::{info, warn};

/// The one pipeline handle for a process: fetcher, extraction rules, chunking
/// config, embedder, and store, constructed once at startup and passed by
/// reference wherever the pipeline is needed.
pub struct GuidePipeline<E, S>
where
    E: Embedder,
    S: VectorStore,
{
    fetcher: SourceFetcher,
    html_rules: HtmlSettings,
    chunking: ChunkingConfig,
    embedder: E,
    store: S,
    top_k: usize,
}

impl<E, S> GuidePipeline<E, S>
where
    E: Embedder + Send + Sync,
    S: VectorStore + Send + Sync,
{
    pub fn new(
        fetcher: SourceFetcher,
        html_rules: HtmlSettings,
        chunking: ChunkingConfig,
        embedder: E,
        store: S,
        top_k: usize,
    ) -> Self {
        Self {
            fetcher,
            html_rules,
            chunking,
            embedder,
            store,
            top_k,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Processes the source list strictly in order. A failing source is
    /// recorded and the loop moves on; it never aborts the batch.
    pub async fn ingest_all(&self, sources: &[Source]) -> IngestionReport {
        let mut outcomes = Vec::with_capacity(sources.len());

        for source in sources {
            let status = match self.ingest_source(source).await {
                Ok(chunks) => {
                    info!(url = %source.url, chunks, "source stored");
                    SourceStatus::Stored { chunks }
                }
                Err((stage, error)) => {
                    warn!(url = %source.url, %stage, error = %error, "source failed");
                    SourceStatus::Failed {
                        stage,
                        reason: error.to_string(),
                    }
                }
            };
            outcomes.push(SourceOutcome {
                url: source.url.to_string(),
                status,
            });
        }

        IngestionReport { outcomes }
    }

    async fn ingest_source(&self, source: &Source) -> Result<usize, (Stage, IngestError)> {
        let raw = self
            .fetcher
            .fetch(source)
            .await
            .map_err(|error| (Stage::Fetching, error))?;

        let document =
            extract(&raw, &self.html_rules).map_err(|error| (Stage::Extracting, error))?;

        let chunks = self.build_chunks(&raw, &document);
        if chunks.is_empty() {
            return Err((Stage::Chunking, IngestError::NoChunks));
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|error| (Stage::Embedding, error.into()))?;

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| ChunkRecord { chunk, embedding })
            .collect();
        let stored = records.len();

        self.store
            .upsert(records)
            .await
            .map_err(|error| (Stage::Storing, error.into()))?;

        Ok(stored)
    }

    fn build_chunks(&self, raw: &RawContent, document: &ExtractedDocument) -> Vec<Chunk> {
        let ingested_at = Utc::now();
        let mut chunks = Vec::new();

        for block in &document.blocks {
            for text in chunk_text(&block.text, self.chunking) {
                if text.trim().is_empty() {
                    continue;
                }
                chunks.push(Chunk {
                    text,
                    metadata: ChunkMetadata {
                        source: raw.url.to_string(),
                        content_type: raw.content_type.clone(),
                        page: block.page,
                        title: block.title.clone(),
                        author: block.author.clone(),
                        ingested_at,
                    },
                });
            }
        }

        chunks
    }

    /// Embeds the query once and returns the store's native ranking. An empty
    /// collection short-circuits with `collection_uninitialized` set so the
    /// caller can tell "nothing loaded" from "no relevant match".
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval, QueryError> {
        if query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        if self.store.count().await? == 0 {
            return Ok(Retrieval {
                hits: Vec::new(),
                collection_uninitialized: true,
            });
        }

        let query_vector = self.embedder.embed(query).await?;
        let hits = self
            .store
            .similarity_search(&query_vector, self.top_k)
            .await?;

        info!(hits = hits.len(), "retrieval complete");

        Ok(Retrieval {
            hits,
            collection_uninitialized: false,
        })
    }
}
