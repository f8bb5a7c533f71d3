pub mod answer;
pub mod chunk;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod stores;

pub use answer::{GroundedAnswerer, OllamaCompleter, TextCompleter};
pub use chunk::{chunk_text, ChunkingConfig};
pub use config::{Config, DEFAULT_FALLBACK_RESPONSE, DEFAULT_PROMPT_TEMPLATE};
pub use embed::{Embedder, OllamaEmbedder};
pub use error::{ConfigError, EmbedError, IngestError, QueryError, StoreError};
pub use extract::extract;
pub use fetch::SourceFetcher;
pub use models::{
    Answer, Chunk, ChunkMetadata, ChunkRecord, ContentKind, ExtractedBlock, ExtractedDocument,
    IngestionReport, RawContent, Retrieval, RetrievalHit, Source, SourceOutcome, SourceStatus,
    Stage,
};
pub use pipeline::GuidePipeline;
pub use stores::{SqliteVectorStore, VectorStore};
