use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Content types the pipeline knows how to read. Adding a type means adding
/// a variant here and a matching extractor arm, not editing a dispatch chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Html,
    Pdf,
}

impl ContentKind {
    /// Maps a `Content-Type` header value onto a known kind. Parameters such
    /// as `; charset=utf-8` are tolerated.
    pub fn from_content_type(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or("").trim().to_lowercase();
        if essence.starts_with("text/html") {
            Some(Self::Html)
        } else if essence == "application/pdf" {
            Some(Self::Pdf)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Html => "text/html",
            Self::Pdf => "application/pdf",
        }
    }
}

/// A configured ingestion source. Read-only during a run.
#[derive(Debug, Clone)]
pub struct Source {
    pub url: Url,
    /// Expected content type, used only when the response omits the header.
    pub declared: Option<ContentKind>,
}

/// Raw bytes plus the content-type label the server declared for them.
/// Discarded after extraction.
#[derive(Debug, Clone)]
pub struct RawContent {
    pub url: Url,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct ExtractedBlock {
    pub text: String,
    /// 1-based page number for paginated formats.
    pub page: Option<u32>,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Ordered text blocks produced by one extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub blocks: Vec<ExtractedBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub source: String,
    pub content_type: String,
    pub page: Option<u32>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

/// A bounded text unit with its provenance. Immutable once built; the vector
/// store is its long-term owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A chunk paired with its embedding, ready for persistence.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// One similarity-search result. Lower distance means more similar.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalHit {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

/// Retrieval output. `collection_uninitialized` distinguishes "nothing loaded
/// yet" from "loaded but no relevant match"; callers must not conflate them.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub hits: Vec<RetrievalHit>,
    pub collection_uninitialized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Fetching,
    Extracting,
    Chunking,
    Embedding,
    Storing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Storing => "storing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SourceStatus {
    Stored { chunks: usize },
    Failed { stage: Stage, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub url: String,
    pub status: SourceStatus,
}

/// Per-source outcomes for one ingestion run. Never a single boolean: a
/// failing source does not abort the batch, so callers report partial success.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl IngestionReport {
    pub fn stored(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, SourceStatus::Stored { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.stored()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub used_fallback: bool,
}
