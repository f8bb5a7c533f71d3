use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("vector store unavailable: {0}")]
    Unavailable(String),

    #[error("collection stores {actual}-dimensional vectors but {expected} were configured")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("corrupt record {key}: {detail}")]
    CorruptRecord { key: i64, detail: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding service failure: {0}")]
    Service(String),

    #[error("embedding has dimension {actual}, configured model dimension is {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("transport failure for {url}: {detail}")]
    Transport { url: String, detail: String },

    #[error("no reader defined for content type '{0}'")]
    UnsupportedContentType(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("no chunks produced")]
    NoChunks,

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query is empty")]
    EmptyQuery,

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error("completion service failure: {0}")]
    Completion(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid source url '{url}': {detail}")]
    InvalidSource { url: String, detail: String },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
