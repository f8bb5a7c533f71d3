use crate::error::StoreError;
use crate::models::{ChunkRecord, RetrievalHit};
use async_trait::async_trait;

pub mod sqlite;

pub use sqlite::SqliteVectorStore;

/// Persists embedded chunks and answers nearest-neighbor queries over them.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Appends records to the collection. Records are never overwritten;
    /// every chunk is an independent row.
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<(), StoreError>;

    /// Returns up to `k` hits ordered ascending by distance (most similar
    /// first), ties broken by insertion order.
    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalHit>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
