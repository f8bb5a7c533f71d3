use crate::error::StoreError;
use crate::models::{ChunkMetadata, ChunkRecord, RetrievalHit};
use crate::stores::VectorStore;
use async_trait::async_trait;
use std::path::Path;
use tokio_rusqlite::{Connection, OptionalExtension};
use tracing::info;

/// On-disk vector collection backed by a SQLite database at
/// `<path>/<collection>.sqlite3`. Rows are append-only; the autoincrement
/// rowid is the opaque record key and doubles as insertion order.
///
/// A `collection_meta` row pins the embedding dimension at creation time, so
/// reopening the collection under a different model configuration fails fast
/// instead of mixing incompatible vectors.
#[derive(Debug)]
pub struct SqliteVectorStore {
    conn: Connection,
    dimensions: usize,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    metadata TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS collection_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    dimensions INTEGER NOT NULL
);
";

impl SqliteVectorStore {
    pub async fn open(
        path: &Path,
        collection: &str,
        dimensions: usize,
    ) -> Result<Self, StoreError> {
        let valid_name = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(StoreError::Unavailable(format!(
                "invalid collection name '{collection}'"
            )));
        }

        tokio::fs::create_dir_all(path).await.map_err(|error| {
            StoreError::Unavailable(format!("cannot create {}: {error}", path.display()))
        })?;

        let db_path = path.join(format!("{collection}.sqlite3"));
        let conn = Connection::open(db_path.clone()).await.map_err(|error| {
            StoreError::Unavailable(format!("cannot open {}: {error}", db_path.display()))
        })?;

        let stored_dimensions = conn
            .call(move |conn| -> tokio_rusqlite::Result<usize> {
                conn.execute_batch(SCHEMA)
                    .map_err(tokio_rusqlite::Error::Error)?;
                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT dimensions FROM collection_meta WHERE id = 1",
                        [],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Error)?;
                match existing {
                    Some(dims) => Ok(dims as usize),
                    None => {
                        conn.execute(
                            "INSERT INTO collection_meta (id, dimensions) VALUES (1, ?1)",
                            [dimensions as i64],
                        )
                        .map_err(tokio_rusqlite::Error::Error)?;
                        Ok(dimensions)
                    }
                }
            })
            .await
            .map_err(|error| StoreError::Unavailable(error.to_string()))?;

        if stored_dimensions != dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: dimensions,
                actual: stored_dimensions,
            });
        }

        info!(path = %db_path.display(), dimensions, "vector collection opened");

        Ok(Self { conn, dimensions })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        // Reject the whole batch before any row is written.
        for record in &records {
            if record.embedding.len() != self.dimensions {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: record.embedding.len(),
                });
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let metadata = serde_json::to_string(&record.chunk.metadata)
                .map_err(|error| StoreError::Backend(error.to_string()))?;
            rows.push((record.chunk.text, encode_vector(&record.embedding), metadata));
        }

        self.conn
            .call(move |conn| -> tokio_rusqlite::Result<()> {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Error)?;
                for (text, embedding, metadata) in &rows {
                    tx.execute(
                        "INSERT INTO chunks (text, embedding, metadata) VALUES (?1, ?2, ?3)",
                        (text, embedding, metadata),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|error| StoreError::Backend(error.to_string()))
    }

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalHit>, StoreError> {
        if query_vector.len() != self.dimensions {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let rows: Vec<(i64, String, Vec<u8>, String)> = self
            .conn
            .call(|conn| -> tokio_rusqlite::Result<Vec<(i64, String, Vec<u8>, String)>> {
                let mut stmt = conn
                    .prepare("SELECT id, text, embedding, metadata FROM chunks ORDER BY id")
                    .map_err(tokio_rusqlite::Error::Error)?;
                let mapped = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;
                let mut rows = Vec::new();
                for row in mapped {
                    rows.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                Ok(rows)
            })
            .await
            .map_err(|error| StoreError::Backend(error.to_string()))?;

        let mut scored = Vec::with_capacity(rows.len());
        for (key, text, blob, metadata_json) in rows {
            let vector = decode_vector(&blob, self.dimensions, key)?;
            let metadata: ChunkMetadata =
                serde_json::from_str(&metadata_json).map_err(|error| {
                    StoreError::CorruptRecord {
                        key,
                        detail: error.to_string(),
                    }
                })?;
            scored.push((
                key,
                RetrievalHit {
                    text,
                    metadata,
                    distance: cosine_distance(query_vector, &vector),
                },
            ));
        }

        scored.sort_by(|left, right| {
            left.1
                .distance
                .total_cmp(&right.1.distance)
                .then(left.0.cmp(&right.0))
        });
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, hit)| hit).collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.conn
            .call(|conn| -> tokio_rusqlite::Result<usize> {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Error)?;
                Ok(count as usize)
            })
            .await
            .map_err(|error| StoreError::Backend(error.to_string()))
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vector(blob: &[u8], dimensions: usize, key: i64) -> Result<Vec<f32>, StoreError> {
    if blob.len() != dimensions * 4 {
        return Err(StoreError::CorruptRecord {
            key,
            detail: format!(
                "embedding blob is {} bytes, expected {}",
                blob.len(),
                dimensions * 4
            ),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect())
}

fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm: f32 = left.iter().map(|v| v * v).sum::<f32>().sqrt();
    let right_norm: f32 = right.iter().map(|v| v * v).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 1.0;
    }
    1.0 - dot / (left_norm * right_norm)
}
