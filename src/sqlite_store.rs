//! SQLite-backed [`VectorStore`] implementation.
//!
//! Embeddings are stored as little-endian `f32` blobs in `chunk_vectors`
//! and scored in Rust with brute-force cosine similarity, which is plenty
//! for per-project collections of a few thousand chunks.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use storyforge_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use storyforge_core::models::{ChunkMetadata, ChunkRecord, RetrievedChunk};
use storyforge_core::store::{chunk_id, rank_and_truncate, ChunkFilter, VectorStore};
use storyforge_core::{PipelineError, Result};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of chunks in a collection.
    pub async fn count(&self, collection: &str) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(n as u64)
    }
}

fn store_err(e: sqlx::Error) -> PipelineError {
    PipelineError::provider(format!("vector store error: {}", e))
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn append(&self, collection: &str, records: &[ChunkRecord]) -> Result<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query(
            "INSERT INTO collections (name, next_seq, created_at) VALUES (?, 0, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(collection)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        // Reserve the whole range up front; the write lock is held until commit.
        let end: i64 = sqlx::query_scalar(
            "UPDATE collections SET next_seq = next_seq + ? WHERE name = ? RETURNING next_seq",
        )
        .bind(records.len() as i64)
        .bind(collection)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;
        let start = end - records.len() as i64;

        let mut ids = Vec::with_capacity(records.len());
        for (offset, record) in records.iter().enumerate() {
            let seq = start + offset as i64;
            let id = chunk_id(&record.metadata.project_id, seq as u64);
            let meta = &record.metadata;

            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (id, collection, seq, project_id, document_id, source,
                                           processed_at, chunk_index, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(collection)
            .bind(seq)
            .bind(&meta.project_id)
            .bind(&meta.document_id)
            .bind(&meta.source)
            .bind(&meta.processed_at)
            .bind(meta.chunk_index as i64)
            .bind(&record.text)
            .bind(vec_to_blob(&record.embedding))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

            ids.push(id);
        }

        tx.commit().await.map_err(store_err)?;
        Ok(ids)
    }

    async fn query(
        &self,
        collection: &str,
        query_vec: &[f32],
        top_k: usize,
        filter: ChunkFilter<'_>,
    ) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, project_id, document_id, source, processed_at, chunk_index, text, embedding
            FROM chunk_vectors
            WHERE collection = ? AND (? IS NULL OR project_id = ?)
            "#,
        )
        .bind(collection)
        .bind(filter.project_id)
        .bind(filter.project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut hits: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let chunk_index: i64 = row.get("chunk_index");
                RetrievedChunk {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata: ChunkMetadata {
                        project_id: row.get("project_id"),
                        document_id: row.get("document_id"),
                        source: row.get("source"),
                        processed_at: row.get("processed_at"),
                        chunk_index: chunk_index as usize,
                    },
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
                }
            })
            .collect();

        rank_and_truncate(&mut hits, top_k);
        Ok(hits)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM collections WHERE name = ?")
                .bind(collection)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err)?;
        Ok(exists)
    }
}
