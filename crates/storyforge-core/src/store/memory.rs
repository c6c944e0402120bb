//! In-memory [`VectorStore`] for tests and embedded use.
//!
//! Collections are `Vec`s behind a single `RwLock`; queries are brute-force
//! cosine similarity over every record in the collection.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{PipelineError, Result};
use crate::models::{ChunkMetadata, ChunkRecord, RetrievedChunk};

use super::{chunk_id, rank_and_truncate, ChunkFilter, VectorStore};

struct StoredVector {
    id: String,
    text: String,
    embedding: Vec<f32>,
    metadata: ChunkMetadata,
}

#[derive(Default)]
struct Collection {
    next_seq: u64,
    entries: Vec<StoredVector>,
}

/// In-memory store keyed by collection name.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection (0 if it does not exist).
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, |col| col.entries.len()))
            .unwrap_or(0)
    }
}

fn poisoned() -> PipelineError {
    PipelineError::provider("in-memory vector store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn append(&self, collection: &str, records: &[ChunkRecord]) -> Result<Vec<String>> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let col = collections.entry(collection.to_string()).or_default();

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = chunk_id(&record.metadata.project_id, col.next_seq);
            col.next_seq += 1;
            col.entries.push(StoredVector {
                id: id.clone(),
                text: record.text.clone(),
                embedding: record.embedding.clone(),
                metadata: record.metadata.clone(),
            });
            ids.push(id);
        }
        Ok(ids)
    }

    async fn query(
        &self,
        collection: &str,
        query_vec: &[f32],
        top_k: usize,
        filter: ChunkFilter<'_>,
    ) -> Result<Vec<RetrievedChunk>> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let col = match collections.get(collection) {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };

        let mut hits: Vec<RetrievedChunk> = col
            .entries
            .iter()
            .filter(|sv| filter.matches(&sv.metadata.project_id))
            .map(|sv| RetrievedChunk {
                id: sv.id.clone(),
                text: sv.text.clone(),
                metadata: sv.metadata.clone(),
                score: cosine_similarity(query_vec, &sv.embedding),
            })
            .collect();

        rank_and_truncate(&mut hits, top_k);
        Ok(hits)
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.contains_key(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(project: &str, text: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            text: text.to_string(),
            embedding,
            metadata: ChunkMetadata {
                project_id: project.to_string(),
                document_id: "doc".to_string(),
                source: "notes.txt".to_string(),
                processed_at: "2026-01-01T00:00:00Z".to_string(),
                chunk_index: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_append_assigns_sequential_ids() {
        let store = InMemoryVectorStore::new();
        let first = store
            .append("project_a", &[record("a", "one", vec![1.0]), record("a", "two", vec![1.0])])
            .await
            .unwrap();
        let second = store
            .append("project_a", &[record("a", "three", vec![1.0])])
            .await
            .unwrap();
        assert_eq!(first, vec!["a_0", "a_1"]);
        assert_eq!(second, vec!["a_2"]);
        assert_eq!(store.len("project_a"), 3);
    }

    #[tokio::test]
    async fn test_query_ranks_and_truncates() {
        let store = InMemoryVectorStore::new();
        store
            .append(
                "project_a",
                &[
                    record("a", "far", vec![0.0, 1.0]),
                    record("a", "near", vec![1.0, 0.0]),
                    record("a", "mid", vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store
            .query("project_a", &[1.0, 0.0], 2, ChunkFilter::for_project("a"))
            .await
            .unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "mid"]);
    }

    #[tokio::test]
    async fn test_query_applies_project_filter() {
        let store = InMemoryVectorStore::new();
        store
            .append(
                "shared",
                &[record("a", "mine", vec![1.0]), record("b", "theirs", vec![1.0])],
            )
            .await
            .unwrap();

        let hits = store
            .query("shared", &[1.0], 10, ChunkFilter::for_project("a"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.project_id, "a");
    }

    #[tokio::test]
    async fn test_missing_collection() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("project_x").await.unwrap());
        let hits = store
            .query("project_x", &[1.0], 5, ChunkFilter::default())
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
