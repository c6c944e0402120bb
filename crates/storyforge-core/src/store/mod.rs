//! Vector store abstraction.
//!
//! A [`VectorStore`] holds one append-only collection per project. The
//! pipeline never updates or deletes entries; re-indexing a document
//! appends a second copy of its chunks.
//!
//! Implementations must be `Send + Sync` and are responsible for their own
//! synchronisation: sequence allocation for an append must be atomic with
//! the insert so concurrent writers to one collection never reuse an id.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChunkRecord, RetrievedChunk};

/// Name of the collection that holds a project's chunks.
pub fn collection_name(project_id: &str) -> String {
    format!("project_{}", project_id)
}

/// Identity of the `seq`-th chunk appended to a project's collection.
pub fn chunk_id(project_id: &str, seq: u64) -> String {
    format!("{}_{}", project_id, seq)
}

/// Metadata restriction applied to a similarity query.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkFilter<'a> {
    /// Only return chunks whose metadata carries this project id.
    pub project_id: Option<&'a str>,
}

impl<'a> ChunkFilter<'a> {
    pub fn for_project(project_id: &'a str) -> Self {
        Self {
            project_id: Some(project_id),
        }
    }

    pub fn matches(&self, record_project: &str) -> bool {
        self.project_id.map_or(true, |p| p == record_project)
    }
}

/// Abstract vector store backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`append`](VectorStore::append) | Append records, creating the collection on first use |
/// | [`query`](VectorStore::query) | Top-k cosine similarity search with a metadata filter |
/// | [`collection_exists`](VectorStore::collection_exists) | Whether anything was ever appended |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append records to `collection`. Returns the assigned chunk ids in order.
    async fn append(&self, collection: &str, records: &[ChunkRecord]) -> Result<Vec<String>>;

    /// Return at most `top_k` chunks ranked by descending similarity.
    async fn query(
        &self,
        collection: &str,
        query_vec: &[f32],
        top_k: usize,
        filter: ChunkFilter<'_>,
    ) -> Result<Vec<RetrievedChunk>>;

    async fn collection_exists(&self, collection: &str) -> Result<bool>;
}

/// Sort hits by descending score and keep the best `top_k`.
pub fn rank_and_truncate(hits: &mut Vec<RetrievedChunk>, top_k: usize) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
}
