//! Retriever: query text → top-k chunks of one project.
//!
//! Retrieval degrades silently. A missing collection, a blank query, or a
//! failing embedding/store call all produce an empty result (failures are
//! logged at `warn`), so generation proceeds without document context.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::{PipelineError, Result};
use crate::models::RetrievedChunk;
use crate::store::{collection_name, ChunkFilter, VectorStore};

/// Default number of chunks returned per query.
pub const DEFAULT_MAX_RESULTS: usize = 5;

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    max_results: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Top [`max_results`](Self::max_results) chunks for `query` in `project_id`.
    pub async fn retrieve(&self, query: &str, project_id: &str) -> Vec<RetrievedChunk> {
        self.retrieve_top(query, project_id, self.max_results).await
    }

    /// Like [`retrieve`](Self::retrieve) with an explicit result cap.
    pub async fn retrieve_top(
        &self,
        query: &str,
        project_id: &str,
        top_k: usize,
    ) -> Vec<RetrievedChunk> {
        if query.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }

        match self.try_retrieve(query, project_id, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(project = %project_id, error = %e, "retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }

    async fn try_retrieve(
        &self,
        query: &str,
        project_id: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let collection = collection_name(project_id);
        if !self.store.collection_exists(&collection).await? {
            debug!(%collection, "collection does not exist");
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::provider("empty embedding response"))?;

        let hits = self
            .store
            .query(
                &collection,
                &query_vec,
                top_k,
                ChunkFilter::for_project(project_id),
            )
            .await?;

        Ok(hits
            .into_iter()
            .filter(|h| h.metadata.project_id == project_id)
            .take(top_k)
            .collect())
    }
}
