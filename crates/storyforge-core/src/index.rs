//! Indexer: chunk → embed → append.
//!
//! Chunks a document with the configured [`ChunkingParams`], embeds the
//! windows in batches, and appends the resulting records to the project's
//! collection in a single store call. A failure anywhere before the append
//! leaves the collection untouched.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::chunk::{chunk_text, ChunkingParams};
use crate::embedding::EmbeddingProvider;
use crate::error::{PipelineError, Result};
use crate::models::{ChunkMetadata, ChunkRecord, DocumentInput, IndexReport};
use crate::store::{collection_name, VectorStore};

/// Default number of texts sent per embedding call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingParams,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingParams,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn chunking(&self) -> &ChunkingParams {
        &self.chunking
    }

    /// Index one document into its project's collection.
    ///
    /// Re-indexing the same document appends duplicate chunks; there is no
    /// upsert.
    pub async fn index_document(&self, doc: &DocumentInput) -> Result<IndexReport> {
        let collection = collection_name(&doc.project_id);
        let windows = chunk_text(&doc.text, &self.chunking);

        if windows.is_empty() {
            debug!(document = %doc.document_id, "document has no text, nothing to index");
            return Ok(IndexReport {
                project_id: doc.project_id.clone(),
                document_id: doc.document_id.clone(),
                source: doc.source.clone(),
                collection,
                chunks: 0,
                content_hash: None,
            });
        }

        let processed_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut records = Vec::with_capacity(windows.len());

        for batch in windows.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|w| w.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(PipelineError::provider(format!(
                    "embedding provider '{}' returned {} vectors for {} texts",
                    self.embedder.model_name(),
                    vectors.len(),
                    texts.len()
                )));
            }

            for (window, embedding) in batch.iter().zip(vectors) {
                records.push(ChunkRecord {
                    text: window.text.clone(),
                    embedding,
                    metadata: ChunkMetadata {
                        project_id: doc.project_id.clone(),
                        document_id: doc.document_id.clone(),
                        source: doc.source.clone(),
                        processed_at: processed_at.clone(),
                        chunk_index: window.index,
                    },
                });
            }
        }

        self.store.append(&collection, &records).await?;

        info!(
            project = %doc.project_id,
            document = %doc.document_id,
            chunks = records.len(),
            "processed chunks for project"
        );

        Ok(IndexReport {
            project_id: doc.project_id.clone(),
            document_id: doc.document_id.clone(),
            source: doc.source.clone(),
            collection,
            chunks: records.len(),
            content_hash: None,
        })
    }
}
