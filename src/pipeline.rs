//! Wiring from [`Config`] to a ready [`StoryPipeline`].
//!
//! The CLI and the HTTP server both go through [`open_store`] and
//! [`build_pipeline`]; nothing else constructs providers.

use std::sync::Arc;

use anyhow::Result;

use storyforge_core::chunk::ChunkingParams;
use storyforge_core::embedding::EmbeddingProvider;
use storyforge_core::generate::ModelSettings;
use storyforge_core::index::Indexer;
use storyforge_core::retrieve::Retriever;
use storyforge_core::store::VectorStore;
use storyforge_core::{PipelineError, StoryPipeline};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::llm::create_model;
use crate::migrate;
use crate::sqlite_store::SqliteVectorStore;

/// Connect to the configured database, making sure the schema exists.
pub async fn open_store(config: &Config) -> Result<Arc<SqliteVectorStore>> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    Ok(Arc::new(SqliteVectorStore::new(pool)))
}

/// Build a retriever only. Searching needs no language model.
pub fn build_retriever(
    config: &Config,
    store: Arc<dyn VectorStore>,
) -> Result<Retriever, PipelineError> {
    let embedder = create_embedder(&config.embedding)?;
    Ok(Retriever::new(embedder, store).with_max_results(config.retrieval.max_results))
}

/// Build an indexer only. Indexing needs no language model.
pub fn build_indexer(
    config: &Config,
    store: Arc<dyn VectorStore>,
) -> Result<Indexer, PipelineError> {
    let embedder = create_embedder(&config.embedding)?;
    Ok(Indexer::new(embedder, store, chunking_params(config)?)
        .with_batch_size(config.embedding.batch_size))
}

fn chunking_params(config: &Config) -> Result<ChunkingParams, PipelineError> {
    ChunkingParams::new(config.chunking.chunk_size, config.chunking.chunk_overlap)
}

/// Build the full pipeline: embedder, indexer, retriever, and language model.
pub fn build_pipeline(
    config: &Config,
    store: Arc<dyn VectorStore>,
) -> Result<StoryPipeline, PipelineError> {
    let embedder: Arc<dyn EmbeddingProvider> = create_embedder(&config.embedding)?;
    let indexer = Indexer::new(embedder.clone(), store.clone(), chunking_params(config)?)
        .with_batch_size(config.embedding.batch_size);
    let retriever =
        Retriever::new(embedder, store).with_max_results(config.retrieval.max_results);

    let model = create_model(&config.llm)?;
    let settings = ModelSettings {
        temperature: config.llm.temperature,
        max_tokens: config.llm.max_tokens,
    };

    Ok(StoryPipeline::new(indexer, retriever, model, settings))
}

/// Project ids become part of collection names and chunk ids, so keep
/// them to `[A-Za-z0-9_-]`.
pub fn validate_project_id(project_id: &str) -> Result<(), String> {
    if project_id.is_empty() {
        return Err("project id must not be empty".to_string());
    }
    if project_id.len() > 128 {
        return Err("project id must be at most 128 characters".to_string());
    }
    if !project_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(format!(
            "invalid project id '{}': use letters, digits, '_' or '-'",
            project_id
        ));
    }
    Ok(())
}
