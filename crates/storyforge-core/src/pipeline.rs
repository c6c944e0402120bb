//! End-to-end story pipeline.
//!
//! [`StoryPipeline`] is immutable once built. Changing the model or any
//! other setting means building a new pipeline and swapping it in; nothing
//! here is reconfigured in place.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::generate::{CompletionRequest, LanguageModel, ModelSettings};
use crate::index::Indexer;
use crate::models::{DocumentInput, GeneratedStory, IndexReport};
use crate::parser::parse_stories;
use crate::prompt::{assemble_prompt, join_context, PromptInputs};
use crate::retrieve::Retriever;

pub struct StoryPipeline {
    indexer: Indexer,
    retriever: Retriever,
    model: Arc<dyn LanguageModel>,
    settings: ModelSettings,
}

impl StoryPipeline {
    pub fn new(
        indexer: Indexer,
        retriever: Retriever,
        model: Arc<dyn LanguageModel>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            indexer,
            retriever,
            model,
            settings,
        }
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn settings(&self) -> ModelSettings {
        self.settings
    }

    /// Chunk, embed, and append a document to its project's collection.
    pub async fn process_document(&self, doc: &DocumentInput) -> Result<IndexReport> {
        self.indexer.index_document(doc).await
    }

    /// Retrieve context for `requirements`, prompt the model once, and parse
    /// its reply.
    ///
    /// Retrieval failures fall back to an empty context; model failures
    /// abort the request.
    pub async fn generate_stories(
        &self,
        project_id: &str,
        project_context: &str,
        requirements: &str,
    ) -> Result<Vec<GeneratedStory>> {
        let hits = self.retriever.retrieve(requirements, project_id).await;
        let context = join_context(&hits);

        let prompt = assemble_prompt(&PromptInputs {
            context: &context,
            project_context,
            requirements,
        });

        let raw = self
            .model
            .complete(&CompletionRequest {
                prompt: &prompt,
                settings: self.settings,
            })
            .await?;

        let stories = parse_stories(&raw, project_id);
        info!(
            project = %project_id,
            model = %self.model.name(),
            context_chunks = hits.len(),
            stories = stories.len(),
            "generated user stories"
        );
        Ok(stories)
    }
}
