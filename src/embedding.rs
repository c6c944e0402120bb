//! Embedding provider implementations.
//!
//! | Config value | Provider | Endpoint |
//! |--------------|----------|----------|
//! | `"disabled"` | [`DisabledEmbedder`] | none, every call fails |
//! | `"openai"` | [`OpenAiEmbedder`] | `POST {base_url}/embeddings` |
//! | `"azure"` | [`AzureOpenAiEmbedder`] | `POST {base_url}/openai/deployments/{model}/embeddings` |
//! | `"ollama"` | [`OllamaEmbedder`] | `POST {base_url}/api/embed` |
//!
//! Use [`create_embedder`] to build the provider named in
//! [`EmbeddingConfig`]. Providers never retry.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use storyforge_core::embedding::EmbeddingProvider;
use storyforge_core::{PipelineError, Result};

use crate::config::EmbeddingConfig;
use crate::provider::{build_client, require_api_key, send_json, trim_base_url};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const AZURE_API_VERSION: &str = "2024-02-01";

/// Build the provider named by `config.provider`.
///
/// # Errors
///
/// [`PipelineError::Configuration`] for unknown providers, a missing model,
/// or a missing API key.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "azure" => Ok(Arc::new(AzureOpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        other => Err(PipelineError::configuration(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

fn required_model(config: &EmbeddingConfig) -> Result<String> {
    config.model.clone().ok_or_else(|| {
        PipelineError::configuration(format!(
            "embedding.model required for the {} provider",
            config.provider
        ))
    })
}

// ============ Disabled ============

/// Used when `embedding.provider = "disabled"`. Indexing fails; retrieval
/// degrades to an empty context.
pub struct DisabledEmbedder;

#[async_trait]
impl EmbeddingProvider for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(PipelineError::provider(
            "embedding provider is disabled; set [embedding] provider in config",
        ))
    }
}

// ============ OpenAI-compatible wire format ============

#[derive(Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingItem>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Order vectors by the `index` field the API reports.
fn into_ordered_vectors(response: OpenAiEmbeddingResponse) -> Vec<Vec<f32>> {
    let mut data = response.data;
    data.sort_by_key(|item| item.index);
    data.into_iter().map(|item| item.embedding).collect()
}

// ============ OpenAI ============

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key: require_api_key("openai", config.api_key_env.as_deref())?,
            base_url: trim_base_url(config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL)),
            model: required_model(config)?,
            dims: config.dims.unwrap_or(0),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&OpenAiEmbeddingRequest {
                model: Some(&self.model),
                input: texts,
            });
        let response: OpenAiEmbeddingResponse = send_json(request, "OpenAI embeddings").await?;
        Ok(into_ordered_vectors(response))
    }
}

// ============ Azure OpenAI ============

/// Azure OpenAI deployment. `model` names the deployment.
pub struct AzureOpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    deployment: String,
    dims: usize,
}

impl AzureOpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base = config.base_url.as_deref().ok_or_else(|| {
            PipelineError::configuration("embedding.base_url required for the azure provider")
        })?;
        let deployment = required_model(config)?;
        let api_version = config.api_version.as_deref().unwrap_or(AZURE_API_VERSION);

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key: require_api_key("azure", config.api_key_env.as_deref())?,
            endpoint: format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                trim_base_url(base),
                deployment,
                api_version
            ),
            deployment,
            dims: config.dims.unwrap_or(0),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for AzureOpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.deployment
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(&OpenAiEmbeddingRequest {
                model: None,
                input: texts,
            });
        let response: OpenAiEmbeddingResponse =
            send_json(request, "Azure OpenAI embeddings").await?;
        Ok(into_ordered_vectors(response))
    }
}

// ============ Ollama ============

/// Local Ollama instance (`ollama pull nomic-embed-text`). No API key.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: trim_base_url(config.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL)),
            model: required_model(config)?,
            dims: config.dims.unwrap_or(0),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&OllamaEmbedRequest {
                model: &self.model,
                input: texts,
            });
        let response: OllamaEmbedResponse = send_json(request, "Ollama embeddings").await?;
        Ok(response.embeddings)
    }
}
