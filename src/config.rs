//! TOML configuration.
//!
//! The whole application is driven by one immutable [`Config`] loaded at
//! startup. Nothing mutates it afterwards; the HTTP server's LLM update
//! endpoint clones it, swaps the `[llm]` table, and builds a new pipeline.
//!
//! ```toml
//! [db]
//! path = "./data/storyforge.sqlite"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [retrieval]
//! max_results = 5
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [llm]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! temperature = 0.7
//! max_tokens = 2000
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! documents_root = "./docs"
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Endpoint override. Required for `azure`; optional elsewhere.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            base_url: None,
            api_version: None,
            api_key_env: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    60
}

/// Language model settings. Also the request body of `PUT /config/llm`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory that `{path}` document requests may read from. Unset means
    /// the HTTP API only accepts inline text.
    #[serde(default)]
    pub documents_root: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            documents_root: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Environment variable consulted for a provider's key when `api_key_env` is unset.
pub fn default_api_key_env(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "azure" => Some("AZURE_OPENAI_API_KEY"),
        "gemini" => Some("GEMINI_API_KEY"),
        _ => None,
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Range and consistency checks shared by [`load_config`] and the LLM update endpoint.
pub fn validate(config: &Config) -> Result<()> {
    let chunking = &config.chunking;
    if !(100..=4000).contains(&chunking.chunk_size) {
        bail!("chunking.chunk_size must be in [100, 4000]");
    }
    if chunking.chunk_overlap > 1000 {
        bail!("chunking.chunk_overlap must be in [0, 1000]");
    }
    if chunking.chunk_overlap >= chunking.chunk_size {
        bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    if !(1..=20).contains(&config.retrieval.max_results) {
        bail!("retrieval.max_results must be in [1, 20]");
    }

    validate_embedding(&config.embedding)?;
    validate_llm(&config.llm)?;
    Ok(())
}

fn validate_embedding(embedding: &EmbeddingConfig) -> Result<()> {
    match embedding.provider.as_str() {
        "disabled" | "openai" | "azure" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, azure, or ollama.",
            other
        ),
    }

    if embedding.is_enabled() && embedding.model.is_none() {
        bail!(
            "embedding.model must be specified when provider is '{}'",
            embedding.provider
        );
    }
    if embedding.provider == "azure" && embedding.base_url.is_none() {
        bail!("embedding.base_url is required for the azure provider");
    }
    if embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    Ok(())
}

pub fn validate_llm(llm: &LlmConfig) -> Result<()> {
    match llm.provider.as_str() {
        "openai" | "azure" | "gemini" | "ollama" => {}
        other => bail!(
            "Unknown LLM provider: '{}'. Must be openai, azure, gemini, or ollama.",
            other
        ),
    }

    if llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }
    if llm.provider == "azure" && llm.base_url.is_none() {
        bail!("llm.base_url is required for the azure provider");
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if !(1..=8000).contains(&llm.max_tokens) {
        bail!("llm.max_tokens must be in [1, 8000]");
    }
    Ok(())
}

/// Limits on what `PUT /config/llm` may change at runtime.
///
/// Provider, model and sampling settings are free. The key variable must be
/// the provider's default or the one already configured, and `base_url`
/// must be unset or unchanged, so a request cannot send a key to a host of
/// its choosing.
pub fn check_llm_update(current: &LlmConfig, requested: &LlmConfig) -> Result<()> {
    if let Some(var) = requested.api_key_env.as_deref() {
        let allowed = default_api_key_env(&requested.provider) == Some(var)
            || current.api_key_env.as_deref() == Some(var);
        if !allowed {
            bail!(
                "llm.api_key_env '{}' cannot be set at runtime; configure it in the config file",
                var
            );
        }
    }
    if requested.base_url.is_some() && requested.base_url != current.base_url {
        bail!("llm.base_url cannot be changed at runtime; configure it in the config file");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "./data/sf.sqlite"

[llm]
provider = "openai"
model = "gpt-4o-mini"
"#;

    fn parse(extra: &str) -> Result<Config> {
        let config: Config = toml::from_str(&format!("{}\n{}", MINIMAL, extra))?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.max_results, 5);
        assert_eq!(config.llm.max_tokens, 2000);
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert!(config.server.documents_root.is_none());
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let err = parse("[chunking]\nchunk_size = 500\nchunk_overlap = 500").unwrap_err();
        assert!(err.to_string().contains("smaller than"));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(parse("[chunking]\nchunk_size = 50\nchunk_overlap = 0").is_err());
        assert!(parse("[retrieval]\nmax_results = 21").is_err());
    }

    #[test]
    fn test_rejects_unknown_providers() {
        let err = parse("[embedding]\nprovider = \"pinecone\"\nmodel = \"x\"").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));

        let mut config = parse("").unwrap();
        config.llm.provider = "palm".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_azure_requires_base_url() {
        let mut config = parse("").unwrap();
        config.llm.provider = "azure".to_string();
        assert!(validate_llm(&config.llm).is_err());
        config.llm.base_url = Some("https://example.openai.azure.com".to_string());
        assert!(validate_llm(&config.llm).is_ok());
    }

    #[test]
    fn test_llm_ranges() {
        let mut config = parse("").unwrap();
        config.llm.temperature = 2.5;
        assert!(validate_llm(&config.llm).is_err());
        config.llm.temperature = 0.0;
        config.llm.max_tokens = 0;
        assert!(validate_llm(&config.llm).is_err());
    }

    #[test]
    fn test_llm_update_keeps_credential_routing() {
        let mut current = parse("").unwrap().llm;
        current.base_url = Some("http://127.0.0.1:9000/v1".to_string());
        current.api_key_env = Some("TEAM_OPENAI_KEY".to_string());

        let mut requested = current.clone();
        requested.model = "gpt-4o".to_string();
        assert!(check_llm_update(&current, &requested).is_ok());

        requested.api_key_env = None;
        requested.base_url = None;
        assert!(check_llm_update(&current, &requested).is_ok());

        requested.provider = "gemini".to_string();
        requested.api_key_env = Some("GEMINI_API_KEY".to_string());
        assert!(check_llm_update(&current, &requested).is_ok());

        requested.api_key_env = Some("AWS_SECRET_ACCESS_KEY".to_string());
        let err = check_llm_update(&current, &requested).unwrap_err();
        assert!(err.to_string().contains("api_key_env"));

        requested.api_key_env = None;
        requested.base_url = Some("https://collector.example".to_string());
        let err = check_llm_update(&current, &requested).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_enabled_embedding_requires_model() {
        assert!(parse("[embedding]\nprovider = \"openai\"").is_err());
        assert!(parse("[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"").is_ok());
    }
}
