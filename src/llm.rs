//! Language model providers.
//!
//! Each provider turns one [`CompletionRequest`] into one HTTP call and
//! returns the raw reply text. Parsing the reply into stories is the
//! pipeline's job.
//!
//! | Config value | Endpoint |
//! |--------------|----------|
//! | `"openai"` | `POST {base_url}/chat/completions` |
//! | `"azure"` | `POST {base_url}/openai/deployments/{model}/chat/completions?api-version=` |
//! | `"gemini"` | `POST {base_url}/models/{model}:generateContent` |
//! | `"ollama"` | `POST {base_url}/api/generate` |

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use storyforge_core::generate::{CompletionRequest, LanguageModel};
use storyforge_core::{PipelineError, Result};

use crate::config::LlmConfig;
use crate::provider::{build_client, require_api_key, send_json, trim_base_url};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const AZURE_API_VERSION: &str = "2024-02-01";

/// Build the model named by `config.provider`.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChat::new(config)?)),
        "azure" => Ok(Arc::new(AzureOpenAiChat::new(config)?)),
        "gemini" => Ok(Arc::new(GeminiChat::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaChat::new(config)?)),
        other => Err(PipelineError::configuration(format!(
            "Unknown LLM provider: {}",
            other
        ))),
    }
}

fn empty_reply(label: &str) -> PipelineError {
    PipelineError::provider(format!("{} returned no completion text", label))
}

// ============ Chat completions wire format (OpenAI and Azure) ============

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn chat_body<'a>(model: Option<&'a str>, request: &'a CompletionRequest<'_>) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: request.prompt,
        }],
        temperature: request.settings.temperature,
        max_tokens: request.settings.max_tokens,
    }
}

fn first_choice(response: ChatResponse, label: &str) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| empty_reply(label))
}

// ============ OpenAI ============

pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    label: String,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key: require_api_key("openai", config.api_key_env.as_deref())?,
            base_url: trim_base_url(config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL)),
            model: config.model.clone(),
            label: format!("openai:{}", config.model),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&chat_body(Some(&self.model), request));
        let response: ChatResponse = send_json(http, "OpenAI chat").await?;
        first_choice(response, "OpenAI chat")
    }
}

// ============ Azure OpenAI ============

pub struct AzureOpenAiChat {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    label: String,
}

impl AzureOpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base = config.base_url.as_deref().ok_or_else(|| {
            PipelineError::configuration("llm.base_url required for the azure provider")
        })?;
        let api_version = config.api_version.as_deref().unwrap_or(AZURE_API_VERSION);

        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key: require_api_key("azure", config.api_key_env.as_deref())?,
            endpoint: format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                trim_base_url(base),
                config.model,
                api_version
            ),
            label: format!("azure:{}", config.model),
        })
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAiChat {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let http = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(&chat_body(None, request));
        let response: ChatResponse = send_json(http, "Azure OpenAI chat").await?;
        first_choice(response, "Azure OpenAI chat")
    }
}

// ============ Gemini ============

pub struct GeminiChat {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    label: String,
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base = trim_base_url(config.base_url.as_deref().unwrap_or(GEMINI_BASE_URL));
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            api_key: require_api_key("gemini", config.api_key_env.as_deref())?,
            endpoint: format!("{}/models/{}:generateContent", base, config.model),
            label: format!("gemini:{}", config.model),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiChat {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart {
                    text: request.prompt,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: request.settings.temperature,
                max_output_tokens: request.settings.max_tokens,
            },
        };
        let http = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let response: GeminiResponse = send_json(http, "Gemini").await?;

        // Multi-part candidates are concatenated in order.
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(empty_reply("Gemini"));
        }
        Ok(text)
    }
}

// ============ Ollama ============

pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    label: String,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: trim_base_url(config.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL)),
            model: config.model.clone(),
            label: format!("ollama:{}", config.model),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let http = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&OllamaGenerateRequest {
                model: &self.model,
                prompt: request.prompt,
                stream: false,
                options: OllamaOptions {
                    temperature: request.settings.temperature,
                    num_predict: request.settings.max_tokens,
                },
            });
        let response: OllamaGenerateResponse = send_json(http, "Ollama").await?;
        Ok(response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyforge_core::generate::ModelSettings;

    fn llm(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            model: "m".to_string(),
            base_url: None,
            api_version: None,
            api_key_env: None,
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_chat_body_shape() {
        let request = CompletionRequest {
            prompt: "hello",
            settings: ModelSettings {
                temperature: 0.2,
                max_tokens: 100,
            },
        };
        let json = serde_json::to_value(chat_body(Some("gpt-4o-mini"), &request)).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
        assert_eq!(json["max_tokens"], 100);

        let azure = serde_json::to_value(chat_body(None, &request)).unwrap();
        assert!(azure.get("model").is_none());
    }

    #[test]
    fn test_first_choice_missing_content() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(
            first_choice(response, "OpenAI chat"),
            Err(PipelineError::Provider(_))
        ));

        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_choice(response, "OpenAI chat").is_err());
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let model = create_model(&llm("ollama")).unwrap();
        assert_eq!(model.name(), "ollama:m");
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let mut config = llm("openai");
        config.api_key_env = Some("STORYFORGE_TEST_NO_SUCH_KEY".to_string());
        let err = create_model(&config).err().unwrap();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_unknown_provider() {
        assert!(create_model(&llm("palm")).is_err());
    }
}
