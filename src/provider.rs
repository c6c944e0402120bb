//! HTTP plumbing shared by the embedding and language model providers.
//!
//! Every provider call is a single JSON POST. Non-success statuses and
//! transport failures map to [`PipelineError::Provider`] immediately; there
//! is no retry and no backoff.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use storyforge_core::PipelineError;

/// Build a client with the configured request timeout.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PipelineError::configuration(format!("failed to build HTTP client: {}", e)))
}

/// Resolve a provider API key from the environment.
///
/// `override_env` wins over the provider's conventional variable. A
/// provider with neither (e.g. `ollama`) needs no key and gets `None`.
pub fn resolve_api_key(
    provider: &str,
    override_env: Option<&str>,
) -> Result<Option<String>, PipelineError> {
    let var = match override_env.or_else(|| crate::config::default_api_key_env(provider)) {
        Some(v) => v,
        None => return Ok(None),
    };

    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(Some(key.trim().to_string())),
        _ => Err(PipelineError::configuration(format!(
            "{} environment variable not set (required by the {} provider)",
            var, provider
        ))),
    }
}

/// Like [`resolve_api_key`] but for providers that cannot run without a key.
pub fn require_api_key(
    provider: &str,
    override_env: Option<&str>,
) -> Result<String, PipelineError> {
    resolve_api_key(provider, override_env)?.ok_or_else(|| {
        PipelineError::configuration(format!(
            "the {} provider needs api_key_env to be set",
            provider
        ))
    })
}

/// Strip trailing slashes so paths can be appended with `format!`.
pub fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Send a prepared request and decode a JSON body of type `T`.
///
/// `label` names the provider in error messages (e.g. `"OpenAI embeddings"`).
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    label: &str,
) -> Result<T, PipelineError> {
    let response = request
        .send()
        .await
        .map_err(|e| PipelineError::provider(format!("{} request failed: {}", label, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        return Err(classify_status(label, status, &body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| PipelineError::provider(format!("{} returned a malformed response: {}", label, e)))
}

fn classify_status(label: &str, status: StatusCode, body: &str) -> PipelineError {
    let body = body.trim();
    let reason = match status.as_u16() {
        401 | 403 => "authentication failed",
        429 => "quota or rate limit exceeded",
        s if s >= 500 => "server error",
        _ => "request rejected",
    };
    PipelineError::provider(format!("{} {} ({}): {}", label, reason, status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_messages() {
        let e = classify_status("OpenAI chat", StatusCode::UNAUTHORIZED, "bad key");
        assert!(e.to_string().contains("authentication failed"));

        let e = classify_status("OpenAI chat", StatusCode::TOO_MANY_REQUESTS, "");
        assert!(e.to_string().contains("quota"));

        let e = classify_status("Ollama", StatusCode::BAD_GATEWAY, "down");
        assert!(e.to_string().contains("server error"));
        assert!(matches!(e, PipelineError::Provider(_)));
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let err = resolve_api_key("openai", Some("STORYFORGE_TEST_SURELY_UNSET_KEY")).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(err.to_string().contains("STORYFORGE_TEST_SURELY_UNSET_KEY"));
    }

    #[test]
    fn test_keyless_provider() {
        assert_eq!(resolve_api_key("ollama", None).unwrap(), None);
    }

    #[test]
    fn test_trim_base_url() {
        assert_eq!(trim_base_url("http://localhost:11434/"), "http://localhost:11434");
        assert_eq!(trim_base_url("https://api.openai.com/v1"), "https://api.openai.com/v1");
    }
}
