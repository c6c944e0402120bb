//! Fake provider endpoints for integration tests.
//!
//! One axum server speaks enough of the Ollama (`/api/embed`,
//! `/api/generate`) and OpenAI (`/chat/completions`) wire formats to drive
//! the real HTTP providers, and records what it was sent.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

pub const STORY_REPLY: &str = "\
**Title**: Submit leave request
**User Story**: As an employee, I want to submit a leave request so that my manager can approve it
**Acceptance Criteria**:
• The request form captures start and end dates
• The manager receives a notification
**Priority**: High
**Epic**: Leave management
**Estimation**: 3

**Title**: View leave balance
**User Story**: As an employee, I want to see my remaining leave days
**Acceptance Criteria**:
- Balance is shown on the dashboard
";

/// Environment variable the OpenAI-compatible tests point `api_key_env` at.
pub const FAKE_KEY_ENV: &str = "STORYFORGE_TEST_FAKE_OPENAI_KEY";

#[derive(Default)]
pub struct FakeProvider {
    pub embed_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    /// Status returned by `/chat/completions` (200 replies with `STORY_REPLY`).
    pub chat_status: u16,
}

impl FakeProvider {
    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

/// Bind on an ephemeral port and serve in the background.
pub async fn spawn_fake_provider(chat_status: u16) -> (String, Arc<FakeProvider>) {
    let state = Arc::new(FakeProvider {
        chat_status,
        ..FakeProvider::default()
    });

    let app = Router::new()
        .route("/api/embed", post(fake_embed))
        .route("/api/generate", post(fake_generate))
        .route("/chat/completions", post(fake_chat))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

/// Letter-frequency vector: texts sharing vocabulary score close together.
pub fn letter_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 26];
    for c in text.to_ascii_lowercase().chars() {
        if c.is_ascii_lowercase() {
            v[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    v
}

async fn fake_embed(State(state): State<Arc<FakeProvider>>, Json(body): Json<Value>) -> Json<Value> {
    state.embed_calls.fetch_add(1, Ordering::SeqCst);
    let embeddings: Vec<Vec<f32>> = body["input"]
        .as_array()
        .map(|inputs| {
            inputs
                .iter()
                .map(|t| letter_vector(t.as_str().unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default();
    Json(json!({ "model": body["model"], "embeddings": embeddings }))
}

async fn fake_generate(
    State(state): State<Arc<FakeProvider>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.generate_calls.fetch_add(1, Ordering::SeqCst);
    state
        .prompts
        .lock()
        .unwrap()
        .push(body["prompt"].as_str().unwrap_or_default().to_string());
    Json(json!({ "model": body["model"], "response": STORY_REPLY, "done": true }))
}

async fn fake_chat(State(state): State<Arc<FakeProvider>>, Json(body): Json<Value>) -> Response {
    state.chat_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(prompt) = body["messages"][0]["content"].as_str() {
        state.prompts.lock().unwrap().push(prompt.to_string());
    }

    let status = StatusCode::from_u16(state.chat_status).unwrap();
    if !status.is_success() {
        let body = json!({ "error": { "message": "fake provider refused", "code": state.chat_status } });
        return (status, Json(body)).into_response();
    }
    Json(json!({
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": STORY_REPLY } }]
    }))
    .into_response()
}

/// Write a config file that routes embeddings and generation to `base_url`
/// through the Ollama providers. `<root>/docs` is the server's documents root.
pub fn write_config(root: &Path, base_url: &str) -> PathBuf {
    write_config_with_key_env(root, base_url, FAKE_KEY_ENV)
}

/// Like [`write_config`], naming `key_env` as the configured `[llm]` key
/// variable (unused by Ollama, inherited by runtime provider switches).
pub fn write_config_with_key_env(root: &Path, base_url: &str, key_env: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    let content = format!(
        r#"[db]
path = "{root}/data/storyforge.sqlite"

[chunking]
chunk_size = 200
chunk_overlap = 40

[retrieval]
max_results = 3

[embedding]
provider = "ollama"
model = "nomic-embed-text"
base_url = "{base}"
timeout_secs = 5

[llm]
provider = "ollama"
model = "llama3"
base_url = "{base}"
api_key_env = "{key_env}"
temperature = 0.2
max_tokens = 500
timeout_secs = 5

[server]
bind = "127.0.0.1:0"
documents_root = "{root}/docs"
"#,
        root = root.display(),
        base = base_url,
        key_env = key_env
    );
    let path = config_dir.join("storyforge.toml");
    fs::write(&path, content).unwrap();
    path
}
