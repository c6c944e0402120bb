//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/metrics` | Request counters, Prometheus text format |
//! | `POST` | `/projects/{project_id}/documents` | Index a file path or inline text |
//! | `POST` | `/projects/{project_id}/search` | Top-k chunks for a query |
//! | `POST` | `/projects/{project_id}/stories` | Generate user stories |
//! | `PUT`  | `/config/llm` | Replace the language model settings |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "provider_error", "message": "OpenAI chat quota or rate limit exceeded (429 Too Many Requests): ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `unsupported_format` (415),
//! `provider_error` (502), `configuration_error` (500), `internal` (500).
//!
//! # Document paths
//!
//! `{"path": ..}` requests are accepted only when `[server].documents_root`
//! is set, and the canonical path must resolve to a file inside it.
//! Otherwise documents arrive as inline `{"filename", "text"}`.
//!
//! # Reconfiguration
//!
//! The active config and pipeline sit behind one `RwLock`. Handlers clone the
//! `Arc`s and release the lock before doing any I/O; `PUT /config/llm`
//! builds a complete new pipeline and swaps it in, so in-flight requests
//! finish on the pipeline they started with. The update may not redirect
//! credentials: see [`check_llm_update`].

use std::path::{Path as FsPath, PathBuf};
use std::sync::{Arc, RwLock};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use storyforge_core::models::{GeneratedStory, IndexReport, RetrievedChunk};
use storyforge_core::store::VectorStore;
use storyforge_core::{PipelineError, StoryPipeline};

use crate::config::{check_llm_update, validate_llm, Config, LlmConfig};
use crate::extract::ExtractError;
use crate::ingest::{prepare_file, prepare_text, IngestError};
use crate::metrics::ServerMetrics;
use crate::pipeline::{build_pipeline, open_store, validate_project_id};

const MAX_SEARCH_LIMIT: usize = 20;

/// The configuration and the pipeline built from it, swapped together.
struct Active {
    config: Arc<Config>,
    pipeline: Arc<StoryPipeline>,
}

#[derive(Clone)]
struct AppState {
    active: Arc<RwLock<Active>>,
    store: Arc<dyn VectorStore>,
    /// Canonical `[server].documents_root`.
    documents_root: Option<Arc<FsPath>>,
    metrics: Arc<ServerMetrics>,
}

impl AppState {
    fn pipeline(&self) -> Result<Arc<StoryPipeline>, AppError> {
        self.active
            .read()
            .map(|a| a.pipeline.clone())
            .map_err(|_| internal("pipeline lock poisoned"))
    }

    fn config(&self) -> Result<Arc<Config>, AppError> {
        self.active
            .read()
            .map(|a| a.config.clone())
            .map_err(|_| internal("pipeline lock poisoned"))
    }
}

/// Starts the HTTP server on `[server].bind`. Runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let app = router(config.clone(), store)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, llm = %config.llm.provider, "storyforge server listening");
    println!("Storyforge server listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router over an existing store.
///
/// Fails if the initial pipeline cannot be built (unknown provider,
/// missing API key) or `documents_root` does not exist.
pub fn router(config: Config, store: Arc<dyn VectorStore>) -> Result<Router, PipelineError> {
    let documents_root: Option<Arc<FsPath>> = match &config.server.documents_root {
        Some(root) => Some(Arc::from(root.canonicalize().map_err(|e| {
            PipelineError::configuration(format!(
                "server.documents_root {}: {}",
                root.display(),
                e
            ))
        })?)),
        None => None,
    };
    let pipeline = build_pipeline(&config, store.clone())?;
    let state = AppState {
        active: Arc::new(RwLock::new(Active {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        })),
        store,
        documents_root,
        metrics: Arc::new(ServerMetrics::default()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/projects/{project_id}/documents", post(handle_index_document))
        .route("/projects/{project_id}/search", post(handle_search))
        .route("/projects/{project_id}/stories", post(handle_generate_stories))
        .route("/config/llm", put(handle_update_llm))
        .layer(cors)
        .with_state(state))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(code = self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        let (status, code) = match &e {
            PipelineError::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
            PipelineError::UnsupportedFormat(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format")
            }
            PipelineError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
        };
        AppError {
            status,
            code,
            message: e.to_string(),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Pipeline(e) | IngestError::Extract(ExtractError::Unsupported(e)) => {
                e.into()
            }
            IngestError::Join(e) => internal(e.to_string()),
            other => bad_request(other.to_string()),
        }
    }
}

fn checked_project(project_id: &str) -> Result<(), AppError> {
    validate_project_id(project_id).map_err(bad_request)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /metrics ============

async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

// ============ POST /projects/{project_id}/documents ============

/// Either a `path` under the documents root, or inline `text` with the
/// `filename` it came from (the extension must be supported).
#[derive(Deserialize)]
struct IndexDocumentRequest {
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

async fn handle_index_document(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<IndexDocumentRequest>,
) -> Result<Json<IndexReport>, AppError> {
    checked_project(&project_id)?;
    let pipeline = state.pipeline()?;

    let doc = match req {
        IndexDocumentRequest {
            path: Some(path), ..
        } => {
            let path = confine_to_root(state.documents_root.as_deref(), &path).await?;
            prepare_file(&project_id, &path).await?
        }
        IndexDocumentRequest {
            filename: Some(filename),
            text: Some(text),
            ..
        } => prepare_text(&project_id, &filename, text)?,
        _ => return Err(bad_request("provide either `path` or both `filename` and `text`")),
    };

    let report = pipeline
        .process_document(&doc.input)
        .await
        .inspect_err(|e| state.metrics.record_failure(e))?;
    state.metrics.record_index(&report);
    Ok(Json(doc.report(report)))
}

/// Resolve `requested` (absolute, or relative to `root`) to a canonical
/// file path inside `root`.
async fn confine_to_root(root: Option<&FsPath>, requested: &FsPath) -> Result<PathBuf, AppError> {
    let root = root.ok_or_else(|| {
        bad_request("server-side paths are disabled; send `filename` and `text` instead")
    })?;
    let rejected = || {
        bad_request(format!(
            "path must name a file under the documents root: {}",
            requested.display()
        ))
    };

    let resolved = tokio::fs::canonicalize(root.join(requested))
        .await
        .map_err(|_| rejected())?;
    if !resolved.starts_with(root) {
        return Err(rejected());
    }
    match tokio::fs::metadata(&resolved).await {
        Ok(meta) if meta.is_file() => Ok(resolved),
        _ => Err(rejected()),
    }
}

// ============ POST /projects/{project_id}/search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RetrievedChunk>,
}

async fn handle_search(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    checked_project(&project_id)?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let pipeline = state.pipeline()?;
    let retriever = pipeline.retriever();
    let limit = req.limit.unwrap_or(retriever.max_results());
    if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
        return Err(bad_request(format!(
            "limit must be between 1 and {}",
            MAX_SEARCH_LIMIT
        )));
    }

    let results = retriever.retrieve_top(&req.query, &project_id, limit).await;
    state.metrics.record_search();
    Ok(Json(SearchResponse { results }))
}

// ============ POST /projects/{project_id}/stories ============

#[derive(Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    project_context: String,
    requirements: String,
}

#[derive(Serialize)]
struct GenerateResponse {
    message: String,
    stories: Vec<GeneratedStory>,
}

async fn handle_generate_stories(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    checked_project(&project_id)?;
    if req.requirements.trim().is_empty() {
        return Err(bad_request("requirements must not be empty"));
    }

    let pipeline = state.pipeline()?;
    let stories = pipeline
        .generate_stories(&project_id, &req.project_context, &req.requirements)
        .await
        .inspect_err(|e| state.metrics.record_failure(e))?;
    state.metrics.record_stories(stories.len());

    Ok(Json(GenerateResponse {
        message: format!("Generated {} user stories", stories.len()),
        stories,
    }))
}

// ============ PUT /config/llm ============

#[derive(Serialize)]
struct UpdateLlmResponse {
    message: String,
    llm: LlmConfig,
}

async fn handle_update_llm(
    State(state): State<AppState>,
    Json(llm): Json<LlmConfig>,
) -> Result<Json<UpdateLlmResponse>, AppError> {
    validate_llm(&llm).map_err(|e| bad_request(e.to_string()))?;
    let current = state.config()?;
    check_llm_update(&current.llm, &llm).map_err(|e| bad_request(e.to_string()))?;

    let mut config = (*current).clone();
    config.llm = llm.clone();
    let pipeline = build_pipeline(&config, state.store.clone())?;

    {
        let mut active = state
            .active
            .write()
            .map_err(|_| internal("pipeline lock poisoned"))?;
        active.config = Arc::new(config);
        active.pipeline = Arc::new(pipeline);
    }

    info!(provider = %llm.provider, model = %llm.model, "LLM configuration updated");
    Ok(Json(UpdateLlmResponse {
        message: "LLM configuration updated".to_string(),
        llm,
    }))
}
