//! Document indexing from the filesystem.
//!
//! A single file must have a supported extension. A directory is walked
//! recursively in path order; unsupported files inside it are skipped with
//! a warning, any other failure stops the run.

use std::path::Path;

use anyhow::{bail, Result};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use storyforge_core::index::Indexer;
use storyforge_core::models::{DocumentFormat, DocumentInput, IndexReport};
use storyforge_core::PipelineError;

use crate::config::Config;
use crate::extract::{content_hash, load_document, ExtractError};
use crate::pipeline::{build_indexer, open_store, validate_project_id};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("document loader task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A document ready to be chunked and embedded, plus the hash of its source.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub input: DocumentInput,
    pub content_hash: String,
}

impl PreparedDocument {
    /// Attach the content hash to the report produced by indexing `input`.
    pub fn report(&self, mut report: IndexReport) -> IndexReport {
        report.content_hash = Some(self.content_hash.clone());
        report
    }
}

/// Read and extract one file off the async workers.
pub async fn prepare_file(project_id: &str, path: &Path) -> Result<PreparedDocument, IngestError> {
    let owned = path.to_path_buf();
    let loaded = tokio::task::spawn_blocking(move || load_document(&owned)).await??;
    Ok(PreparedDocument {
        input: DocumentInput {
            project_id: project_id.to_string(),
            document_id: Uuid::new_v4().to_string(),
            source: path.display().to_string(),
            text: loaded.text,
        },
        content_hash: loaded.content_hash,
    })
}

/// Wrap already-extracted text. `filename` still has to carry a supported
/// extension.
pub fn prepare_text(
    project_id: &str,
    filename: &str,
    text: String,
) -> Result<PreparedDocument, IngestError> {
    DocumentFormat::from_path(filename)?;
    Ok(PreparedDocument {
        content_hash: content_hash(text.as_bytes()),
        input: DocumentInput {
            project_id: project_id.to_string(),
            document_id: Uuid::new_v4().to_string(),
            source: filename.to_string(),
            text,
        },
    })
}

/// Load one file and index it under `project_id`.
pub async fn index_file(
    indexer: &Indexer,
    project_id: &str,
    path: &Path,
) -> Result<IndexReport, IngestError> {
    let doc = prepare_file(project_id, path).await?;
    let report = indexer.index_document(&doc.input).await?;
    Ok(doc.report(report))
}

/// Index a file, or every supported file under a directory.
pub async fn index_path(
    indexer: &Indexer,
    project_id: &str,
    path: &Path,
) -> Result<Vec<IndexReport>> {
    if !path.exists() {
        bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        return Ok(vec![index_file(indexer, project_id, path).await?]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if DocumentFormat::from_path(entry.path()).is_err() {
            warn!(path = %entry.path().display(), "skipping unsupported file");
            continue;
        }
        files.push(entry.into_path());
    }

    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        reports.push(index_file(indexer, project_id, &file).await?);
    }
    Ok(reports)
}

/// `storyforge index <project> <path>`
pub async fn run_index(config: &Config, project_id: &str, path: &Path) -> Result<()> {
    if let Err(msg) = validate_project_id(project_id) {
        bail!(msg);
    }

    let store = open_store(config).await?;
    let indexer = build_indexer(config, store)?;
    let reports = index_path(&indexer, project_id, path).await?;

    if reports.is_empty() {
        println!("No supported documents found under {}", path.display());
        return Ok(());
    }

    let total: usize = reports.iter().map(|r| r.chunks).sum();
    for report in &reports {
        println!("  {:>4} chunks  {}", report.chunks, report.source);
    }
    info!(project = %project_id, documents = reports.len(), chunks = total, "index complete");
    println!(
        "Indexed {} document(s), {} chunk(s) into project '{}'.",
        reports.len(),
        total,
        project_id
    );
    Ok(())
}
