//! Core data models that flow through the indexing and generation pipeline.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Document formats accepted for indexing, recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Resolve the format from a path's extension (case-insensitive).
    ///
    /// Anything outside `.txt`, `.md`, `.pdf`, `.docx` is rejected with
    /// [`PipelineError::UnsupportedFormat`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "txt" => Ok(DocumentFormat::Text),
            "md" => Ok(DocumentFormat::Markdown),
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            _ => Err(PipelineError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Text => "text",
            DocumentFormat::Markdown => "markdown",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }
}

/// A loaded document ready to be chunked and indexed.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub project_id: String,
    pub document_id: String,
    /// Where the text came from (file path or upload name).
    pub source: String,
    pub text: String,
}

/// Metadata stored next to every chunk in a vector collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub project_id: String,
    pub document_id: String,
    pub source: String,
    /// RFC 3339 timestamp of when the chunk was indexed.
    pub processed_at: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
}

/// A chunk with its embedding, ready to be appended to a collection.
///
/// The store assigns the sequence index (and therefore the id) on append.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// One ranked hit from a similarity query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Outcome of indexing one document.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub project_id: String,
    pub document_id: String,
    /// Path or filename the text came from.
    pub source: String,
    pub collection: String,
    pub chunks: usize,
    /// SHA-256 of the raw document bytes, when the loader computed one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// Story priority as emitted by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Parse an already lower-cased label, matching on its first word so
    /// `"high (revenue impact)"` still reads as [`Priority::High`]. Leading
    /// emphasis and brackets (`**high**`, `[low]`) are ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        let word: String = label
            .trim()
            .trim_start_matches(['*', '_', '['])
            .chars()
            .take_while(|c| c.is_alphabetic())
            .collect();
        match word.as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(s)
    }
}

/// A user story recovered from model output. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedStory {
    pub project_id: String,
    pub title: String,
    /// "As a … I want … so that …".
    #[serde(rename = "story", skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    pub acceptance_criteria: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            DocumentFormat::from_path("docs/brief.PDF").unwrap(),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::from_path("notes.md").unwrap(),
            DocumentFormat::Markdown
        );
        assert_eq!(
            DocumentFormat::from_path("a/b/c.docx").unwrap(),
            DocumentFormat::Docx
        );
    }

    #[test]
    fn test_format_rejects_unknown() {
        let err = DocumentFormat::from_path("sheet.xlsx").unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
        assert!(DocumentFormat::from_path("README").is_err());
        assert!(DocumentFormat::from_path("legacy.doc").is_err());
    }

    #[test]
    fn test_priority_labels() {
        assert_eq!(Priority::from_label("high"), Some(Priority::High));
        assert_eq!(
            Priority::from_label("medium - nice to have"),
            Some(Priority::Medium)
        );
        assert_eq!(Priority::from_label("low"), Some(Priority::Low));
        assert_eq!(Priority::from_label("**high**"), Some(Priority::High));
        assert_eq!(Priority::from_label("[medium]"), Some(Priority::Medium));
        assert_eq!(Priority::from_label("_low_"), Some(Priority::Low));
        assert_eq!(Priority::from_label("critical"), None);
        assert_eq!(Priority::from_label("**critical**"), None);
        assert_eq!(Priority::from_label(""), None);
    }

    #[test]
    fn test_story_serializes_narrative_as_story() {
        let story = GeneratedStory {
            project_id: "p1".to_string(),
            title: "Login".to_string(),
            narrative: Some("As a user, I want to log in".to_string()),
            acceptance_criteria: vec!["works".to_string()],
            priority: Some(Priority::High),
        };
        let json = serde_json::to_value(&story).unwrap();
        assert_eq!(json["story"], "As a user, I want to log in");
        assert_eq!(json["priority"], "high");
    }
}
