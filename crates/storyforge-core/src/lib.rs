//! # Storyforge Core
//!
//! Runtime-agnostic logic for Storyforge: data models, the overlapping
//! window chunker, the vector store abstraction, retrieval, prompt assembly,
//! the language model trait, and the user story parser.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem I/O.
//! Concrete providers and the SQLite store live in the `storyforge` app
//! crate and plug in through [`embedding::EmbeddingProvider`],
//! [`store::VectorStore`], and [`generate::LanguageModel`].
//!
//! ```text
//!  document text ──▶ chunk ──▶ index ──▶ VectorStore
//!                                             │
//!  requirements ──▶ retrieve ◀────────────────┘
//!                      │
//!                      ▼
//!                   prompt ──▶ LanguageModel ──▶ parser ──▶ Vec<GeneratedStory>
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod index;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
pub mod store;

pub use error::{PipelineError, Result};
pub use pipeline::StoryPipeline;
