//! # Storyforge
//!
//! Document-grounded user story generation.
//!
//! Project documents are chunked, embedded, and appended to a per-project
//! vector collection in SQLite. At generation time the requirements text is
//! used as a query, the closest chunks become prompt context, and a
//! language model drafts user stories that are parsed back into typed
//! records.
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Documents  │──▶│ Chunk+Embed  │──▶│ SQLite vectors│
//! │ txt/md/pdf │   │  (indexer)   │   │ per project   │
//! └────────────┘   └──────────────┘   └──────┬────────┘
//!                                            │ top-k
//!                  ┌──────────────┐   ┌──────▼────────┐
//!  requirements ──▶│ Prompt + LLM │◀──│   Retriever   │
//!                  └──────┬───────┘   └───────────────┘
//!                         ▼
//!                  Story parser ──▶ Vec<GeneratedStory>
//! ```
//!
//! The pipeline itself lives in [`storyforge_core`]; this crate supplies
//! the concrete providers, storage, document loaders, CLI, and HTTP API.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`provider`] | Shared HTTP plumbing for provider calls |
//! | [`embedding`] | OpenAI, Azure OpenAI, and Ollama embedders |
//! | [`llm`] | OpenAI, Azure OpenAI, Gemini, and Ollama chat models |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite-backed vector store |
//! | [`extract`] | Text extraction for txt, md, pdf, docx |
//! | [`pipeline`] | Build a pipeline from configuration |
//! | [`ingest`] | Index files and directories |
//! | [`search`] | `storyforge search` |
//! | [`generate`] | `storyforge generate` |
//! | [`server`] | HTTP API |
//! | [`metrics`] | Request counters for `/metrics` |

pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod ingest;
pub mod llm;
pub mod metrics;
pub mod migrate;
pub mod pipeline;
pub mod provider;
pub mod search;
pub mod server;
pub mod sqlite_store;
