//! # Interview QA
//!
//! Ask questions about your own resume and job descriptions while preparing
//! for interviews.
//!
//! Documents (PDF, DOCX, PPTX, plain text) are extracted, split into
//! overlapping chunks, embedded, and written to a single-file index. Questions
//! are answered by a language model that sees only the most relevant chunks.
//! Feedback about answers is appended to a flat log.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────┐
//! │ Documents │──▶│ Extract+Chunk│──▶│  Embed    │──▶ index.sqlite
//! └───────────┘   └──────────────┘   └───────────┘        │
//!                                                         ▼
//!   question ──▶ embed ──▶ top-k search ──▶ prompt ──▶ generate ──▶ answer
//!                                                                    │
//!                                               feedback.txt ◀───────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! iqa ingest resume.pdf job_description.docx
//! iqa ask "What eviction policy did the cache project use?"
//! iqa feedback --answer "LRU eviction." "accurate"
//! iqa serve                     # JSON API on 127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF / DOCX / PPTX / text extraction |
//! | [`chunk`] | Fixed-window overlapping chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persisted vector index |
//! | [`retrieve`] | Top-k retrieval |
//! | [`generate`] | Prompt assembly and answer generation |
//! | [`feedback`] | Append-only feedback log |
//! | [`pipeline`] | Ingest / ask / feedback orchestration |
//! | [`error`] | User-facing error kinds |
//! | [`server`] | JSON HTTP server |
//! | [`db`] | SQLite connection helpers |
//! | [`http`] | Shared HTTP client plumbing |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod feedback;
pub mod generate;
pub mod http;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod retrieve;
pub mod server;
