//! # errorrag — error catalog question answering
//!
//! Answers natural-language questions about a fixed catalog of integration
//! error records by retrieving the most relevant record and rendering it in
//! a fixed, human-readable layout.
//!
//! ## Architecture
//!
//! - **[`record`]** — `ErrorRecord` and its `Label: value` text form
//! - **[`store`]** — In-memory vector index with cosine-similarity search
//! - **[`pipeline`]** — Exact-code lookup, semantic search, confidence gating, answer formatting
//! - **[`embedder`]** — Text embedding trait, OpenAI-compatible client, offline mock
//! - **[`ingest`]** — CSV loading and index construction at startup
//! - **[`config`]** — Configuration loading and validation
//! - **[`server`]** — HTTP front end (`POST /ask`)
//! - **[`repl`]** — Interactive terminal front end

pub mod config;
pub mod embedder;
pub mod ingest;
pub mod pipeline;
pub mod record;
pub mod repl;
pub mod server;
pub mod store;
