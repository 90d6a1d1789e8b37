//! # ctx-sys
//!
//! Project-scoped context retrieval for AI coding assistants: an embedded
//! SQLite store, a hybrid (lexical + semantic + graph) retrieval engine,
//! and a token-budgeted context assembler, reachable over a CLI, an MCP
//! server, and a plain HTTP mirror.
//!
//! ## Modules
//!
//! - [`config`] — TOML configuration parsing and validation
//! - [`db`] — SQLite connection management
//! - [`migrate`] — Database schema migrations
//! - [`sqlite_store`] — `Store` implementation backed by `sqlx::SqlitePool`
//! - [`providers`] — Ollama and OpenAI-backed `Embedder`/`Summarizer`/`Generator`
//! - [`strategies`] — Lexical, semantic, and graph retrieval strategies
//! - [`engine`] — `ContextEngine`, the `query_context` facade
//! - [`sessions`] — Session/message/decision convenience wrappers
//! - [`stats`] — Per-project database statistics
//! - [`kb`] — `.ctx-kb` export/import
//! - [`mcp`] — MCP `ServerHandler` bridge
//! - [`server`] — Axum HTTP mirror of the MCP tool

pub mod config;
pub mod db;
pub mod engine;
pub mod kb;
pub mod mcp;
pub mod migrate;
pub mod providers;
pub mod server;
pub mod sessions;
pub mod sqlite_store;
pub mod stats;
pub mod strategies;
