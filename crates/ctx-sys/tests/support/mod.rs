//! Shared fixtures for the integration test suite: a tempfile-backed
//! `SqliteStore` and a no-op `Embedder`/`Summarizer`/`Generator` stub for
//! scenarios that exercise `lex`/`graph` strategies only.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ctx_sys::migrate;
use ctx_sys::sqlite_store::SqliteStore;
use ctx_sys_core::error::Result;
use ctx_sys_core::providers::{Embedder, GenerateOptions, Generator, SummarizeOptions, Summarizer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const STUB_MODEL: &str = "stub-embed";
pub const STUB_DIMS: usize = 4;

/// A deterministic zero-vector embedder. Its `embed` is never expected to
/// run in tests that only exercise `lex`/`graph` strategies; when it does
/// run, it returns a fixed vector so semantic scores are reproducible.
pub struct StubProvider;

#[async_trait]
impl Embedder for StubProvider {
    fn model_id(&self) -> &str {
        STUB_MODEL
    }

    fn dims(&self) -> usize {
        STUB_DIMS
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0, 0.0])
    }
}

#[async_trait]
impl Summarizer for StubProvider {
    async fn summarize(&self, text: &str, opts: &SummarizeOptions) -> Result<String> {
        Ok(text.chars().take(opts.max_tokens).collect())
    }
}

#[async_trait]
impl Generator for StubProvider {
    async fn generate(&self, prompt: &str, _opts: &GenerateOptions) -> Result<String> {
        Ok(prompt.to_string())
    }
}

/// Spins up a fresh on-disk SQLite database under a temp dir with the
/// file-wide registry migrated, keeping the `TempDir` alive for the
/// caller so the file isn't removed mid-test.
pub async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await.unwrap();
    migrate::open(&pool).await.unwrap();
    (dir, pool)
}

pub fn store(pool: &SqlitePool) -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(pool.clone()))
}
