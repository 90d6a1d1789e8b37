//! Pluggable external capabilities, per `SPEC_FULL.md` §6: the core only
//! requires an `embed`/`summarize`/`generate` interface, never a concrete
//! HTTP client. Concrete implementations (`OllamaProvider`, `OpenAiProvider`)
//! live in `ctx-sys` since they need `reqwest`.
//!
//! Grounded on the teacher's `embedding::EmbeddingProvider` trait
//! (`model_name`/`dims` as sync metadata accessors, the call itself async),
//! generalized to three capabilities instead of one.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;
    fn dims(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    pub max_tokens: usize,
    /// Free-form hint, e.g. "one sentence", passed through to the prompt.
    pub style: Option<String>,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            style: None,
        }
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, opts: &SummarizeOptions) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.2,
        }
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, opts: &GenerateOptions) -> Result<String>;
}
