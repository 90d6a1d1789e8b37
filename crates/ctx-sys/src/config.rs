//! Configuration parsing and validation.
//!
//! ctx-sys is configured via a TOML file (default: `.ctx-sys/config.toml`).
//! The config resolves global defaults overlaid with per-project overrides;
//! every field here is recognized uniformly regardless of transport (CLI,
//! MCP, HTTP), per `SPEC_FULL.md` §6.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub summarization: SummarizationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".ctx-sys/ctx-sys.db"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embeddings_provider")]
    pub provider: String,
    #[serde(default = "default_embeddings_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Vector width for `model`. `mxbai-embed-large` (the default) is 1024.
    #[serde(default = "default_embeddings_dims")]
    pub dims: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_embeddings_provider(),
            model: default_embeddings_model(),
            url: None,
            dims: default_embeddings_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embeddings_dims() -> usize {
    1024
}

fn default_embeddings_provider() -> String {
    "ollama".to_string()
}
fn default_embeddings_model() -> String {
    "mxbai-embed-large".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizationConfig {
    #[serde(default = "default_summarization_provider")]
    pub provider: String,
    #[serde(default = "default_summarization_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            provider: default_summarization_provider(),
            model: default_summarization_model(),
            url: None,
        }
    }
}

fn default_summarization_provider() -> String {
    "ollama".to_string()
}
fn default_summarization_model() -> String {
    "llama3.2".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: usize,
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,
    #[serde(default = "default_weights")]
    pub weights: HashMap<String, f64>,
    #[serde(default = "default_decision_keywords")]
    pub decision_keywords: Vec<String>,
    #[serde(default = "default_expand_tokens")]
    pub expand_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_max_tokens: default_max_tokens(),
            strategies: default_strategies(),
            weights: default_weights(),
            decision_keywords: default_decision_keywords(),
            expand_tokens: default_expand_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    4000
}
fn default_strategies() -> Vec<String> {
    vec!["vec".to_string(), "graph".to_string(), "lex".to_string()]
}
fn default_weights() -> HashMap<String, f64> {
    HashMap::from([
        ("vec".to_string(), 1.0),
        ("graph".to_string(), 0.7),
        ("lex".to_string(), 1.0),
    ])
}
fn default_decision_keywords() -> Vec<String> {
    vec![
        "because".to_string(),
        "decided".to_string(),
        "alternative".to_string(),
        "tradeoff".to_string(),
        "instead of".to_string(),
    ]
}
fn default_expand_tokens() -> usize {
    2000
}

/// Advisory: external indexers read this, the core never acts on it.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            ignore: default_ignore(),
        }
    }
}

fn default_ignore() -> Vec<String> {
    vec!["node_modules".to_string(), ".git".to_string(), "target".to_string()]
}

/// Advisory: a future pruning job reads this, the core never acts on it.
#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    30
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "failed to parse config file")?;

    if config.retrieval.default_max_tokens == 0 {
        anyhow::bail!("retrieval.default_max_tokens must be > 0");
    }
    if config.retrieval.strategies.is_empty() {
        anyhow::bail!("retrieval.strategies must name at least one strategy");
    }
    for name in &config.retrieval.strategies {
        if !["vec", "graph", "lex"].contains(&name.as_str()) {
            anyhow::bail!("unknown retrieval strategy: '{name}'");
        }
    }
    match config.embeddings.provider.as_str() {
        "ollama" | "openai" => {}
        other => anyhow::bail!("unknown embeddings provider: '{other}'"),
    }

    Ok(config)
}
