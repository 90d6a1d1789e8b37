//! Canonical query input/output shape, per `SPEC_FULL.md` §6. Shared
//! verbatim by the CLI (`serde_json` pretty-print) and the MCP tool
//! response — one struct pair, two serializations.

use serde::{Deserialize, Serialize};

use crate::render::RenderFormat;

fn default_max_tokens() -> usize {
    4000
}

fn default_strategies() -> Vec<String> {
    vec!["vec".to_string(), "graph".to_string(), "lex".to_string()]
}

fn default_include_sources() -> bool {
    true
}

fn default_expand_tokens() -> usize {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryContextOptions {
    pub project: String,
    pub query: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,
    #[serde(default)]
    pub include_types: Option<Vec<String>>,
    #[serde(default = "default_include_sources")]
    pub include_sources: bool,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub expand: bool,
    #[serde(default = "default_expand_tokens")]
    pub expand_tokens: usize,
    #[serde(default)]
    pub decompose: bool,
    #[serde(default)]
    pub gate: bool,
    #[serde(default)]
    pub hyde: bool,
    #[serde(default)]
    pub format: RenderFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    /// In `(0, 1]`.
    pub relevance: f64,
    pub file_path: Option<String>,
    /// Non-fatal degradation notes, e.g. "semantic strategy unavailable".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryContextResult {
    pub context: String,
    pub sources: Vec<SourceEntry>,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub tokens_used: usize,
    pub truncated: bool,
}
