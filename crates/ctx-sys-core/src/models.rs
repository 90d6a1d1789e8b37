//! Core data model: entities, relationships, vectors, sessions, decisions.
//!
//! Matches `SPEC_FULL.md` §3. These types flow through the store, strategy,
//! fusion, and assembler layers; none of them hold a database connection.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// An indexed unit of knowledge: a function, class, file, doc section,
/// instruction, decision, or any other caller-introduced type tag.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Entity {
    pub id: Uuid,
    /// Open-set tag: `function`, `class`, `file`, `module`, `document_section`,
    /// `instruction`, `decision`, `concept`, or any caller-introduced type.
    pub entity_type: String,
    pub name: String,
    /// Unique within a project; the upsert key alongside `id`.
    pub qualified_name: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub file_path: Option<String>,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    /// Content fingerprint. Derived automatically on upsert unless supplied.
    pub hash: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// SHA-256 over `content` if present, else `name` — the fingerprint used
    /// for staleness detection of derived artifacts (vectors, summaries).
    pub fn compute_hash(name: &str, content: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.unwrap_or(name).as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A directed, typed edge between two entities in the same project.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Relationship {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    /// Open-set tag: `calls`, `imports`, `contains`, `references`, ...
    pub relationship: String,
    /// In `[0, 1]`.
    pub weight: f64,
    pub metadata: serde_json::Value,
}

/// Direction of a one-hop traversal from `neighbors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

/// Metadata row for one `(entity_id, model_id)` embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub entity_id: Uuid,
    pub model_id: String,
    pub dims: usize,
    pub embedding: Vec<f32>,
    /// Snapshot of the entity's `hash` at embed time.
    pub content_hash: String,
}

/// One message in a session's transcript.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A group of messages.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A first-class decision entity. Stored alongside `Entity` (entity_type =
/// "decision") but carries fields `Entity::metadata` would otherwise have to
/// encode loosely; kept as a typed wrapper for callers that need it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Decision {
    pub entity_id: Uuid,
    pub description: String,
    pub context: Option<String>,
    pub alternatives: Vec<String>,
    /// Entity ID of a decision this one supersedes, if any.
    pub supersedes: Option<Uuid>,
}
