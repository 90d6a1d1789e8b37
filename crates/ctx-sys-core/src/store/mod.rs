//! Storage abstraction for ctx-sys.
//!
//! The [`Store`] trait defines every operation the retrieval pipeline needs
//! from the embedded database, per `SPEC_FULL.md` §4.1. Implementations
//! (SQLite in `ctx-sys`, in-memory here for tests) must be `Send + Sync`.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Decision, Direction, Entity, Message, MessageRole, Relationship, Session};
use crate::project::ProjectHandle;

/// Input to `upsert_entity`. `id` and `hash` are optional — omitting `id`
/// creates a new entity (or updates the one matching `qualified_name`);
/// omitting `hash` makes the store recompute it from `content`/`name`.
#[derive(Debug, Clone)]
pub struct UpsertEntity {
    pub id: Option<Uuid>,
    pub entity_type: String,
    pub name: String,
    pub qualified_name: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub file_path: Option<String>,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub hash: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct UpsertRelationship {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relationship: String,
    pub weight: f64,
    pub metadata: serde_json::Value,
}

/// An entity returned from `search_lex` or `search_vec`, with a
/// normalized score in `(0, 1]`.
#[derive(Debug, Clone)]
pub struct ScoredEntity {
    pub entity: Entity,
    pub score: f64,
    /// Set by `search_vec` when the stored vector's `content_hash` no
    /// longer matches the entity's live `hash`.
    pub stale: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LexSearchOptions {
    pub types: Option<Vec<String>>,
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VecSearchOptions {
    pub types: Option<Vec<String>>,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct NeighborOptions {
    pub relationship: Option<String>,
    pub direction: Direction,
}

impl Default for NeighborOptions {
    fn default() -> Self {
        Self {
            relationship: None,
            direction: Direction::Both,
        }
    }
}

/// Abstract storage backend for ctx-sys.
///
/// | Method | Purpose |
/// |---|---|
/// | [`create_project`](Store::create_project) | Materialize a project's tables, idempotently |
/// | [`upsert_entity`](Store::upsert_entity) | Insert or update, keyed by `qualified_name` |
/// | [`delete_entity`](Store::delete_entity) | Cascading delete |
/// | [`upsert_relationship`](Store::upsert_relationship) | Insert or update, keyed by `(source, target, relationship)` |
/// | [`put_vector`](Store::put_vector) | Store an embedding, checked against the project's dimension |
/// | [`search_lex`](Store::search_lex) | BM25-ranked full-text search |
/// | [`search_vec`](Store::search_vec) | Cosine-similarity nearest neighbours |
/// | [`neighbors`](Store::neighbors) | One-hop graph traversal |
#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotent. Creates the entity/relationship/vector/FTS tables (and
    /// forward-compatible sessions/decisions/reflections/checkpoints tables)
    /// for `project`, sized to `dims` for the given `model_id`.
    async fn create_project(
        &self,
        project: &ProjectHandle,
        model_id: &str,
        dims: usize,
    ) -> Result<()>;

    async fn upsert_entity(&self, project: &ProjectHandle, entity: UpsertEntity) -> Result<Entity>;

    async fn get_entity(&self, project: &ProjectHandle, id: Uuid) -> Result<Option<Entity>>;

    async fn get_entity_by_qualified_name(
        &self,
        project: &ProjectHandle,
        qualified_name: &str,
    ) -> Result<Option<Entity>>;

    /// Cascades to incident relationships, vectors, and FTS rows.
    async fn delete_entity(&self, project: &ProjectHandle, id: Uuid) -> Result<()>;

    async fn upsert_relationship(
        &self,
        project: &ProjectHandle,
        rel: UpsertRelationship,
    ) -> Result<Relationship>;

    /// Writes vector metadata and the native vector in one transaction.
    /// Returns `Error::DimensionMismatch` if `vector.len()` doesn't match
    /// the project's registered dimension for `model_id`.
    async fn put_vector(
        &self,
        project: &ProjectHandle,
        entity_id: Uuid,
        model_id: &str,
        vector: &[f32],
        content_hash: &str,
    ) -> Result<()>;

    async fn get_vector(
        &self,
        project: &ProjectHandle,
        entity_id: Uuid,
        model_id: &str,
    ) -> Result<Option<(Vec<f32>, String)>>;

    async fn search_lex(
        &self,
        project: &ProjectHandle,
        query: &str,
        opts: &LexSearchOptions,
    ) -> Result<Vec<ScoredEntity>>;

    async fn search_vec(
        &self,
        project: &ProjectHandle,
        query_vec: &[f32],
        model_id: &str,
        opts: &VecSearchOptions,
    ) -> Result<Vec<ScoredEntity>>;

    async fn neighbors(
        &self,
        project: &ProjectHandle,
        entity_id: Uuid,
        opts: &NeighborOptions,
    ) -> Result<Vec<Relationship>>;

    // ---- sessions / messages / decisions (co-owned, out-of-core focus) ----

    async fn create_session(&self, project: &ProjectHandle, title: Option<&str>)
        -> Result<Session>;

    async fn append_message(
        &self,
        project: &ProjectHandle,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message>;

    async fn list_messages(&self, project: &ProjectHandle, session_id: Uuid) -> Result<Vec<Message>>;

    async fn upsert_decision(&self, project: &ProjectHandle, decision: Decision) -> Result<Decision>;

    /// Lexical search over the dedicated decision index
    /// (`SPEC_FULL.md` §3, "Searchable via a dedicated lexical index").
    async fn search_decisions(
        &self,
        project: &ProjectHandle,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Decision>>;

    /// Lexical search over the dedicated message index (`SPEC_FULL.md`
    /// §4.2, the porter-stemmed `messages_fts` table).
    async fn search_messages(
        &self,
        project: &ProjectHandle,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Message>>;

    /// Whether `create_project` has ever been called for this project.
    /// Checked up front by the retrieval pipeline so an unknown project
    /// surfaces as `Error::InvalidInput`, not a storage error.
    async fn project_exists(&self, project: &ProjectHandle) -> Result<bool>;
}
