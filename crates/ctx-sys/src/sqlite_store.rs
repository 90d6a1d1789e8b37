//! SQLite-backed [`Store`] implementation.
//!
//! Maps every [`Store`] operation onto the per-project table group created
//! by [`crate::migrate::create_project_schema`]. Grounded on the teacher's
//! `context-harness::sqlite_store::SqliteStore` (same shape: one struct
//! wrapping a `SqlitePool`, FTS5 `MATCH`/`bm25` for lexical search, a BLOB
//! column for vectors, transactional writes), generalized from a single
//! fixed table group to one parameterized by [`ProjectHandle`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use ctx_sys_core::error::{Error, Result};
use ctx_sys_core::models::{Decision, Direction, Entity, Message, MessageRole, Relationship, Session};
use ctx_sys_core::project::ProjectHandle;
use ctx_sys_core::store::{
    LexSearchOptions, NeighborOptions, ScoredEntity, Store, UpsertEntity, UpsertRelationship,
    VecSearchOptions,
};

use crate::migrate;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn storage_err(e: sqlx::Error) -> Error {
    Error::StorageError(e.to_string())
}

fn is_fts_syntax_error(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains("fts5") || db.message().contains("syntax error"))
}

/// Retries once on `SQLITE_BUSY` (error code `"5"`) before surfacing as a
/// [`Error::StorageError`] — spec's "retry once for transient, else surface".
async fn with_retry<T, Fut>(mut op: impl FnMut() -> Fut) -> Result<T>
where
    Fut: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    match op().await {
        Ok(v) => Ok(v),
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("5") => {
            op().await.map_err(storage_err)
        }
        Err(e) => Err(storage_err(e)),
    }
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::StorageError(format!("invalid timestamp '{s}': {e}")))
}

fn entity_from_row(row: &SqliteRow) -> Result<Entity> {
    let metadata_json: String = row.get("metadata_json");
    let metadata = serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({}));
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    Ok(Entity {
        id: Uuid::parse_str(&id).map_err(|e| Error::StorageError(e.to_string()))?,
        entity_type: row.get("entity_type"),
        name: row.get("name"),
        qualified_name: row.get("qualified_name"),
        content: row.get("content"),
        summary: row.get("summary"),
        file_path: row.get("file_path"),
        start_line: row.get("start_line"),
        end_line: row.get("end_line"),
        hash: row.get("hash"),
        metadata,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn relationship_from_row(row: &SqliteRow) -> Result<Relationship> {
    let id: String = row.get("id");
    let source_id: String = row.get("source_id");
    let target_id: String = row.get("target_id");
    let metadata_json: String = row.get("metadata_json");
    Ok(Relationship {
        id: Uuid::parse_str(&id).map_err(|e| Error::StorageError(e.to_string()))?,
        source_id: Uuid::parse_str(&source_id).map_err(|e| Error::StorageError(e.to_string()))?,
        target_id: Uuid::parse_str(&target_id).map_err(|e| Error::StorageError(e.to_string()))?,
        relationship: row.get("relationship"),
        weight: row.get("weight"),
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({})),
    })
}

fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na < f32::EPSILON || nb < f32::EPSILON { 0.0 } else { dot / (na * nb) }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_project(&self, project: &ProjectHandle, model_id: &str, dims: usize) -> Result<()> {
        migrate::create_project_schema(&self.pool, project).await?;
        migrate::register_embedding_model(&self.pool, project, model_id, dims).await?;
        Ok(())
    }

    async fn upsert_entity(&self, project: &ProjectHandle, input: UpsertEntity) -> Result<Entity> {
        let table = project.table("entities");
        let id = input.id.unwrap_or_else(Uuid::new_v4).to_string();
        let hash = input
            .hash
            .unwrap_or_else(|| Entity::compute_hash(&input.name, input.content.as_deref()));
        let metadata_json = serde_json::to_string(&input.metadata)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        with_retry(|| {
            sqlx::query(&format!(
                "INSERT INTO {table}
                    (id, entity_type, name, qualified_name, content, summary, file_path,
                     start_line, end_line, hash, metadata_json, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(qualified_name) DO UPDATE SET
                    entity_type = excluded.entity_type,
                    name = excluded.name,
                    content = excluded.content,
                    summary = excluded.summary,
                    file_path = excluded.file_path,
                    start_line = excluded.start_line,
                    end_line = excluded.end_line,
                    hash = excluded.hash,
                    metadata_json = excluded.metadata_json,
                    updated_at = excluded.updated_at"
            ))
            .bind(&id)
            .bind(&input.entity_type)
            .bind(&input.name)
            .bind(&input.qualified_name)
            .bind(&input.content)
            .bind(&input.summary)
            .bind(&input.file_path)
            .bind(input.start_line)
            .bind(input.end_line)
            .bind(&hash)
            .bind(&metadata_json)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
        })
        .await?;

        let row = sqlx::query(&format!("SELECT * FROM {table} WHERE qualified_name = ?"))
            .bind(&input.qualified_name)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        entity_from_row(&row)
    }

    async fn get_entity(&self, project: &ProjectHandle, id: Uuid) -> Result<Option<Entity>> {
        let table = project.table("entities");
        let row = sqlx::query(&format!("SELECT * FROM {table} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(entity_from_row).transpose()
    }

    async fn get_entity_by_qualified_name(
        &self,
        project: &ProjectHandle,
        qualified_name: &str,
    ) -> Result<Option<Entity>> {
        let table = project.table("entities");
        let row = sqlx::query(&format!("SELECT * FROM {table} WHERE qualified_name = ?"))
            .bind(qualified_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(entity_from_row).transpose()
    }

    async fn delete_entity(&self, project: &ProjectHandle, id: Uuid) -> Result<()> {
        let entities = project.table("entities");
        let relationships = project.table("relationships");
        let vectors = project.table("vectors");
        let decisions = project.table("decisions");
        let id = id.to_string();

        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(&format!("DELETE FROM {relationships} WHERE source_id = ? OR target_id = ?"))
            .bind(&id)
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        sqlx::query(&format!("DELETE FROM {vectors} WHERE entity_id = ?"))
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        sqlx::query(&format!("DELETE FROM {decisions} WHERE entity_id = ?"))
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        sqlx::query(&format!("DELETE FROM {entities} WHERE id = ?"))
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn upsert_relationship(
        &self,
        project: &ProjectHandle,
        rel: UpsertRelationship,
    ) -> Result<Relationship> {
        let entities = project.table("entities");
        let relationships = project.table("relationships");

        let endpoint_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {entities} WHERE id = ? OR id = ?"
        ))
        .bind(rel.source_id.to_string())
        .bind(rel.target_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        if endpoint_count < 2 && rel.source_id != rel.target_id {
            return Err(Error::InvalidInput(
                "both relationship endpoints must exist".to_string(),
            ));
        }
        if endpoint_count < 1 {
            return Err(Error::InvalidInput(
                "both relationship endpoints must exist".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let metadata_json = serde_json::to_string(&rel.metadata)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        with_retry(|| {
            sqlx::query(&format!(
                "INSERT INTO {relationships} (id, source_id, target_id, relationship, weight, metadata_json)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(source_id, target_id, relationship) DO UPDATE SET
                    weight = excluded.weight,
                    metadata_json = excluded.metadata_json"
            ))
            .bind(&id)
            .bind(rel.source_id.to_string())
            .bind(rel.target_id.to_string())
            .bind(&rel.relationship)
            .bind(rel.weight)
            .bind(&metadata_json)
            .execute(&self.pool)
        })
        .await?;

        let row = sqlx::query(&format!(
            "SELECT * FROM {relationships} WHERE source_id = ? AND target_id = ? AND relationship = ?"
        ))
        .bind(rel.source_id.to_string())
        .bind(rel.target_id.to_string())
        .bind(&rel.relationship)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        relationship_from_row(&row)
    }

    async fn put_vector(
        &self,
        project: &ProjectHandle,
        entity_id: Uuid,
        model_id: &str,
        vector: &[f32],
        content_hash: &str,
    ) -> Result<()> {
        let registered: Option<i64> = sqlx::query_scalar(
            "SELECT dims FROM embedding_models WHERE project_id = ? AND model_id = ?",
        )
        .bind(project.id())
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match registered {
            Some(dims) if dims as usize != vector.len() => {
                return Err(Error::DimensionMismatch {
                    expected: dims as usize,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
            None => {
                migrate::register_embedding_model(&self.pool, project, model_id, vector.len()).await?;
            }
        }

        let table = project.table("vectors");
        let blob = vec_to_blob(vector);
        with_retry(|| {
            sqlx::query(&format!(
                "INSERT INTO {table} (entity_id, model_id, dims, embedding, content_hash)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(entity_id, model_id) DO UPDATE SET
                    dims = excluded.dims,
                    embedding = excluded.embedding,
                    content_hash = excluded.content_hash"
            ))
            .bind(entity_id.to_string())
            .bind(model_id)
            .bind(vector.len() as i64)
            .bind(&blob)
            .bind(content_hash)
            .execute(&self.pool)
        })
        .await?;

        Ok(())
    }

    async fn get_vector(
        &self,
        project: &ProjectHandle,
        entity_id: Uuid,
        model_id: &str,
    ) -> Result<Option<(Vec<f32>, String)>> {
        let table = project.table("vectors");
        let row = sqlx::query(&format!(
            "SELECT embedding, content_hash FROM {table} WHERE entity_id = ? AND model_id = ?"
        ))
        .bind(entity_id.to_string())
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|r| {
            let blob: Vec<u8> = r.get("embedding");
            let content_hash: String = r.get("content_hash");
            (blob_to_vec(&blob), content_hash)
        }))
    }

    async fn search_lex(
        &self,
        project: &ProjectHandle,
        query: &str,
        opts: &LexSearchOptions,
    ) -> Result<Vec<ScoredEntity>> {
        let entities = project.table("entities");
        let fts = project.table("entities_fts");
        let limit = if opts.limit == 0 { 20 } else { opts.limit } as i64;

        let rows = sqlx::query(&format!(
            "SELECT e.*, bm25({fts}) AS rank
             FROM {fts} f JOIN {entities} e ON e.id = f.entity_id
             WHERE f MATCH ?
             ORDER BY rank LIMIT ?"
        ))
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;

        let rows = match rows {
            Ok(rows) => rows,
            Err(e) if is_fts_syntax_error(&e) => {
                return self.search_lex_fallback(&entities, query, limit, opts).await;
            }
            Err(e) => return Err(storage_err(e)),
        };

        let mut hits = Vec::new();
        for row in &rows {
            let entity = entity_from_row(row)?;
            if let Some(types) = &opts.types {
                if !types.iter().any(|t| t == &entity.entity_type) {
                    continue;
                }
            }
            let rank: f64 = row.get("rank");
            let raw = (-rank).max(0.0);
            let score = (raw / (1.0 + raw)).max(0.0001);
            hits.push(ScoredEntity { entity, score, stale: false });
        }
        Ok(hits)
    }

    async fn search_vec(
        &self,
        project: &ProjectHandle,
        query_vec: &[f32],
        model_id: &str,
        opts: &VecSearchOptions,
    ) -> Result<Vec<ScoredEntity>> {
        let entities = project.table("entities");
        let vectors = project.table("vectors");
        let limit = if opts.limit == 0 { 20 } else { opts.limit };

        let rows = sqlx::query(&format!(
            "SELECT e.*, v.embedding, v.content_hash
             FROM {vectors} v JOIN {entities} e ON e.id = v.entity_id
             WHERE v.model_id = ?"
        ))
        .bind(model_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let mut hits: Vec<ScoredEntity> = Vec::new();
        for row in &rows {
            let entity = entity_from_row(row)?;
            if let Some(types) = &opts.types {
                if !types.iter().any(|t| t == &entity.entity_type) {
                    continue;
                }
            }
            let blob: Vec<u8> = row.get("embedding");
            let content_hash: String = row.get("content_hash");
            let vector = blob_to_vec(&blob);
            let score = cosine(query_vec, &vector).max(0.0) as f64;
            hits.push(ScoredEntity {
                entity: entity.clone(),
                score,
                stale: content_hash != entity.hash,
            });
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(limit);
        Ok(hits)
    }

    async fn neighbors(
        &self,
        project: &ProjectHandle,
        entity_id: Uuid,
        opts: &NeighborOptions,
    ) -> Result<Vec<Relationship>> {
        let relationships = project.table("relationships");
        let id = entity_id.to_string();

        let where_direction = match opts.direction {
            Direction::Out => "source_id = ?",
            Direction::In => "target_id = ?",
            Direction::Both => "(source_id = ? OR target_id = ?)",
        };

        let sql = if let Some(rel) = &opts.relationship {
            format!("SELECT * FROM {relationships} WHERE {where_direction} AND relationship = ?")
        } else {
            format!("SELECT * FROM {relationships} WHERE {where_direction}")
        };

        let mut q = sqlx::query(&sql).bind(&id);
        if matches!(opts.direction, Direction::Both) {
            q = q.bind(&id);
        }
        if let Some(rel) = &opts.relationship {
            q = q.bind(rel);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(storage_err)?;
        rows.iter().map(relationship_from_row).collect()
    }

    async fn create_session(&self, project: &ProjectHandle, title: Option<&str>) -> Result<Session> {
        let table = project.table("sessions");
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(&format!(
            "INSERT INTO {table} (id, title, created_at, updated_at) VALUES (?, ?, ?, ?)"
        ))
        .bind(id.to_string())
        .bind(title)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(Session {
            id,
            title: title.map(str::to_string),
            created_at: now,
            updated_at: now,
        })
    }

    async fn append_message(
        &self,
        project: &ProjectHandle,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let sessions = project.table("sessions");
        let messages = project.table("messages");

        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) > 0 FROM {sessions} WHERE id = ?"
        ))
        .bind(session_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        if !exists {
            return Err(Error::not_found("session", session_id.to_string()));
        }

        let role_str = match role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        };
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(&format!(
            "INSERT INTO {messages} (id, session_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)"
        ))
        .bind(id.to_string())
        .bind(session_id.to_string())
        .bind(role_str)
        .bind(content)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(Message {
            id,
            session_id,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    async fn list_messages(&self, project: &ProjectHandle, session_id: Uuid) -> Result<Vec<Message>> {
        let table = project.table("messages");
        let rows = sqlx::query(&format!(
            "SELECT * FROM {table} WHERE session_id = ? ORDER BY created_at ASC"
        ))
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter()
            .map(|row| {
                let role_str: String = row.get("role");
                let role = match role_str.as_str() {
                    "assistant" => MessageRole::Assistant,
                    "system" => MessageRole::System,
                    _ => MessageRole::User,
                };
                let id: String = row.get("id");
                let created_at: String = row.get("created_at");
                Ok(Message {
                    id: Uuid::parse_str(&id).map_err(|e| Error::StorageError(e.to_string()))?,
                    session_id,
                    role,
                    content: row.get("content"),
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }

    async fn upsert_decision(&self, project: &ProjectHandle, decision: Decision) -> Result<Decision> {
        let table = project.table("decisions");
        let alternatives_json = serde_json::to_string(&decision.alternatives)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        sqlx::query(&format!(
            "INSERT INTO {table} (entity_id, description, context, alternatives_json, supersedes)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(entity_id) DO UPDATE SET
                description = excluded.description,
                context = excluded.context,
                alternatives_json = excluded.alternatives_json,
                supersedes = excluded.supersedes"
        ))
        .bind(decision.entity_id.to_string())
        .bind(&decision.description)
        .bind(&decision.context)
        .bind(&alternatives_json)
        .bind(decision.supersedes.map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(decision)
    }

    async fn search_decisions(
        &self,
        project: &ProjectHandle,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Decision>> {
        let decisions = project.table("decisions");
        let fts = project.table("decisions_fts");
        let limit = if limit == 0 { 20 } else { limit } as i64;

        let rows = sqlx::query(&format!(
            "SELECT d.* FROM {fts} f JOIN {decisions} d ON d.entity_id = f.entity_id
             WHERE f MATCH ? ORDER BY bm25({fts}) LIMIT ?"
        ))
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter()
            .map(|row| {
                let entity_id: String = row.get("entity_id");
                let alternatives_json: String = row.get("alternatives_json");
                let supersedes: Option<String> = row.get("supersedes");
                Ok(Decision {
                    entity_id: Uuid::parse_str(&entity_id).map_err(|e| Error::StorageError(e.to_string()))?,
                    description: row.get("description"),
                    context: row.get("context"),
                    alternatives: serde_json::from_str(&alternatives_json).unwrap_or_default(),
                    supersedes: supersedes
                        .map(|s| Uuid::parse_str(&s))
                        .transpose()
                        .map_err(|e| Error::StorageError(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn search_messages(
        &self,
        project: &ProjectHandle,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let messages = project.table("messages");
        let fts = project.table("messages_fts");
        let limit = if limit == 0 { 20 } else { limit } as i64;

        let rows = sqlx::query(&format!(
            "SELECT m.* FROM {fts} f JOIN {messages} m ON m.id = f.message_id
             WHERE f MATCH ? ORDER BY bm25({fts}) LIMIT ?"
        ))
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter()
            .map(|row| {
                let role_str: String = row.get("role");
                let role = match role_str.as_str() {
                    "assistant" => MessageRole::Assistant,
                    "system" => MessageRole::System,
                    _ => MessageRole::User,
                };
                let id: String = row.get("id");
                let session_id: String = row.get("session_id");
                let created_at: String = row.get("created_at");
                Ok(Message {
                    id: Uuid::parse_str(&id).map_err(|e| Error::StorageError(e.to_string()))?,
                    session_id: Uuid::parse_str(&session_id).map_err(|e| Error::StorageError(e.to_string()))?,
                    role,
                    content: row.get("content"),
                    created_at: parse_ts(&created_at)?,
                })
            })
            .collect()
    }

    async fn project_exists(&self, project: &ProjectHandle) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM projects WHERE id = ?")
            .bind(project.id())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(exists)
    }
}

impl SqliteStore {
    async fn search_lex_fallback(
        &self,
        entities_table: &str,
        query: &str,
        limit: i64,
        opts: &LexSearchOptions,
    ) -> Result<Vec<ScoredEntity>> {
        let pattern = format!("%{}%", query.replace('%', "").replace('_', ""));
        let rows = sqlx::query(&format!(
            "SELECT * FROM {entities_table}
             WHERE name LIKE ? OR content LIKE ? OR summary LIKE ?
             LIMIT ?"
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter()
            .filter_map(|row| {
                let entity = match entity_from_row(row) {
                    Ok(e) => e,
                    Err(e) => return Some(Err(e)),
                };
                if let Some(types) = &opts.types {
                    if !types.iter().any(|t| t == &entity.entity_type) {
                        return None;
                    }
                }
                Some(Ok(ScoredEntity { entity, score: 0.3, stale: false }))
            })
            .collect()
    }
}
