//! `.ctx-kb` packaging: gzip of a full per-project JSON dump (entities,
//! relationships, vectors, sessions, messages, decisions).
//!
//! Trivial by design — one function pair, grounded on `flate2`'s
//! `write::GzEncoder`/`read::GzDecoder` usage pattern for bundle
//! compression, generalized from a single document bundle to a full
//! project snapshot.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use ctx_sys_core::error::{Error, Result};
use ctx_sys_core::project::ProjectHandle;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::migrate;

#[derive(Debug, Serialize, Deserialize)]
struct EntityDump {
    id: Uuid,
    entity_type: String,
    name: String,
    qualified_name: String,
    content: Option<String>,
    summary: Option<String>,
    file_path: Option<String>,
    start_line: Option<i64>,
    end_line: Option<i64>,
    hash: String,
    metadata_json: String,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RelationshipDump {
    id: Uuid,
    source_id: Uuid,
    target_id: Uuid,
    relationship: String,
    weight: f64,
    metadata_json: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorDump {
    entity_id: Uuid,
    model_id: String,
    dims: i64,
    embedding: Vec<u8>,
    content_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionDump {
    id: Uuid,
    title: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct MessageDump {
    id: Uuid,
    session_id: Uuid,
    role: String,
    content: String,
    created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DecisionDump {
    entity_id: Uuid,
    description: String,
    context: Option<String>,
    alternatives_json: String,
    supersedes: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
struct KbDump {
    schema_version: i64,
    exported_at: DateTime<Utc>,
    entities: Vec<EntityDump>,
    relationships: Vec<RelationshipDump>,
    vectors: Vec<VectorDump>,
    sessions: Vec<SessionDump>,
    messages: Vec<MessageDump>,
    decisions: Vec<DecisionDump>,
}

fn storage_err(e: sqlx::Error) -> Error {
    Error::StorageError(e.to_string())
}

/// Gzips a full JSON dump of every table in `project`'s namespace.
pub async fn export_kb(pool: &SqlitePool, project: &ProjectHandle) -> Result<Vec<u8>> {
    let entities = sqlx::query(&format!("SELECT * FROM {}", project.table("entities")))
        .fetch_all(pool)
        .await
        .map_err(storage_err)?
        .iter()
        .map(|r| EntityDump {
            id: Uuid::parse_str(&r.get::<String, _>("id")).unwrap_or_default(),
            entity_type: r.get("entity_type"),
            name: r.get("name"),
            qualified_name: r.get("qualified_name"),
            content: r.get("content"),
            summary: r.get("summary"),
            file_path: r.get("file_path"),
            start_line: r.get("start_line"),
            end_line: r.get("end_line"),
            hash: r.get("hash"),
            metadata_json: r.get("metadata_json"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
        .collect();

    let relationships = sqlx::query(&format!("SELECT * FROM {}", project.table("relationships")))
        .fetch_all(pool)
        .await
        .map_err(storage_err)?
        .iter()
        .map(|r| RelationshipDump {
            id: Uuid::parse_str(&r.get::<String, _>("id")).unwrap_or_default(),
            source_id: Uuid::parse_str(&r.get::<String, _>("source_id")).unwrap_or_default(),
            target_id: Uuid::parse_str(&r.get::<String, _>("target_id")).unwrap_or_default(),
            relationship: r.get("relationship"),
            weight: r.get("weight"),
            metadata_json: r.get("metadata_json"),
        })
        .collect();

    let vectors = sqlx::query(&format!("SELECT * FROM {}", project.table("vectors")))
        .fetch_all(pool)
        .await
        .map_err(storage_err)?
        .iter()
        .map(|r| VectorDump {
            entity_id: Uuid::parse_str(&r.get::<String, _>("entity_id")).unwrap_or_default(),
            model_id: r.get("model_id"),
            dims: r.get("dims"),
            embedding: r.get("embedding"),
            content_hash: r.get("content_hash"),
        })
        .collect();

    let sessions = sqlx::query(&format!("SELECT * FROM {}", project.table("sessions")))
        .fetch_all(pool)
        .await
        .map_err(storage_err)?
        .iter()
        .map(|r| SessionDump {
            id: Uuid::parse_str(&r.get::<String, _>("id")).unwrap_or_default(),
            title: r.get("title"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
        .collect();

    let messages = sqlx::query(&format!("SELECT * FROM {}", project.table("messages")))
        .fetch_all(pool)
        .await
        .map_err(storage_err)?
        .iter()
        .map(|r| MessageDump {
            id: Uuid::parse_str(&r.get::<String, _>("id")).unwrap_or_default(),
            session_id: Uuid::parse_str(&r.get::<String, _>("session_id")).unwrap_or_default(),
            role: r.get("role"),
            content: r.get("content"),
            created_at: r.get("created_at"),
        })
        .collect();

    let decisions = sqlx::query(&format!("SELECT * FROM {}", project.table("decisions")))
        .fetch_all(pool)
        .await
        .map_err(storage_err)?
        .iter()
        .map(|r| DecisionDump {
            entity_id: Uuid::parse_str(&r.get::<String, _>("entity_id")).unwrap_or_default(),
            description: r.get("description"),
            context: r.get("context"),
            alternatives_json: r.get("alternatives_json"),
            supersedes: r
                .get::<Option<String>, _>("supersedes")
                .and_then(|s| Uuid::parse_str(&s).ok()),
        })
        .collect();

    let dump = KbDump {
        schema_version: migrate::CURRENT_SCHEMA_VERSION,
        exported_at: Utc::now(),
        entities,
        relationships,
        vectors,
        sessions,
        messages,
        decisions,
    };

    let json = serde_json::to_vec(&dump).map_err(|e| Error::InvalidInput(e.to_string()))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(|e| Error::StorageError(e.to_string()))?;
    encoder.finish().map_err(|e| Error::StorageError(e.to_string()))
}

/// Decompresses and replays a `.ctx-kb` bundle into `project`'s (freshly
/// created) table group. Refuses a bundle from a newer schema version.
pub async fn import_kb(pool: &SqlitePool, project: &ProjectHandle, bundle: &[u8]) -> Result<()> {
    let mut decoder = GzDecoder::new(bundle);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json).map_err(|e| Error::InvalidInput(e.to_string()))?;
    let dump: KbDump =
        serde_json::from_slice(&json).map_err(|e| Error::InvalidInput(e.to_string()))?;

    if dump.schema_version > migrate::CURRENT_SCHEMA_VERSION {
        return Err(Error::SchemaError {
            found: dump.schema_version,
            required: migrate::CURRENT_SCHEMA_VERSION,
        });
    }

    let mut tx = pool.begin().await.map_err(storage_err)?;

    for e in &dump.entities {
        sqlx::query(&format!(
            "INSERT INTO {} (id, entity_type, name, qualified_name, content, summary, file_path,
                start_line, end_line, hash, metadata_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            project.table("entities")
        ))
        .bind(e.id.to_string())
        .bind(&e.entity_type)
        .bind(&e.name)
        .bind(&e.qualified_name)
        .bind(&e.content)
        .bind(&e.summary)
        .bind(&e.file_path)
        .bind(e.start_line)
        .bind(e.end_line)
        .bind(&e.hash)
        .bind(&e.metadata_json)
        .bind(&e.created_at)
        .bind(&e.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
    }

    for r in &dump.relationships {
        sqlx::query(&format!(
            "INSERT INTO {} (id, source_id, target_id, relationship, weight, metadata_json)
             VALUES (?, ?, ?, ?, ?, ?)",
            project.table("relationships")
        ))
        .bind(r.id.to_string())
        .bind(r.source_id.to_string())
        .bind(r.target_id.to_string())
        .bind(&r.relationship)
        .bind(r.weight)
        .bind(&r.metadata_json)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
    }

    for v in &dump.vectors {
        sqlx::query(&format!(
            "INSERT INTO {} (entity_id, model_id, dims, embedding, content_hash) VALUES (?, ?, ?, ?, ?)",
            project.table("vectors")
        ))
        .bind(v.entity_id.to_string())
        .bind(&v.model_id)
        .bind(v.dims)
        .bind(&v.embedding)
        .bind(&v.content_hash)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
    }

    for s in &dump.sessions {
        sqlx::query(&format!(
            "INSERT INTO {} (id, title, created_at, updated_at) VALUES (?, ?, ?, ?)",
            project.table("sessions")
        ))
        .bind(s.id.to_string())
        .bind(&s.title)
        .bind(&s.created_at)
        .bind(&s.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
    }

    for m in &dump.messages {
        sqlx::query(&format!(
            "INSERT INTO {} (id, session_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
            project.table("messages")
        ))
        .bind(m.id.to_string())
        .bind(m.session_id.to_string())
        .bind(&m.role)
        .bind(&m.content)
        .bind(&m.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
    }

    for d in &dump.decisions {
        sqlx::query(&format!(
            "INSERT INTO {} (entity_id, description, context, alternatives_json, supersedes)
             VALUES (?, ?, ?, ?, ?)",
            project.table("decisions")
        ))
        .bind(d.entity_id.to_string())
        .bind(&d.description)
        .bind(&d.context)
        .bind(&d.alternatives_json)
        .bind(d.supersedes.map(|id| id.to_string()))
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
    }

    tx.commit().await.map_err(storage_err)?;
    Ok(())
}
