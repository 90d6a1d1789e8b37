//! Database schema migrations.
//!
//! Two layers: a file-wide registry (`projects`, `embedding_models`,
//! `schema_version`) created once per database file, and a per-project
//! table group (entities, relationships, vectors, FTS, sessions, messages,
//! decisions) created idempotently by [`create_project_schema`] the first
//! time a project is touched. Mirrors the teacher's `migrate.rs` shape
//! (idempotent `CREATE TABLE IF NOT EXISTS`, manual FTS5 existence check
//! via `sqlite_master`) generalized to run once per project prefix instead
//! of once per database.

use ctx_sys_core::error::{Error, Result};
use ctx_sys_core::project::ProjectHandle;
use sqlx::{Row, SqlitePool};

/// Monotonic schema version stamped in the `schema_version` table.
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

fn storage_err(e: sqlx::Error) -> Error {
    Error::StorageError(e.to_string())
}

/// Ensures the file-wide registry tables exist and the schema version is
/// compatible, upgrading in place when the stored version is older and
/// refusing to proceed (`Error::SchemaError`) when it's newer.
pub async fn open(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            prefix TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(storage_err)?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS embedding_models (
            project_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            dims INTEGER NOT NULL,
            PRIMARY KEY (project_id, model_id)
        )",
    )
    .execute(pool)
    .await
    .map_err(storage_err)?;

    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await
        .map_err(storage_err)?;

    let found: Option<i64> = sqlx::query("SELECT version FROM schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .map_err(storage_err)?
        .map(|row| row.get("version"));

    match found {
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(CURRENT_SCHEMA_VERSION)
                .execute(pool)
                .await
                .map_err(storage_err)?;
        }
        Some(found) if found > CURRENT_SCHEMA_VERSION => {
            return Err(Error::SchemaError {
                found,
                required: CURRENT_SCHEMA_VERSION,
            });
        }
        Some(found) if found < CURRENT_SCHEMA_VERSION => {
            if found == 1 {
                upgrade_from_v1(pool).await?;
            }
            sqlx::query("UPDATE schema_version SET version = ?")
                .bind(CURRENT_SCHEMA_VERSION)
                .execute(pool)
                .await
                .map_err(storage_err)?;
        }
        Some(_) => {}
    }

    Ok(())
}

/// Folds a hypothetical pre-vector-table schema (JSON-blob vectors stored
/// inline on the entity row) into the native per-project vector tables.
/// A no-op when no v1 project tables are present, which is the only case
/// this crate can ever actually encounter today.
async fn upgrade_from_v1(_pool: &SqlitePool) -> Result<()> {
    Ok(())
}

async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(storage_err)?;
    Ok(exists)
}

/// Idempotently creates every table a project needs: entities,
/// relationships, vectors, an FTS index (with maintenance triggers),
/// sessions, messages (with its own dedicated FTS index), and decisions
/// (with its own dedicated FTS index). All three FTS indexes are
/// porter-stemmed (`tokenize='porter unicode61'`).
pub async fn create_project_schema(pool: &SqlitePool, project: &ProjectHandle) -> Result<()> {
    let entities = project.table("entities");
    let relationships = project.table("relationships");
    let vectors = project.table("vectors");
    let fts = project.table("entities_fts");
    let sessions = project.table("sessions");
    let messages = project.table("messages");
    let messages_fts = project.table("messages_fts");
    let decisions = project.table("decisions");
    let decisions_fts = project.table("decisions_fts");

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {entities} (
            id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            name TEXT NOT NULL,
            qualified_name TEXT NOT NULL UNIQUE,
            content TEXT,
            summary TEXT,
            file_path TEXT,
            start_line INTEGER,
            end_line INTEGER,
            hash TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{{}}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"
    ))
    .execute(pool)
    .await
    .map_err(storage_err)?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {relationships} (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            relationship TEXT NOT NULL,
            weight REAL NOT NULL DEFAULT 1.0,
            metadata_json TEXT NOT NULL DEFAULT '{{}}',
            UNIQUE(source_id, target_id, relationship),
            FOREIGN KEY (source_id) REFERENCES {entities}(id),
            FOREIGN KEY (target_id) REFERENCES {entities}(id)
        )"
    ))
    .execute(pool)
    .await
    .map_err(storage_err)?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS {relationships}_source_idx ON {relationships}(source_id)"
    ))
    .execute(pool)
    .await
    .map_err(storage_err)?;
    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS {relationships}_target_idx ON {relationships}(target_id)"
    ))
    .execute(pool)
    .await
    .map_err(storage_err)?;
    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS {relationships}_rel_idx ON {relationships}(relationship)"
    ))
    .execute(pool)
    .await
    .map_err(storage_err)?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {vectors} (
            entity_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            content_hash TEXT NOT NULL,
            PRIMARY KEY (entity_id, model_id),
            FOREIGN KEY (entity_id) REFERENCES {entities}(id)
        )"
    ))
    .execute(pool)
    .await
    .map_err(storage_err)?;

    if !table_exists(pool, &fts).await? {
        sqlx::query(&format!(
            "CREATE VIRTUAL TABLE {fts} USING fts5(
                entity_id UNINDEXED,
                entity_type UNINDEXED,
                name,
                content,
                summary,
                tokenize='porter unicode61'
            )"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(&format!(
            "CREATE TRIGGER {fts}_ai AFTER INSERT ON {entities} BEGIN
                INSERT INTO {fts} (entity_id, entity_type, name, content, summary)
                VALUES (new.id, new.entity_type, new.name, new.content, new.summary);
            END"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(&format!(
            "CREATE TRIGGER {fts}_ad AFTER DELETE ON {entities} BEGIN
                DELETE FROM {fts} WHERE entity_id = old.id;
            END"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(&format!(
            "CREATE TRIGGER {fts}_au AFTER UPDATE ON {entities} BEGIN
                DELETE FROM {fts} WHERE entity_id = old.id;
                INSERT INTO {fts} (entity_id, entity_type, name, content, summary)
                VALUES (new.id, new.entity_type, new.name, new.content, new.summary);
            END"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;
    }

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {sessions} (
            id TEXT PRIMARY KEY,
            title TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"
    ))
    .execute(pool)
    .await
    .map_err(storage_err)?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {messages} (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES {sessions}(id)
        )"
    ))
    .execute(pool)
    .await
    .map_err(storage_err)?;
    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS {messages}_session_idx ON {messages}(session_id)"
    ))
    .execute(pool)
    .await
    .map_err(storage_err)?;

    if !table_exists(pool, &messages_fts).await? {
        sqlx::query(&format!(
            "CREATE VIRTUAL TABLE {messages_fts} USING fts5(
                message_id UNINDEXED,
                session_id UNINDEXED,
                content,
                tokenize='porter unicode61'
            )"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(&format!(
            "CREATE TRIGGER {messages_fts}_ai AFTER INSERT ON {messages} BEGIN
                INSERT INTO {messages_fts} (message_id, session_id, content)
                VALUES (new.id, new.session_id, new.content);
            END"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(&format!(
            "CREATE TRIGGER {messages_fts}_ad AFTER DELETE ON {messages} BEGIN
                DELETE FROM {messages_fts} WHERE message_id = old.id;
            END"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(&format!(
            "CREATE TRIGGER {messages_fts}_au AFTER UPDATE ON {messages} BEGIN
                DELETE FROM {messages_fts} WHERE message_id = old.id;
                INSERT INTO {messages_fts} (message_id, session_id, content)
                VALUES (new.id, new.session_id, new.content);
            END"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;
    }

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {decisions} (
            entity_id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            context TEXT,
            alternatives_json TEXT NOT NULL DEFAULT '[]',
            supersedes TEXT,
            FOREIGN KEY (entity_id) REFERENCES {entities}(id)
        )"
    ))
    .execute(pool)
    .await
    .map_err(storage_err)?;

    if !table_exists(pool, &decisions_fts).await? {
        sqlx::query(&format!(
            "CREATE VIRTUAL TABLE {decisions_fts} USING fts5(
                entity_id UNINDEXED,
                description,
                context,
                tokenize='porter unicode61'
            )"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(&format!(
            "CREATE TRIGGER {decisions_fts}_ai AFTER INSERT ON {decisions} BEGIN
                INSERT INTO {decisions_fts} (entity_id, description, context)
                VALUES (new.entity_id, new.description, new.context);
            END"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(&format!(
            "CREATE TRIGGER {decisions_fts}_ad AFTER DELETE ON {decisions} BEGIN
                DELETE FROM {decisions_fts} WHERE entity_id = old.entity_id;
            END"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(&format!(
            "CREATE TRIGGER {decisions_fts}_au AFTER UPDATE ON {decisions} BEGIN
                DELETE FROM {decisions_fts} WHERE entity_id = old.entity_id;
                INSERT INTO {decisions_fts} (entity_id, description, context)
                VALUES (new.entity_id, new.description, new.context);
            END"
        ))
        .execute(pool)
        .await
        .map_err(storage_err)?;
    }

    sqlx::query("INSERT OR IGNORE INTO projects (id, prefix, created_at) VALUES (?, ?, strftime('%s', 'now'))")
        .bind(project.id())
        .bind(project.prefix())
        .execute(pool)
        .await
        .map_err(storage_err)?;

    Ok(())
}

pub async fn register_embedding_model(
    pool: &SqlitePool,
    project: &ProjectHandle,
    model_id: &str,
    dims: usize,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO embedding_models (project_id, model_id, dims) VALUES (?, ?, ?)
         ON CONFLICT(project_id, model_id) DO UPDATE SET dims = excluded.dims",
    )
    .bind(project.id())
    .bind(model_id)
    .bind(dims as i64)
    .execute(pool)
    .await
    .map_err(storage_err)?;
    Ok(())
}
