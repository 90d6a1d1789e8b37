//! Database statistics for one project, surfaced by `ctx-sys stats`.

use ctx_sys_core::error::{Error, Result};
use ctx_sys_core::project::ProjectHandle;
use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub entity_count: i64,
    pub relationship_count: i64,
    pub vector_count: i64,
    pub session_count: i64,
    pub message_count: i64,
    pub decision_count: i64,
    /// Entities with no matching row in the vectors table for any model.
    pub unembedded_entity_count: i64,
}

fn storage_err(e: sqlx::Error) -> Error {
    Error::StorageError(e.to_string())
}

async fn count(pool: &SqlitePool, sql: &str) -> Result<i64> {
    sqlx::query_scalar(sql).fetch_one(pool).await.map_err(storage_err)
}

pub async fn project_stats(pool: &SqlitePool, project: &ProjectHandle) -> Result<ProjectStats> {
    let entities = project.table("entities");
    let relationships = project.table("relationships");
    let vectors = project.table("vectors");
    let sessions = project.table("sessions");
    let messages = project.table("messages");
    let decisions = project.table("decisions");

    let entity_count = count(pool, &format!("SELECT COUNT(*) FROM {entities}")).await?;
    let relationship_count = count(pool, &format!("SELECT COUNT(*) FROM {relationships}")).await?;
    let vector_count = count(pool, &format!("SELECT COUNT(*) FROM {vectors}")).await?;
    let session_count = count(pool, &format!("SELECT COUNT(*) FROM {sessions}")).await?;
    let message_count = count(pool, &format!("SELECT COUNT(*) FROM {messages}")).await?;
    let decision_count = count(pool, &format!("SELECT COUNT(*) FROM {decisions}")).await?;
    let unembedded_entity_count = count(
        pool,
        &format!(
            "SELECT COUNT(*) FROM {entities} e
             WHERE NOT EXISTS (SELECT 1 FROM {vectors} v WHERE v.entity_id = e.id)"
        ),
    )
    .await?;

    Ok(ProjectStats {
        entity_count,
        relationship_count,
        vector_count,
        session_count,
        message_count,
        decision_count,
        unembedded_entity_count,
    })
}
