//! In-memory [`Store`] implementation for unit and property tests.
//!
//! Uses `HashMap`/`Vec` behind `std::sync::RwLock`. Keyword search is a
//! substring scan (no FTS engine); vector search is brute-force cosine.
//! Mirrors the shape of the SQLite implementation closely enough that
//! property tests (RRF monotonicity, idempotence) can run against either.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Decision, Direction, Entity, Message, MessageRole, Relationship, Session};
use crate::project::ProjectHandle;

use super::{
    LexSearchOptions, NeighborOptions, Store, UpsertEntity, UpsertRelationship, VecSearchOptions,
};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na < f32::EPSILON || nb < f32::EPSILON {
        0.0
    } else {
        dot / (na * nb)
    }
}

struct ProjectData {
    dims: HashMap<String, usize>,
    entities: HashMap<Uuid, Entity>,
    by_qualified_name: HashMap<String, Uuid>,
    relationships: HashMap<Uuid, Relationship>,
    vectors: HashMap<(Uuid, String), (Vec<f32>, String)>,
    sessions: HashMap<Uuid, Session>,
    messages: HashMap<Uuid, Vec<Message>>,
    decisions: HashMap<Uuid, Decision>,
}

impl ProjectData {
    fn new() -> Self {
        Self {
            dims: HashMap::new(),
            entities: HashMap::new(),
            by_qualified_name: HashMap::new(),
            relationships: HashMap::new(),
            vectors: HashMap::new(),
            sessions: HashMap::new(),
            messages: HashMap::new(),
            decisions: HashMap::new(),
        }
    }
}

/// In-memory store for tests and WASM-style environments without SQLite.
pub struct InMemoryStore {
    projects: RwLock<HashMap<String, ProjectData>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_project(
        &self,
        project: &ProjectHandle,
        model_id: &str,
        dims: usize,
    ) -> Result<()> {
        let mut projects = self.projects.write().unwrap();
        let data = projects
            .entry(project.prefix().to_string())
            .or_insert_with(ProjectData::new);
        data.dims.insert(model_id.to_string(), dims);
        Ok(())
    }

    async fn upsert_entity(&self, project: &ProjectHandle, input: UpsertEntity) -> Result<Entity> {
        let mut projects = self.projects.write().unwrap();
        let data = projects
            .entry(project.prefix().to_string())
            .or_insert_with(ProjectData::new);

        let existing_id = data.by_qualified_name.get(&input.qualified_name).copied();
        let id = input.id.or(existing_id).unwrap_or_else(Uuid::new_v4);
        let now = Utc::now();
        let created_at = data
            .entities
            .get(&id)
            .map(|e| e.created_at)
            .unwrap_or(now);
        let hash = input
            .hash
            .unwrap_or_else(|| Entity::compute_hash(&input.name, input.content.as_deref()));

        let entity = Entity {
            id,
            entity_type: input.entity_type,
            name: input.name,
            qualified_name: input.qualified_name.clone(),
            content: input.content,
            summary: input.summary,
            file_path: input.file_path,
            start_line: input.start_line,
            end_line: input.end_line,
            hash,
            metadata: input.metadata,
            created_at,
            updated_at: now,
        };

        data.by_qualified_name.insert(input.qualified_name, id);
        data.entities.insert(id, entity.clone());
        Ok(entity)
    }

    async fn get_entity(&self, project: &ProjectHandle, id: Uuid) -> Result<Option<Entity>> {
        let projects = self.projects.read().unwrap();
        Ok(projects
            .get(project.prefix())
            .and_then(|d| d.entities.get(&id).cloned()))
    }

    async fn get_entity_by_qualified_name(
        &self,
        project: &ProjectHandle,
        qualified_name: &str,
    ) -> Result<Option<Entity>> {
        let projects = self.projects.read().unwrap();
        Ok(projects.get(project.prefix()).and_then(|d| {
            d.by_qualified_name
                .get(qualified_name)
                .and_then(|id| d.entities.get(id).cloned())
        }))
    }

    async fn delete_entity(&self, project: &ProjectHandle, id: Uuid) -> Result<()> {
        let mut projects = self.projects.write().unwrap();
        if let Some(data) = projects.get_mut(project.prefix()) {
            if let Some(e) = data.entities.remove(&id) {
                data.by_qualified_name.remove(&e.qualified_name);
            }
            data.relationships
                .retain(|_, r| r.source_id != id && r.target_id != id);
            data.vectors.retain(|(eid, _), _| *eid != id);
        }
        Ok(())
    }

    async fn upsert_relationship(
        &self,
        project: &ProjectHandle,
        rel: UpsertRelationship,
    ) -> Result<Relationship> {
        let mut projects = self.projects.write().unwrap();
        let data = projects
            .entry(project.prefix().to_string())
            .or_insert_with(ProjectData::new);

        if !data.entities.contains_key(&rel.source_id) || !data.entities.contains_key(&rel.target_id) {
            return Err(Error::InvalidInput(
                "both relationship endpoints must exist".to_string(),
            ));
        }

        let existing = data.relationships.values().find(|r| {
            r.source_id == rel.source_id
                && r.target_id == rel.target_id
                && r.relationship == rel.relationship
        });

        let id = existing.map(|r| r.id).unwrap_or_else(Uuid::new_v4);
        let relationship = Relationship {
            id,
            source_id: rel.source_id,
            target_id: rel.target_id,
            relationship: rel.relationship,
            weight: rel.weight,
            metadata: rel.metadata,
        };
        data.relationships.insert(id, relationship.clone());
        Ok(relationship)
    }

    async fn put_vector(
        &self,
        project: &ProjectHandle,
        entity_id: Uuid,
        model_id: &str,
        vector: &[f32],
        content_hash: &str,
    ) -> Result<()> {
        let mut projects = self.projects.write().unwrap();
        let data = projects
            .entry(project.prefix().to_string())
            .or_insert_with(ProjectData::new);

        if let Some(&expected) = data.dims.get(model_id) {
            if vector.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        } else {
            data.dims.insert(model_id.to_string(), vector.len());
        }

        data.vectors.insert(
            (entity_id, model_id.to_string()),
            (vector.to_vec(), content_hash.to_string()),
        );
        Ok(())
    }

    async fn get_vector(
        &self,
        project: &ProjectHandle,
        entity_id: Uuid,
        model_id: &str,
    ) -> Result<Option<(Vec<f32>, String)>> {
        let projects = self.projects.read().unwrap();
        Ok(projects
            .get(project.prefix())
            .and_then(|d| d.vectors.get(&(entity_id, model_id.to_string())).cloned()))
    }

    async fn search_lex(
        &self,
        project: &ProjectHandle,
        query: &str,
        opts: &LexSearchOptions,
    ) -> Result<Vec<super::ScoredEntity>> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let projects = self.projects.read().unwrap();
        let Some(data) = projects.get(project.prefix()) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<super::ScoredEntity> = data
            .entities
            .values()
            .filter(|e| {
                opts.types
                    .as_ref()
                    .map(|t| t.iter().any(|ty| ty == &e.entity_type))
                    .unwrap_or(true)
            })
            .filter_map(|e| {
                let haystack = format!(
                    "{} {} {}",
                    e.name,
                    e.content.as_deref().unwrap_or(""),
                    e.summary.as_deref().unwrap_or("")
                )
                .to_lowercase();
                let matches = terms.iter().filter(|t| haystack.contains(*t)).count();
                if matches == 0 {
                    return None;
                }
                let score = (matches as f64 / terms.len() as f64).min(1.0).max(0.01);
                Some(super::ScoredEntity {
                    entity: e.clone(),
                    score,
                    stale: false,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap()
                .then(a.entity.qualified_name.cmp(&b.entity.qualified_name))
        });
        let limit = if opts.limit == 0 { 20 } else { opts.limit };
        hits.truncate(limit);
        Ok(hits)
    }

    async fn search_vec(
        &self,
        project: &ProjectHandle,
        query_vec: &[f32],
        model_id: &str,
        opts: &VecSearchOptions,
    ) -> Result<Vec<super::ScoredEntity>> {
        let projects = self.projects.read().unwrap();
        let Some(data) = projects.get(project.prefix()) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<super::ScoredEntity> = data
            .vectors
            .iter()
            .filter(|((_, mid), _)| mid == model_id)
            .filter_map(|((eid, _), (vec, content_hash))| {
                let entity = data.entities.get(eid)?;
                if let Some(types) = &opts.types {
                    if !types.iter().any(|t| t == &entity.entity_type) {
                        return None;
                    }
                }
                let sim = cosine(query_vec, vec).max(0.0) as f64;
                Some(super::ScoredEntity {
                    entity: entity.clone(),
                    score: sim,
                    stale: content_hash != &entity.hash,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        let limit = if opts.limit == 0 { 20 } else { opts.limit };
        hits.truncate(limit);
        Ok(hits)
    }

    async fn neighbors(
        &self,
        project: &ProjectHandle,
        entity_id: Uuid,
        opts: &NeighborOptions,
    ) -> Result<Vec<Relationship>> {
        let projects = self.projects.read().unwrap();
        let Some(data) = projects.get(project.prefix()) else {
            return Ok(Vec::new());
        };

        Ok(data
            .relationships
            .values()
            .filter(|r| match opts.direction {
                Direction::Out => r.source_id == entity_id,
                Direction::In => r.target_id == entity_id,
                Direction::Both => r.source_id == entity_id || r.target_id == entity_id,
            })
            .filter(|r| {
                opts.relationship
                    .as_ref()
                    .map(|rel| rel == &r.relationship)
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn create_session(
        &self,
        project: &ProjectHandle,
        title: Option<&str>,
    ) -> Result<Session> {
        let mut projects = self.projects.write().unwrap();
        let data = projects
            .entry(project.prefix().to_string())
            .or_insert_with(ProjectData::new);
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            title: title.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        data.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn append_message(
        &self,
        project: &ProjectHandle,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let mut projects = self.projects.write().unwrap();
        let data = projects
            .entry(project.prefix().to_string())
            .or_insert_with(ProjectData::new);
        if !data.sessions.contains_key(&session_id) {
            return Err(Error::not_found("session", session_id.to_string()));
        }
        let message = Message {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        data.messages
            .entry(session_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        project: &ProjectHandle,
        session_id: Uuid,
    ) -> Result<Vec<Message>> {
        let projects = self.projects.read().unwrap();
        Ok(projects
            .get(project.prefix())
            .and_then(|d| d.messages.get(&session_id).cloned())
            .unwrap_or_default())
    }

    async fn upsert_decision(
        &self,
        project: &ProjectHandle,
        decision: Decision,
    ) -> Result<Decision> {
        let mut projects = self.projects.write().unwrap();
        let data = projects
            .entry(project.prefix().to_string())
            .or_insert_with(ProjectData::new);
        data.decisions.insert(decision.entity_id, decision.clone());
        Ok(decision)
    }

    async fn search_decisions(
        &self,
        project: &ProjectHandle,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Decision>> {
        let query_lower = query.to_lowercase();
        let projects = self.projects.read().unwrap();
        let Some(data) = projects.get(project.prefix()) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<Decision> = data
            .decisions
            .values()
            .filter(|d| d.description.to_lowercase().contains(&query_lower))
            .cloned()
            .collect();
        hits.truncate(if limit == 0 { 20 } else { limit });
        Ok(hits)
    }

    async fn search_messages(
        &self,
        project: &ProjectHandle,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let query_lower = query.to_lowercase();
        let projects = self.projects.read().unwrap();
        let Some(data) = projects.get(project.prefix()) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<Message> = data
            .messages
            .values()
            .flatten()
            .filter(|m| m.content.to_lowercase().contains(&query_lower))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits.truncate(if limit == 0 { 20 } else { limit });
        Ok(hits)
    }

    async fn project_exists(&self, project: &ProjectHandle) -> Result<bool> {
        let projects = self.projects.read().unwrap();
        Ok(projects.contains_key(project.prefix()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UpsertEntity;

    fn make_entity(name: &str) -> UpsertEntity {
        UpsertEntity {
            id: None,
            entity_type: "function".to_string(),
            name: name.to_string(),
            qualified_name: format!("file::{name}"),
            content: Some(format!("fn {name}() {{}}")),
            summary: None,
            file_path: Some("file.rs".to_string()),
            start_line: None,
            end_line: None,
            hash: None,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_qualified_name() {
        let store = InMemoryStore::new();
        let project = ProjectHandle::new("p1");
        store.create_project(&project, "m", 3).await.unwrap();

        let e1 = store.upsert_entity(&project, make_entity("foo")).await.unwrap();
        let e2 = store.upsert_entity(&project, make_entity("foo")).await.unwrap();
        assert_eq!(e1.id, e2.id);
        assert_eq!(e1.created_at, e2.created_at);
    }

    #[tokio::test]
    async fn delete_cascades_to_relationships_and_vectors() {
        let store = InMemoryStore::new();
        let project = ProjectHandle::new("p1");
        store.create_project(&project, "m", 3).await.unwrap();

        let a = store.upsert_entity(&project, make_entity("a")).await.unwrap();
        let b = store.upsert_entity(&project, make_entity("b")).await.unwrap();
        store
            .upsert_relationship(
                &project,
                UpsertRelationship {
                    source_id: a.id,
                    target_id: b.id,
                    relationship: "calls".to_string(),
                    weight: 1.0,
                    metadata: serde_json::json!({}),
                },
            )
            .await
            .unwrap();
        store
            .put_vector(&project, a.id, "m", &[1.0, 0.0, 0.0], &a.hash)
            .await
            .unwrap();

        store.delete_entity(&project, a.id).await.unwrap();

        assert!(store.get_entity(&project, a.id).await.unwrap().is_none());
        assert!(store.get_vector(&project, a.id, "m").await.unwrap().is_none());
        let neighbors = store
            .neighbors(&project, b.id, &NeighborOptions::default())
            .await
            .unwrap();
        assert!(neighbors.is_empty());
        assert!(store.get_entity(&project, b.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let store = InMemoryStore::new();
        let project = ProjectHandle::new("p1");
        store.create_project(&project, "m", 3).await.unwrap();
        let a = store.upsert_entity(&project, make_entity("a")).await.unwrap();
        store
            .put_vector(&project, a.id, "m", &[1.0, 0.0, 0.0], &a.hash)
            .await
            .unwrap();
        let err = store
            .put_vector(&project, a.id, "m", &[1.0, 0.0], &a.hash)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "dimension_mismatch");
    }

    #[tokio::test]
    async fn relationship_requires_existing_endpoints() {
        let store = InMemoryStore::new();
        let project = ProjectHandle::new("p1");
        store.create_project(&project, "m", 3).await.unwrap();
        let err = store
            .upsert_relationship(
                &project,
                UpsertRelationship {
                    source_id: Uuid::new_v4(),
                    target_id: Uuid::new_v4(),
                    relationship: "calls".to_string(),
                    weight: 1.0,
                    metadata: serde_json::json!({}),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }
}
