//! Property-style tests run against `SqliteStore`, complementing the
//! pure-logic versions already covered in `ctx-sys-core` (fusion
//! monotonicity, assembler token budget) with the on-disk realization of
//! the same invariants.

mod support;

use ctx_sys_core::models::Direction;
use ctx_sys_core::project::ProjectHandle;
use ctx_sys_core::store::{LexSearchOptions, NeighborOptions, Store, UpsertEntity, UpsertRelationship, VecSearchOptions};
use support::{store, test_pool, STUB_DIMS, STUB_MODEL};
use uuid::Uuid;

fn entity(name: &str, content: &str) -> UpsertEntity {
    UpsertEntity {
        id: None,
        entity_type: "function".to_string(),
        name: name.to_string(),
        qualified_name: format!("mod::{name}"),
        content: Some(content.to_string()),
        summary: None,
        file_path: Some("mod.rs".to_string()),
        start_line: None,
        end_line: None,
        hash: None,
        metadata: serde_json::json!({}),
    }
}

/// Invariant 1 (FTS consistency): `search_lex` returns `e` iff `e` exists.
#[tokio::test]
async fn fts_consistency_across_upsert_and_delete() {
    let (_dir, pool) = test_pool().await;
    let store = store(&pool);
    let project = ProjectHandle::new("fts");
    store.create_project(&project, STUB_MODEL, STUB_DIMS).await.unwrap();

    let e = store
        .upsert_entity(&project, entity("parseHeader", "fn parseHeader() { todo!() }"))
        .await
        .unwrap();

    let hits = store
        .search_lex(&project, "parseHeader", &LexSearchOptions::default())
        .await
        .unwrap();
    assert!(hits.iter().any(|h| h.entity.id == e.id));

    store.delete_entity(&project, e.id).await.unwrap();

    let hits = store
        .search_lex(&project, "parseHeader", &LexSearchOptions::default())
        .await
        .unwrap();
    assert!(!hits.iter().any(|h| h.entity.id == e.id));
}

/// Invariant 2 (vector isolation): two projects can register different
/// embedding dimensions in the same database file without interference.
#[tokio::test]
async fn vector_isolation_across_projects() {
    let (_dir, pool) = test_pool().await;
    let store = store(&pool);

    let small = ProjectHandle::new("small");
    let large = ProjectHandle::new("large");
    store.create_project(&small, "m-small", 3).await.unwrap();
    store.create_project(&large, "m-large", 8).await.unwrap();

    let a = store.upsert_entity(&small, entity("a", "a")).await.unwrap();
    let b = store.upsert_entity(&large, entity("b", "b")).await.unwrap();

    store.put_vector(&small, a.id, "m-small", &[1.0, 0.0, 0.0], &a.hash).await.unwrap();
    store
        .put_vector(&large, b.id, "m-large", &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], &b.hash)
        .await
        .unwrap();

    let err = store
        .put_vector(&small, a.id, "m-small", &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], &a.hash)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "dimension_mismatch");

    let hits = store
        .search_vec(&large, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], "m-large", &VecSearchOptions::default())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity.id, b.id);
}

/// Invariant 4 (staleness detection): editing an entity's content without
/// re-embedding leaves the stored vector's hash stale.
#[tokio::test]
async fn staleness_tracks_content_hash() {
    let (_dir, pool) = test_pool().await;
    let store = store(&pool);
    let project = ProjectHandle::new("stale");
    store.create_project(&project, STUB_MODEL, STUB_DIMS).await.unwrap();

    let e = store.upsert_entity(&project, entity("render", "v1 body")).await.unwrap();
    store.put_vector(&project, e.id, STUB_MODEL, &[1.0, 0.0, 0.0, 0.0], &e.hash).await.unwrap();

    let hits = store
        .search_vec(&project, &[1.0, 0.0, 0.0, 0.0], STUB_MODEL, &VecSearchOptions::default())
        .await
        .unwrap();
    assert!(!hits[0].stale);

    let updated = store
        .upsert_entity(
            &project,
            UpsertEntity { id: Some(e.id), ..entity("render", "v2 body, totally different") },
        )
        .await
        .unwrap();
    assert_ne!(updated.hash, e.hash);

    let hits = store
        .search_vec(&project, &[1.0, 0.0, 0.0, 0.0], STUB_MODEL, &VecSearchOptions::default())
        .await
        .unwrap();
    assert!(hits[0].stale);
}

/// Invariant 6 (cascade): deleting an entity removes its incident
/// relationships and its vector rows, but leaves unrelated entities intact.
#[tokio::test]
async fn cascade_on_delete() {
    let (_dir, pool) = test_pool().await;
    let store = store(&pool);
    let project = ProjectHandle::new("cascade");
    store.create_project(&project, STUB_MODEL, STUB_DIMS).await.unwrap();

    let a = store.upsert_entity(&project, entity("a", "a body")).await.unwrap();
    let b = store.upsert_entity(&project, entity("b", "b body")).await.unwrap();
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
    store.put_vector(&project, a.id, STUB_MODEL, &[1.0, 0.0, 0.0, 0.0], &a.hash).await.unwrap();

    store.delete_entity(&project, a.id).await.unwrap();

    assert!(store.get_entity(&project, a.id).await.unwrap().is_none());
    assert!(store.get_vector(&project, a.id, STUB_MODEL).await.unwrap().is_none());
    let neighbors = store.neighbors(&project, b.id, &NeighborOptions::default()).await.unwrap();
    assert!(neighbors.is_empty());
    assert!(store.get_entity(&project, b.id).await.unwrap().is_some());
}

/// Invariant 7 (idempotence): re-upserting the same payload keyed on
/// `qualified_name` preserves `id` and `created_at`.
#[tokio::test]
async fn upsert_idempotent_on_qualified_name() {
    let (_dir, pool) = test_pool().await;
    let store = store(&pool);
    let project = ProjectHandle::new("idem");
    store.create_project(&project, STUB_MODEL, STUB_DIMS).await.unwrap();

    let e1 = store.upsert_entity(&project, entity("foo", "fn foo() {}")).await.unwrap();
    let e2 = store.upsert_entity(&project, entity("foo", "fn foo() {}")).await.unwrap();

    assert_eq!(e1.id, e2.id);
    assert_eq!(e1.created_at, e2.created_at);
}

/// A relationship referencing a nonexistent endpoint is rejected rather
/// than silently written, matching the in-memory store's behavior.
#[tokio::test]
async fn relationship_requires_existing_endpoints() {
    let (_dir, pool) = test_pool().await;
    let store = store(&pool);
    let project = ProjectHandle::new("rel");
    store.create_project(&project, STUB_MODEL, STUB_DIMS).await.unwrap();

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

/// `neighbors` respects direction filtering in both senses.
#[tokio::test]
async fn neighbors_direction_filtering() {
    let (_dir, pool) = test_pool().await;
    let store = store(&pool);
    let project = ProjectHandle::new("dir");
    store.create_project(&project, STUB_MODEL, STUB_DIMS).await.unwrap();

    let a = store.upsert_entity(&project, entity("a", "a")).await.unwrap();
    let b = store.upsert_entity(&project, entity("b", "b")).await.unwrap();
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

    let out = store
        .neighbors(&project, a.id, &NeighborOptions { relationship: None, direction: Direction::Out })
        .await
        .unwrap();
    assert_eq!(out.len(), 1);

    let inbound = store
        .neighbors(&project, a.id, &NeighborOptions { relationship: None, direction: Direction::In })
        .await
        .unwrap();
    assert!(inbound.is_empty());
}
