//! Round-trip law: export-then-import reproduces a project's entities,
//! relationships, and vectors exactly (up to float tolerance on vectors).

mod support;

use ctx_sys::kb;
use ctx_sys_core::project::ProjectHandle;
use ctx_sys_core::store::{NeighborOptions, Store, UpsertEntity, UpsertRelationship};
use support::{store, test_pool, STUB_DIMS, STUB_MODEL};

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
        metadata: serde_json::json!({"visibility": "public"}),
    }
}

#[tokio::test]
async fn export_then_import_reproduces_project_state() {
    let (_src_dir, src_pool) = test_pool().await;
    let src = store(&src_pool);
    let project = ProjectHandle::new("bundle");
    src.create_project(&project, STUB_MODEL, STUB_DIMS).await.unwrap();

    let a = src.upsert_entity(&project, entity("a", "fn a() {}")).await.unwrap();
    let b = src.upsert_entity(&project, entity("b", "fn b() { a(); }")).await.unwrap();
    src.upsert_relationship(
        &project,
        UpsertRelationship {
            source_id: b.id,
            target_id: a.id,
            relationship: "calls".to_string(),
            weight: 0.9,
            metadata: serde_json::json!({}),
        },
    )
    .await
    .unwrap();
    src.put_vector(&project, a.id, STUB_MODEL, &[0.1, 0.2, 0.3, 0.4], &a.hash).await.unwrap();
    src.put_vector(&project, b.id, STUB_MODEL, &[0.5, 0.6, 0.7, 0.8], &b.hash).await.unwrap();

    let session = src.create_session(&project, Some("first session")).await.unwrap();
    src.append_message(&project, session.id, ctx_sys_core::models::MessageRole::User, "hi")
        .await
        .unwrap();
    src.upsert_decision(
        &project,
        ctx_sys_core::models::Decision {
            entity_id: a.id,
            description: "use RRF for fusion".to_string(),
            context: Some("needed a tie-breaking scheme".to_string()),
            alternatives: vec!["weighted sum".to_string()],
            supersedes: None,
        },
    )
    .await
    .unwrap();

    let bundle = kb::export_kb(&src_pool, &project).await.unwrap();

    let (_dst_dir, dst_pool) = test_pool().await;
    let dst = store(&dst_pool);
    let other_project = ProjectHandle::new("bundle");
    dst.create_project(&other_project, STUB_MODEL, STUB_DIMS).await.unwrap();
    kb::import_kb(&dst_pool, &other_project, &bundle).await.unwrap();

    let a2 = dst.get_entity(&other_project, a.id).await.unwrap().unwrap();
    let b2 = dst.get_entity(&other_project, b.id).await.unwrap().unwrap();
    assert_eq!(a2.qualified_name, a.qualified_name);
    assert_eq!(a2.hash, a.hash);
    assert_eq!(b2.content, b.content);

    let neighbors = dst.neighbors(&other_project, a.id, &NeighborOptions::default()).await.unwrap();
    assert_eq!(neighbors.len(), 1);
    assert_eq!(neighbors[0].relationship, "calls");

    let (va, _) = dst.get_vector(&other_project, a.id, STUB_MODEL).await.unwrap().unwrap();
    assert_eq!(va, vec![0.1, 0.2, 0.3, 0.4]);
    let (vb, _) = dst.get_vector(&other_project, b.id, STUB_MODEL).await.unwrap().unwrap();
    assert_eq!(vb, vec![0.5, 0.6, 0.7, 0.8]);

    let decisions = dst.search_decisions(&other_project, "RRF", 10).await.unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].description, "use RRF for fusion");
}

#[tokio::test]
async fn import_refuses_newer_schema_version() {
    let (_dir, pool) = test_pool().await;
    let project = ProjectHandle::new("future");

    let json = serde_json::json!({
        "schema_version": i64::MAX,
        "exported_at": "2026-01-01T00:00:00Z",
        "entities": [],
        "relationships": [],
        "vectors": [],
        "sessions": [],
        "messages": [],
        "decisions": [],
    });
    let bytes = serde_json::to_vec(&json).unwrap();
    use std::io::Write;
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&bytes).unwrap();
    let bundle = encoder.finish().unwrap();

    let err = kb::import_kb(&pool, &project, &bundle).await.unwrap_err();
    assert_eq!(err.code(), "schema_error");
}
