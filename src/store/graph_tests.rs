//! Unit tests for the graph store: CRUD, symmetry, BFS, and the work
//! queue.

use super::*;
use crate::config::StoreConfig;
use crate::store::graph::EntityFilter;

fn test_config(root: &std::path::Path) -> StoreConfig {
    StoreConfig::new(root)
}

async fn open_store() -> (tempfile::TempDir, GraphStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = GraphStore::open(&test_config(dir.path())).await.expect("store");
    (dir, store)
}

fn entity(id: &str) -> EntityNode {
    EntityNode::new(id, EntityType::Service, format!("src/{}.ts", id))
}

// ============================================================================
// Entity Tests
// ============================================================================

#[tokio::test]
async fn test_same_id_last_write_wins() {
    let (_dir, store) = open_store().await;

    store.add_entity(entity("svc").with_priority(2)).await.unwrap();
    store.add_entity(entity("svc").with_priority(4)).await.unwrap();

    let all = store.get_all_entities(&EntityFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1, "no duplicate ids in getAllEntities");
    assert_eq!(all[0].priority, 4, "later write wins");
}

#[tokio::test]
async fn test_update_entity_requires_existing() {
    let (_dir, store) = open_store().await;
    let err = store.update_entity(entity("ghost")).await.unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
}

#[tokio::test]
async fn test_entity_filter() {
    let (_dir, store) = open_store().await;
    store
        .add_entity(EntityNode::new("c1", EntityType::Controller, "c1.ts").with_priority(1))
        .await
        .unwrap();
    let mut processed = entity("s1");
    processed.processed = true;
    store.add_entity(processed).await.unwrap();

    let controllers = store
        .get_all_entities(&EntityFilter::default().with_type(EntityType::Controller))
        .await
        .unwrap();
    assert_eq!(controllers.len(), 1);
    assert_eq!(controllers[0].id, "c1");

    let unprocessed = store
        .get_all_entities(&EntityFilter::default().with_processed(false))
        .await
        .unwrap();
    assert_eq!(unprocessed.len(), 1);
    assert_eq!(unprocessed[0].id, "c1");
}

#[tokio::test]
async fn test_invalid_priority_rejected() {
    let (_dir, store) = open_store().await;
    let mut bad = entity("e");
    bad.priority = 0;
    let err = store.add_entity(bad).await.unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
}

// ============================================================================
// Relationship Tests
// ============================================================================

#[tokio::test]
async fn test_relationship_updates_both_endpoints() {
    let (_dir, store) = open_store().await;
    store.add_entity(entity("a")).await.unwrap();
    store.add_entity(entity("b")).await.unwrap();

    store
        .add_relationship(RelationshipEdge::new("a", "b", RelationshipType::DependsOn))
        .await
        .unwrap();

    let a = store.get_entity("a").await.unwrap().unwrap();
    let b = store.get_entity("b").await.unwrap().unwrap();
    assert!(a.dependents.contains(&"b".to_string()));
    assert!(b.dependencies.contains(&"a".to_string()));
}

#[tokio::test]
async fn test_dependency_lists_stay_duplicate_free() {
    let (_dir, store) = open_store().await;
    store.add_entity(entity("a")).await.unwrap();
    store.add_entity(entity("b")).await.unwrap();

    store
        .add_relationship(RelationshipEdge::new("a", "b", RelationshipType::Uses))
        .await
        .unwrap();
    store
        .add_relationship(RelationshipEdge::new("a", "b", RelationshipType::Calls))
        .await
        .unwrap();

    let a = store.get_entity("a").await.unwrap().unwrap();
    assert_eq!(a.dependents, vec!["b".to_string()]);
}

#[tokio::test]
async fn test_relationship_with_missing_endpoint_persists_edge_only() {
    let (_dir, store) = open_store().await;
    store.add_entity(entity("a")).await.unwrap();

    store
        .add_relationship(RelationshipEdge::new("a", "ghost", RelationshipType::Uses))
        .await
        .unwrap();

    let a = store.get_entity("a").await.unwrap().unwrap();
    assert!(a.dependents.is_empty(), "no list update without both endpoints");
    assert_eq!(store.get_all_relationships().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_relationships_by_entity_and_type() {
    let (_dir, store) = open_store().await;
    for id in ["a", "b", "c"] {
        store.add_entity(entity(id)).await.unwrap();
    }
    store
        .add_relationship(RelationshipEdge::new("a", "b", RelationshipType::Uses))
        .await
        .unwrap();
    store
        .add_relationship(RelationshipEdge::new("c", "a", RelationshipType::Calls))
        .await
        .unwrap();
    store
        .add_relationship(RelationshipEdge::new("b", "c", RelationshipType::Calls))
        .await
        .unwrap();

    let touching_a = store.get_relationships("a", None).await.unwrap();
    assert_eq!(touching_a.len(), 2);

    let calls_a = store
        .get_relationships("a", Some(RelationshipType::Calls))
        .await
        .unwrap();
    assert_eq!(calls_a.len(), 1);
    assert_eq!(calls_a[0].from_entity, "c");
}

// ============================================================================
// BFS Tests
// ============================================================================

#[tokio::test]
async fn test_find_path_shortest() {
    let (_dir, store) = open_store().await;
    for id in ["a", "b", "c", "d"] {
        store.add_entity(entity(id)).await.unwrap();
    }
    // Edges: A-B, B-C, A-D, D-C. Shortest A→C has 2 hops.
    for (from, to) in [("a", "b"), ("b", "c"), ("a", "d"), ("d", "c")] {
        store
            .add_relationship(RelationshipEdge::new(from, to, RelationshipType::Uses))
            .await
            .unwrap();
    }

    let path = store.find_path("a", "c").await.unwrap();
    assert_eq!(path.len(), 3, "shortest path has 2 hops: {:?}", path);
    assert_eq!(path.first().map(String::as_str), Some("a"));
    assert_eq!(path.last().map(String::as_str), Some("c"));
}

#[tokio::test]
async fn test_find_path_self() {
    let (_dir, store) = open_store().await;
    let path = store.find_path("a", "a").await.unwrap();
    assert_eq!(path, vec!["a".to_string()]);
}

#[tokio::test]
async fn test_find_path_unreachable() {
    let (_dir, store) = open_store().await;
    for id in ["a", "b", "z"] {
        store.add_entity(entity(id)).await.unwrap();
    }
    store
        .add_relationship(RelationshipEdge::new("a", "b", RelationshipType::Uses))
        .await
        .unwrap();

    let path = store.find_path("a", "z").await.unwrap();
    assert!(path.is_empty());
}

#[tokio::test]
async fn test_find_path_treats_edges_as_undirected() {
    let (_dir, store) = open_store().await;
    for id in ["a", "b"] {
        store.add_entity(entity(id)).await.unwrap();
    }
    store
        .add_relationship(RelationshipEdge::new("b", "a", RelationshipType::Calls))
        .await
        .unwrap();

    let path = store.find_path("a", "b").await.unwrap();
    assert_eq!(path, vec!["a".to_string(), "b".to_string()]);
}

// ============================================================================
// Work Queue Tests
// ============================================================================

#[tokio::test]
async fn test_queue_orders_by_priority_then_fifo() {
    let (_dir, store) = open_store().await;
    for (id, priority) in [("w3", 3u8), ("w1", 1), ("w2", 2)] {
        let mut item = WorkItem::new("e1", TaskType::AnalyzeEntity).with_priority(priority);
        item.id = id.to_string();
        store.add_work_item(item).await.unwrap();
    }

    let first = store.next_work_item(None, None).await.unwrap().unwrap();
    let second = store.next_work_item(None, None).await.unwrap().unwrap();
    let third = store.next_work_item(None, None).await.unwrap().unwrap();
    assert_eq!(first.id, "w1");
    assert_eq!(second.id, "w2");
    assert_eq!(third.id, "w3");
    assert!(store.next_work_item(None, None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_dequeue_marks_assigned_and_persists() {
    let (_dir, store) = open_store().await;
    let item = WorkItem::new("e1", TaskType::MapRelationships);
    let id = item.id.clone();
    store.add_work_item(item).await.unwrap();

    let assigned = store.next_work_item(None, Some("agent-1")).await.unwrap().unwrap();
    assert_eq!(assigned.status, WorkItemStatus::Assigned);
    assert_eq!(assigned.assigned_to.as_deref(), Some("agent-1"));

    // Durable record reflects the assignment.
    let reloaded = store.get_work_items(None).await.unwrap();
    let persisted = reloaded.iter().find(|w| w.id == id).unwrap();
    assert_eq!(persisted.status, WorkItemStatus::Assigned);
}

#[tokio::test]
async fn test_dequeue_respects_priority_ceiling_and_affinity() {
    let (_dir, store) = open_store().await;
    let urgent_for_other = WorkItem::new("e1", TaskType::AnalyzeEntity)
        .with_priority(1)
        .with_assigned_to("agent-2");
    let normal = WorkItem::new("e2", TaskType::AnalyzeEntity).with_priority(4);
    let normal_id = normal.id.clone();
    store.add_work_item(urgent_for_other).await.unwrap();
    store.add_work_item(normal.clone()).await.unwrap();

    // agent-1 cannot take agent-2's item.
    let got = store.next_work_item(None, Some("agent-1")).await.unwrap().unwrap();
    assert_eq!(got.id, normal_id);

    // Ceiling of 3 excludes the remaining priority-4 item.
    store.add_work_item(WorkItem::new("e3", TaskType::AnalyzeEntity).with_priority(4)).await.unwrap();
    assert!(store.next_work_item(Some(3), None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_item_requeues_until_retries_exhausted() {
    let (_dir, store) = open_store().await;
    let item = WorkItem::new("e1", TaskType::AnalyzeEntity).with_max_retries(1);
    let id = item.id.clone();
    store.add_work_item(item).await.unwrap();

    let failed = store
        .update_work_item_status(&id, WorkItemStatus::Failed, Some("timeout".into()))
        .await
        .unwrap();
    assert_eq!(failed.status, WorkItemStatus::Pending, "first failure requeues");
    assert_eq!(failed.retry_count, 1);

    let failed = store
        .update_work_item_status(&id, WorkItemStatus::Failed, Some("timeout".into()))
        .await
        .unwrap();
    assert_eq!(failed.status, WorkItemStatus::Failed, "retries exhausted");
    assert!(failed.completed_at.is_some());
}

#[tokio::test]
async fn test_requeued_item_jumps_fresh_work_and_keeps_its_priority() {
    let (_dir, store) = open_store().await;
    let background = WorkItem::new("e1", TaskType::AnalyzeEntity).with_priority(4);
    let background_id = background.id.clone();
    store.add_work_item(background).await.unwrap();
    store.next_work_item(None, Some("agent-1")).await.unwrap().unwrap();

    store
        .add_work_item(WorkItem::new("e2", TaskType::AnalyzeEntity).with_priority(1))
        .await
        .unwrap();

    // The orphan outranks even urgent fresh work without losing its
    // own priority.
    let requeued = store.requeue_work_item(&background_id).await.unwrap();
    assert_eq!(requeued.priority, 4);
    assert!(requeued.requeued_at.is_some());

    let next = store.next_work_item(None, Some("agent-2")).await.unwrap().unwrap();
    assert_eq!(next.id, background_id);
    assert!(next.requeued_at.is_none(), "front-of-queue flag consumed");
    assert_eq!(next.priority, 4);
}

#[tokio::test]
async fn test_update_status_unknown_item() {
    let (_dir, store) = open_store().await;
    let err = store
        .update_work_item_status("nope", WorkItemStatus::Completed, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
}

// ============================================================================
// Cache Eviction vs Durability
// ============================================================================

#[tokio::test]
async fn test_evicted_entities_remain_durable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.entity_cache_size = 10;
    config.cleanup_buffer = 100;
    let store = GraphStore::open(&config).await.unwrap();

    for i in 0..25 {
        store.add_entity(entity(&format!("e{}", i))).await.unwrap();
    }

    // e0 was evicted from the cache but survives durably.
    let e0 = store.get_entity("e0").await.unwrap();
    assert!(e0.is_some());
    let all = store.get_all_entities(&EntityFilter::default()).await.unwrap();
    assert_eq!(all.len(), 25);
}

// ============================================================================
// Session and Checkpoint Tests
// ============================================================================

#[tokio::test]
async fn test_session_round_trip() {
    let (_dir, store) = open_store().await;
    let session = DiscoverySession::new("trace payment flow", "/repo");
    let id = session.id.clone();
    store.save_session(session).await.unwrap();

    let loaded = store.load_session(&id).await.unwrap().unwrap();
    assert_eq!(loaded.task_description, "trace payment flow");
    assert!(store.load_session("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_checkpoint_listing_and_pruning() {
    let (_dir, store) = open_store().await;
    let mut ids = Vec::new();
    for i in 0..4 {
        let mut cp = CheckpointData::new("sess-1", DiscoveryPhase::Analysis)
            .with_label(format!("cp {}", i));
        cp.created_at = Utc::now() + chrono::Duration::seconds(i);
        ids.push(cp.checkpoint_id.clone());
        store.save_checkpoint(cp).await.unwrap();
    }

    let listed = store.list_checkpoints("sess-1").await.unwrap();
    assert_eq!(listed.len(), 4);
    assert_eq!(listed[0].checkpoint_id, ids[0], "oldest first");

    let pruned = store.prune_checkpoints("sess-1", 2).await.unwrap();
    assert_eq!(pruned, 2);
    let remaining = store.list_checkpoints("sess-1").await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].checkpoint_id, ids[2]);

    let loaded = store.load_checkpoint("sess-1", &ids[3]).await.unwrap();
    assert!(loaded.is_some());
    assert!(store.load_checkpoint("sess-1", &ids[0]).await.unwrap().is_none());
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_scan_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = crate::cancel::CancelFlag::new();
    let store = GraphStore::open(&test_config(dir.path()))
        .await
        .unwrap()
        .with_cancel_flag(cancel.clone());
    store.add_entity(entity("a")).await.unwrap();

    cancel.cancel();
    let err = store
        .get_all_entities(&EntityFilter::default())
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}
