//! SQLite integration tests: schema, repository semantics, and the engine
//! scenarios driven against the real store.

use std::sync::Arc;

use database::SqliteStore;
use item_core::{
    batch::advance_items,
    engine::{TransitionEngine, TransitionRequest},
    error::WorkItemError,
    models::{NewRoleTransition, WorkItem, WorkItemFilter},
    repository::{
        DependencyRepository, NoteRepository, TransitionRepository, WorkItemRepository,
    },
    roles::{Priority, Role, Trigger},
    schema::{NoOpNoteSchemaService, NoteRequirement, StaticNoteSchemaService},
    tree::{complete_tree, TreeSelection},
    NoteUpsert,
};
use mocks::{blocks, WorkItemBuilder};

async fn store() -> Arc<SqliteStore> {
    let store = SqliteStore::new(":memory:").await.unwrap();
    store.migrate().await.unwrap();
    Arc::new(store)
}

fn engine_for(store: Arc<SqliteStore>) -> TransitionEngine<SqliteStore> {
    TransitionEngine::new(store, Arc::new(NoOpNoteSchemaService))
}

async fn seed(store: &SqliteStore, items: &[WorkItem]) {
    for item in items {
        store.insert_item(item.clone()).await.unwrap();
    }
}

#[tokio::test]
async fn insert_and_get_round_trip() {
    let store = store().await;
    let item = WorkItemBuilder::new("persist me")
        .priority(Priority::High)
        .complexity(7)
        .tags("feature-task,infra")
        .summary("short summary")
        .build();
    let mut item = item;
    item.metadata = Some(serde_json::json!({"sprint": 14}));
    store.insert_item(item.clone()).await.unwrap();

    let loaded = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(loaded, item);
}

#[tokio::test]
async fn missing_item_reads_as_none() {
    let store = store().await;
    assert!(store.get_item(uuid::Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn scenario_a_linear_chain_on_sqlite() {
    let store = store().await;
    let a = WorkItemBuilder::new("A").build();
    let b = WorkItemBuilder::new("B").build();
    let c = WorkItemBuilder::new("C").build();
    seed(&store, &[a.clone(), b.clone(), c.clone()]).await;
    store.insert_dependency(blocks(&a, &b, None)).await.unwrap();
    store.insert_dependency(blocks(&b, &c, None)).await.unwrap();
    let engine = engine_for(store.clone());

    let report = advance_items(&engine, &[TransitionRequest::new(b.id, Trigger::Start)]).await;
    assert_eq!(
        report.results[0].error_code.as_deref(),
        Some("BLOCKED_BY_DEPENDENCY")
    );

    let report = advance_items(&engine, &[TransitionRequest::new(a.id, Trigger::Start)]).await;
    assert!(report.results[0].applied);
    assert!(report.all_unblocked_items.is_empty());

    let report = advance_items(&engine, &[TransitionRequest::new(a.id, Trigger::Complete)]).await;
    assert_eq!(report.all_unblocked_items[0].item_id, b.id);

    let report = advance_items(&engine, &[TransitionRequest::new(b.id, Trigger::Complete)]).await;
    assert_eq!(report.all_unblocked_items[0].item_id, c.id);
}

#[tokio::test]
async fn scenario_b_cascade_on_sqlite() {
    let store = store().await;
    let g = WorkItemBuilder::new("G").role(Role::Work).build();
    let p = WorkItemBuilder::new("P").role(Role::Work).child_of(&g).build();
    let c1 = WorkItemBuilder::new("C1").role(Role::Work).child_of(&p).build();
    let c2 = WorkItemBuilder::new("C2").role(Role::Work).child_of(&p).build();
    seed(&store, &[g.clone(), p.clone(), c1.clone(), c2.clone()]).await;
    let engine = engine_for(store.clone());

    let report = advance_items(&engine, &[TransitionRequest::new(c1.id, Trigger::Complete)]).await;
    assert!(report.results[0].cascade_events.is_empty());

    let report = advance_items(&engine, &[TransitionRequest::new(c2.id, Trigger::Complete)]).await;
    let events = &report.results[0].cascade_events;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].item_id, p.id);
    assert_eq!(events[1].item_id, g.id);
    assert_eq!(store.get_item(g.id).await.unwrap().unwrap().role, Role::Terminal);

    // Each cascaded parent carries its own audit record.
    let audits = store.transitions_for(g.id).await.unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].trigger, "cascade");
    assert_eq!(audits[0].from_role, Role::Work);
}

#[tokio::test]
async fn block_resume_round_trip_on_sqlite() {
    let store = store().await;
    let a = WorkItemBuilder::new("A").role(Role::Work).build();
    seed(&store, &[a.clone()]).await;
    let engine = engine_for(store.clone());

    advance_items(&engine, &[TransitionRequest::new(a.id, Trigger::Hold)]).await;
    let parked = store.get_item(a.id).await.unwrap().unwrap();
    assert_eq!(parked.role, Role::Blocked);
    assert_eq!(parked.previous_role, Some(Role::Work));

    advance_items(&engine, &[TransitionRequest::new(a.id, Trigger::Resume)]).await;
    let resumed = store.get_item(a.id).await.unwrap().unwrap();
    assert_eq!(resumed.role, Role::Work);
    assert_eq!(resumed.previous_role, None);

    let audits = store.transitions_for(a.id).await.unwrap();
    let triggers: Vec<&str> = audits.iter().map(|t| t.trigger.as_str()).collect();
    // The audit keeps the caller's spelling of the alias pair.
    assert_eq!(triggers, vec!["hold", "resume"]);
}

#[tokio::test]
async fn scenario_f_complete_tree_on_sqlite() {
    let store = store().await;
    let a = WorkItemBuilder::new("A").build();
    let b = WorkItemBuilder::new("B").tags("gated").build();
    let c = WorkItemBuilder::new("C").build();
    seed(&store, &[a.clone(), b.clone(), c.clone()]).await;
    store.insert_dependency(blocks(&a, &b, None)).await.unwrap();
    store.insert_dependency(blocks(&b, &c, None)).await.unwrap();

    let schema = StaticNoteSchemaService::default().with_tag(
        "gated",
        vec![NoteRequirement {
            key: "handoff".to_string(),
            role: Role::Queue,
            required: true,
            description: None,
        }],
    );
    let engine = TransitionEngine::new(store.clone(), Arc::new(schema));

    let report = complete_tree(
        &engine,
        TreeSelection::Items(vec![a.id, b.id, c.id]),
        Trigger::Complete,
    )
    .await
    .unwrap();
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.completed, 1);
    assert_eq!(report.summary.gate_failures, 1);
    assert_eq!(report.summary.skipped, 1);
}

#[tokio::test]
async fn delete_cascades_to_owned_rows() {
    let store = store().await;
    let a = WorkItemBuilder::new("A").build();
    let b = WorkItemBuilder::new("B").build();
    seed(&store, &[a.clone(), b.clone()]).await;
    store.insert_dependency(blocks(&a, &b, None)).await.unwrap();
    store
        .upsert_note(NoteUpsert {
            item_id: a.id,
            key: "context".to_string(),
            role: Role::Queue,
            body: "background".to_string(),
        })
        .await
        .unwrap();
    let engine = engine_for(store.clone());
    advance_items(&engine, &[TransitionRequest::new(a.id, Trigger::Start)]).await;

    store.delete_item(a.id).await.unwrap();

    assert!(store.get_item(a.id).await.unwrap().is_none());
    assert!(store.get_note(a.id, "context").await.unwrap().is_none());
    assert!(store.transitions_for(a.id).await.unwrap().is_empty());
    // The edge went with its endpoint; B is unblocked.
    assert!(store.incoming_blocking(b.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn apply_transition_rejects_stale_snapshots() {
    let store = store().await;
    let a = WorkItemBuilder::new("A").build();
    seed(&store, &[a.clone()]).await;

    let mut moved = a.clone();
    moved.role = Role::Work;
    moved.modified_at = a.next_modified_at();
    let audit = NewRoleTransition {
        item_id: a.id,
        from_role: Role::Queue,
        to_role: Role::Work,
        from_status_label: None,
        to_status_label: None,
        trigger: "start".to_string(),
        summary: None,
        transitioned_at: moved.modified_at,
    };
    store.apply_transition(&moved, audit.clone()).await.unwrap();

    // Replaying the same expectation must conflict, and write nothing.
    let result = store.apply_transition(&moved, audit).await;
    assert!(matches!(result, Err(WorkItemError::Conflict(_))));
    assert_eq!(store.transitions_for(a.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_dependency_is_rejected() {
    let store = store().await;
    let a = WorkItemBuilder::new("A").build();
    let b = WorkItemBuilder::new("B").build();
    seed(&store, &[a.clone(), b.clone()]).await;

    store.insert_dependency(blocks(&a, &b, None)).await.unwrap();
    let result = store.insert_dependency(blocks(&a, &b, None)).await;
    assert!(matches!(
        result,
        Err(WorkItemError::DuplicateDependency(_))
    ));
}

#[tokio::test]
async fn note_upsert_updates_in_place() {
    let store = store().await;
    let a = WorkItemBuilder::new("A").build();
    seed(&store, &[a.clone()]).await;

    let first = store
        .upsert_note(NoteUpsert {
            item_id: a.id,
            key: "acceptance-criteria".to_string(),
            role: Role::Queue,
            body: "v1".to_string(),
        })
        .await
        .unwrap();
    let second = store
        .upsert_note(NoteUpsert {
            item_id: a.id,
            key: "acceptance-criteria".to_string(),
            role: Role::Queue,
            body: "v2".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.body, "v2");
    assert_eq!(store.notes_for(a.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn descendants_and_role_counts() {
    let store = store().await;
    let root = WorkItemBuilder::new("root").build();
    let child = WorkItemBuilder::new("child").child_of(&root).build();
    let grandchild = WorkItemBuilder::new("grandchild")
        .role(Role::Work)
        .child_of(&child)
        .build();
    seed(&store, &[root.clone(), child.clone(), grandchild.clone()]).await;

    let descendants = store.descendants_of(root.id).await.unwrap();
    let ids: Vec<_> = descendants.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![child.id, grandchild.id]);

    let counts = store.children_role_counts(child.id).await.unwrap();
    assert_eq!(counts.get(&Role::Work), Some(&1));
    assert_eq!(counts.values().sum::<u64>(), 1);
}

#[tokio::test]
async fn list_items_filters_compose() {
    let store = store().await;
    let root = WorkItemBuilder::new("root").build();
    let tagged = WorkItemBuilder::new("tagged")
        .child_of(&root)
        .priority(Priority::High)
        .tags("feature-task")
        .build();
    let other = WorkItemBuilder::new("other").child_of(&root).build();
    seed(&store, &[root.clone(), tagged.clone(), other.clone()]).await;

    let filter = WorkItemFilter {
        parent_id: Some(root.id),
        priority: Some(Priority::High),
        tag: Some("feature-task".to_string()),
        ..Default::default()
    };
    let found = store.list_items(filter).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, tagged.id);
}

#[tokio::test]
async fn transitions_since_orders_newest_first() {
    let store = store().await;
    let a = WorkItemBuilder::new("A").build();
    seed(&store, &[a.clone()]).await;
    let engine = engine_for(store.clone());
    let before = chrono::Utc::now() - chrono::Duration::seconds(5);

    advance_items(&engine, &[TransitionRequest::new(a.id, Trigger::Start)]).await;
    advance_items(&engine, &[TransitionRequest::new(a.id, Trigger::Complete)]).await;

    let recent = store.transitions_since(before, 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].to_role, Role::Terminal);
    assert_eq!(recent[1].to_role, Role::Work);

    let capped = store.transitions_since(before, 1).await.unwrap();
    assert_eq!(capped.len(), 1);
}

#[tokio::test]
async fn complexity_check_constraint_holds() {
    let store = store().await;
    let mut item = WorkItemBuilder::new("bad").build();
    item.complexity = 11;
    let result = store.insert_item(item).await;
    assert!(matches!(result, Err(WorkItemError::Database(_))));
}
