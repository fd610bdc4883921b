//! Handler and envelope tests over the in-memory store.

use std::sync::Arc;

use serde_json::{json, Value};

use item_core::{
    repository::WorkItemRepository,
    roles::Role,
    schema::NoOpNoteSchemaService,
};
use mcp_protocol::{McpError, McpItemHandler};
use mocks::{MemoryStore, WorkItemBuilder};

fn handler() -> (Arc<MemoryStore>, McpItemHandler<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let handler = McpItemHandler::new(store.clone(), Arc::new(NoOpNoteSchemaService));
    (store, handler)
}

async fn call(handler: &McpItemHandler<MemoryStore>, tool: &str, params: Value) -> Value {
    handler.dispatch_tool(tool, params).await.unwrap()
}

#[tokio::test]
async fn create_advance_and_query_through_tools() {
    let (_store, handler) = handler();

    let created = call(
        &handler,
        "manage_items",
        json!({"operation": "create", "items": [{"title": "wire the codec"}]}),
    )
    .await;
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["created"], 1);
    let id = created["data"]["items"][0]["id"].as_str().unwrap().to_string();

    let advanced = call(
        &handler,
        "advance_item",
        json!({"transitions": [{"itemId": id, "trigger": "start"}]}),
    )
    .await;
    assert_eq!(advanced["success"], true);
    assert_eq!(advanced["data"]["summary"]["succeeded"], 1);
    assert_eq!(advanced["data"]["results"][0]["newRole"], "work");

    let queried = call(&handler, "query_items", json!({"id": id})).await;
    assert_eq!(queried["data"]["items"][0]["role"], "work");
}

#[tokio::test]
async fn unknown_trigger_aborts_the_whole_call() {
    let (store, handler) = handler();
    let a = WorkItemBuilder::new("A").build();
    store.insert_item(a.clone()).await.unwrap();

    let envelope = call(
        &handler,
        "advance_item",
        json!({"transitions": [
            {"itemId": a.id, "trigger": "start"},
            {"itemId": a.id, "trigger": "finish"}
        ]}),
    )
    .await;
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["error"]["code"], "INVALID_TRIGGER");

    // The valid first entry must not have run.
    assert_eq!(store.get_item(a.id).await.unwrap().unwrap().role, Role::Queue);
}

#[tokio::test]
async fn parameter_shape_errors_become_validation_envelopes() {
    let (_store, handler) = handler();

    let envelope = call(
        &handler,
        "advance_item",
        json!({"transitions": [{"itemId": "not-a-uuid", "trigger": "start"}]}),
    )
    .await;
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["error"]["code"], "VALIDATION");
}

#[tokio::test]
async fn unknown_tool_is_a_protocol_error() {
    let (_store, handler) = handler();
    let result = handler.dispatch_tool("drop_tables", json!({})).await;
    assert!(matches!(result, Err(McpError::Protocol(_))));
}

#[tokio::test]
async fn manage_items_isolates_entry_failures() {
    let (_store, handler) = handler();

    let envelope = call(
        &handler,
        "manage_items",
        json!({"operation": "create", "items": [
            {"title": "good"},
            {"title": ""},
            {"title": "also good", "complexity": 3}
        ]}),
    )
    .await;
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["data"]["created"], 2);
    assert_eq!(envelope["data"]["failed"], 1);
    assert_eq!(envelope["data"]["failures"][0]["index"], 1);
    assert_eq!(envelope["data"]["failures"][0]["code"], "VALIDATION");
}

#[tokio::test]
async fn depth_boundary_is_enforced_on_create() {
    let (_store, handler) = handler();

    // Build a chain down to depth 3, which is allowed.
    let mut parent_id: Option<String> = None;
    for depth in 0..=3 {
        let mut spec = json!({"title": format!("level {depth}")});
        if let Some(ref parent) = parent_id {
            spec["parentId"] = json!(parent);
        }
        let envelope = call(
            &handler,
            "manage_items",
            json!({"operation": "create", "items": [spec]}),
        )
        .await;
        assert_eq!(envelope["data"]["created"], 1, "depth {depth} should create");
        parent_id = Some(
            envelope["data"]["items"][0]["id"]
                .as_str()
                .unwrap()
                .to_string(),
        );
    }

    // Depth 4 is rejected.
    let envelope = call(
        &handler,
        "manage_items",
        json!({"operation": "create", "items": [
            {"title": "too deep", "parentId": parent_id.unwrap()}
        ]}),
    )
    .await;
    assert_eq!(envelope["data"]["failed"], 1);
    assert_eq!(envelope["data"]["failures"][0]["code"], "VALIDATION");
}

#[tokio::test]
async fn reparenting_rejects_self_and_descendants() {
    let (store, handler) = handler();
    let root = WorkItemBuilder::new("root").build();
    let child = WorkItemBuilder::new("child").child_of(&root).build();
    store.insert_item(root.clone()).await.unwrap();
    store.insert_item(child.clone()).await.unwrap();

    let envelope = call(
        &handler,
        "manage_items",
        json!({"operation": "update", "updates": [{"id": root.id, "parentId": root.id}]}),
    )
    .await;
    assert_eq!(envelope["data"]["failures"][0]["code"], "VALIDATION");

    let envelope = call(
        &handler,
        "manage_items",
        json!({"operation": "update", "updates": [{"id": root.id, "parentId": child.id}]}),
    )
    .await;
    assert_eq!(envelope["data"]["failures"][0]["code"], "VALIDATION");
}

#[tokio::test]
async fn reparenting_recomputes_descendant_depths() {
    let (store, handler) = handler();
    let old_root = WorkItemBuilder::new("old root").build();
    let moved = WorkItemBuilder::new("moved").child_of(&old_root).build();
    let leaf = WorkItemBuilder::new("leaf").child_of(&moved).build();
    for item in [&old_root, &moved, &leaf] {
        store.insert_item(item.clone()).await.unwrap();
    }

    let envelope = call(
        &handler,
        "manage_items",
        json!({"operation": "update", "updates": [{"id": moved.id, "parentId": null}]}),
    )
    .await;
    assert_eq!(envelope["data"]["updated"], 1);

    assert_eq!(store.get_item(moved.id).await.unwrap().unwrap().depth, 0);
    assert_eq!(store.get_item(leaf.id).await.unwrap().unwrap().depth, 1);
}

#[tokio::test]
async fn dependency_management_guards_the_graph() {
    let (store, handler) = handler();
    let a = WorkItemBuilder::new("A").build();
    let b = WorkItemBuilder::new("B").build();
    store.insert_item(a.clone()).await.unwrap();
    store.insert_item(b.clone()).await.unwrap();

    let envelope = call(
        &handler,
        "manage_dependencies",
        json!({"operation": "create", "dependency":
            {"fromItemId": a.id, "toItemId": a.id, "type": "BLOCKS"}}),
    )
    .await;
    assert_eq!(envelope["error"]["code"], "SELF_DEPENDENCY");

    let envelope = call(
        &handler,
        "manage_dependencies",
        json!({"operation": "create", "dependency":
            {"fromItemId": a.id, "toItemId": b.id, "type": "BLOCKS"}}),
    )
    .await;
    assert_eq!(envelope["success"], true);

    // The reverse blocking edge would close a cycle.
    let envelope = call(
        &handler,
        "manage_dependencies",
        json!({"operation": "create", "dependency":
            {"fromItemId": b.id, "toItemId": a.id, "type": "BLOCKS"}}),
    )
    .await;
    assert_eq!(envelope["error"]["code"], "CYCLIC_DEPENDENCY");

    // So would the IS_BLOCKED_BY spelling of the edge that already exists.
    let envelope = call(
        &handler,
        "manage_dependencies",
        json!({"operation": "create", "dependency":
            {"fromItemId": a.id, "toItemId": b.id, "type": "IS_BLOCKED_BY"}}),
    )
    .await;
    assert_eq!(envelope["error"]["code"], "CYCLIC_DEPENDENCY");

    let envelope = call(
        &handler,
        "manage_dependencies",
        json!({"operation": "create", "dependency":
            {"fromItemId": a.id, "toItemId": b.id, "type": "BLOCKS"}}),
    )
    .await;
    assert_eq!(envelope["error"]["code"], "DUPLICATE_DEPENDENCY");
}

#[tokio::test]
async fn notes_round_trip_through_tools() {
    let (store, handler) = handler();
    let a = WorkItemBuilder::new("A").build();
    store.insert_item(a.clone()).await.unwrap();

    let envelope = call(
        &handler,
        "manage_notes",
        json!({"operation": "upsert", "note":
            {"itemId": a.id, "key": "acceptance-criteria", "role": "queue", "body": "list"}}),
    )
    .await;
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["data"]["note"]["key"], "acceptance-criteria");

    let envelope = call(&handler, "query_notes", json!({"itemId": a.id})).await;
    assert_eq!(envelope["data"]["total"], 1);

    let envelope = call(
        &handler,
        "manage_notes",
        json!({"operation": "delete", "itemId": a.id, "key": "acceptance-criteria"}),
    )
    .await;
    assert_eq!(envelope["data"]["deleted"], true);

    let envelope = call(&handler, "query_notes", json!({"itemId": a.id})).await;
    assert_eq!(envelope["data"]["total"], 0);
}

#[tokio::test]
async fn context_modes_are_exclusive() {
    let (store, handler) = handler();
    let a = WorkItemBuilder::new("A").build();
    store.insert_item(a.clone()).await.unwrap();

    let envelope = call(&handler, "get_context", json!({"itemId": a.id})).await;
    assert_eq!(envelope["data"]["mode"], "item");
    assert_eq!(envelope["data"]["item"]["id"], json!(a.id));

    let envelope = call(
        &handler,
        "get_context",
        json!({"since": chrono::Utc::now().to_rfc3339()}),
    )
    .await;
    assert_eq!(envelope["data"]["mode"], "sessionResume");

    let envelope = call(&handler, "get_context", json!({})).await;
    assert_eq!(envelope["data"]["mode"], "healthCheck");

    let envelope = call(
        &handler,
        "get_context",
        json!({"itemId": a.id, "since": chrono::Utc::now().to_rfc3339()}),
    )
    .await;
    assert_eq!(envelope["error"]["code"], "VALIDATION");
}

#[tokio::test]
async fn health_check_reports_store_failures() {
    let (store, handler) = handler();

    let envelope = call(&handler, "health_check", json!({})).await;
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["data"]["database"], true);

    store.inject_error(item_core::WorkItemError::Database("down".into()));
    let envelope = call(&handler, "health_check", json!({})).await;
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["error"]["code"], "DATABASE");
}

#[tokio::test]
async fn query_items_not_found_by_id() {
    let (_store, handler) = handler();
    let envelope = call(
        &handler,
        "query_items",
        json!({"id": uuid::Uuid::new_v4()}),
    )
    .await;
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["error"]["code"], "NOT_FOUND");
}
