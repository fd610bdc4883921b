use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    advisory::{BlockedItemInfo, ContextReport, NextStatus},
    batch::AdvanceReport,
    error::Result,
    models::{Dependency, NewDependency, NewWorkItem, Note, NoteUpsert, UpdateWorkItem, WorkItem},
    roles::{Priority, Role},
    tree::TreeReport,
};

/// Handler trait behind the MCP tool surface.
///
/// Each method corresponds to one tool; the transports deserialize
/// parameters into the typed structs below, call the handler, and format
/// the result into the `{success, data?, error?}` envelope. Parameter
/// validation failures abort the whole call before any state mutation;
/// per-entry failures inside a batch surface in the result payload.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Apply a batch of transitions in submitted order.
    async fn advance_item(&self, params: AdvanceItemParams) -> Result<AdvanceReport>;

    /// Bulk-advance a subtree or explicit set with dependency-aware skipping.
    async fn complete_tree(&self, params: CompleteTreeParams) -> Result<TreeReport>;

    /// Enumerate blocked items with their blocker chains.
    async fn get_blocked_items(&self, params: GetBlockedItemsParams) -> Result<BlockedItemsReport>;

    /// Recommend unblocked, non-terminal items to pick up next.
    async fn get_next_item(&self, params: GetNextItemParams) -> Result<NextItemReport>;

    /// Compute readiness and the next trigger for one item.
    async fn get_next_status(&self, params: GetNextStatusParams) -> Result<NextStatus>;

    /// Item, session-resume or health-check context.
    async fn get_context(&self, params: GetContextParams) -> Result<ContextReport>;

    /// Create, update or delete work items.
    async fn manage_items(&self, params: ManageItemsParams) -> Result<ManageItemsReport>;

    /// Create or delete dependency edges.
    async fn manage_dependencies(
        &self,
        params: ManageDependenciesParams,
    ) -> Result<ManageDependenciesReport>;

    /// Upsert or delete notes.
    async fn manage_notes(&self, params: ManageNotesParams) -> Result<ManageNotesReport>;

    /// Fetch or list work items.
    async fn query_items(&self, params: QueryItemsParams) -> Result<QueryItemsReport>;

    /// List notes of an item.
    async fn query_notes(&self, params: QueryNotesParams) -> Result<QueryNotesReport>;

    /// Server and store health.
    async fn health_check(&self) -> Result<HealthStatus>;
}

/// One transition entry as submitted on the wire. The trigger arrives as a
/// string and is parsed up front so an unknown trigger aborts the whole
/// call as a validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionSpec {
    pub item_id: Uuid,
    pub trigger: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status_label: Option<String>,
    #[serde(default)]
    pub apply_cascade: Option<bool>,
}

/// Parameters of `advance_item`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceItemParams {
    pub transitions: Vec<TransitionSpec>,
}

/// Parameters of `complete_tree`; exactly one of `root_id` / `item_ids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTreeParams {
    #[serde(default)]
    pub root_id: Option<Uuid>,
    #[serde(default)]
    pub item_ids: Option<Vec<Uuid>>,
    pub trigger: String,
}

/// Parameters of `get_blocked_items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBlockedItemsParams {
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub include_item_details: Option<bool>,
    #[serde(default)]
    pub include_ancestors: Option<bool>,
}

/// Parameters of `get_next_item`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNextItemParams {
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Parameters of `get_next_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetNextStatusParams {
    pub item_id: Uuid,
}

/// Parameters of `get_context`; the populated field selects the mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetContextParams {
    #[serde(default)]
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

/// `manage_items` operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemOperation {
    Create,
    Update,
    Delete,
}

/// One update entry: target id plus the partial update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemUpdateSpec {
    pub id: Uuid,
    #[serde(flatten)]
    pub update: UpdateWorkItem,
}

/// Parameters of `manage_items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageItemsParams {
    pub operation: ItemOperation,
    /// Creation inputs for `create`
    #[serde(default)]
    pub items: Option<Vec<NewWorkItem>>,
    /// Update entries for `update`
    #[serde(default)]
    pub updates: Option<Vec<ItemUpdateSpec>>,
    /// Target ids for `delete`
    #[serde(default)]
    pub ids: Option<Vec<Uuid>>,
    /// Delete whole subtrees instead of rejecting items with children
    #[serde(default)]
    pub cascade: Option<bool>,
}

/// One failed entry in a batched manage operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFailure {
    /// Position in the submitted batch
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub error: String,
    pub code: String,
}

/// Result of `manage_items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageItemsReport {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<WorkItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<Uuid>,
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub failed: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<OperationFailure>,
}

/// `manage_dependencies` operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DependencyOperation {
    Create,
    CreateBatch,
    Delete,
}

/// Parameters of `manage_dependencies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageDependenciesParams {
    pub operation: DependencyOperation,
    /// Edge input for `create`
    #[serde(default)]
    pub dependency: Option<NewDependency>,
    /// Edge inputs for `createBatch`
    #[serde(default)]
    pub dependencies: Option<Vec<NewDependency>>,
    /// Target id for `delete`
    #[serde(default)]
    pub id: Option<Uuid>,
}

/// Result of `manage_dependencies`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageDependenciesReport {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    pub created: u32,
    pub deleted: u32,
    pub failed: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<OperationFailure>,
}

/// `manage_notes` operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoteOperation {
    Upsert,
    Delete,
}

/// Parameters of `manage_notes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageNotesParams {
    pub operation: NoteOperation,
    /// Upsert input
    #[serde(default)]
    pub note: Option<NoteUpsert>,
    /// Target for `delete`
    #[serde(default)]
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub key: Option<String>,
}

/// Result of `manage_notes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageNotesReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<Note>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

/// Parameters of `query_items`; `id` fetches one, the rest filter a list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryItemsParams {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// Result of `query_items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryItemsReport {
    pub items: Vec<WorkItem>,
    pub total: u32,
}

/// Parameters of `query_notes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryNotesParams {
    pub item_id: Uuid,
    #[serde(default)]
    pub key: Option<String>,
}

/// Result of `query_notes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryNotesReport {
    pub notes: Vec<Note>,
    pub total: u32,
}

/// Result of `get_blocked_items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedItemsReport {
    pub blocked_items: Vec<BlockedItemInfo>,
    pub total: u32,
}

/// Result of `get_next_item`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextItemReport {
    pub recommendations: Vec<WorkItem>,
}

/// Health report for the `health_check` tool and HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub database: bool,
    pub protocol: bool,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}
