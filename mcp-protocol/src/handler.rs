//! MCP tool handler
//!
//! Wires the transition engine, entity managers and advisory computations
//! behind the `ProtocolHandler` trait, and routes named tool calls to it.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value;

use crate::error::McpError;
use crate::serialization::{deserialize_params, result_envelope};
use item_core::{
    advisory,
    batch::{advance_items, AdvanceReport},
    deps::DependencyManager,
    engine::{TransitionEngine, TransitionRequest},
    error::{Result, WorkItemError},
    items::ItemManager,
    notes::NoteManager,
    protocol::*,
    repository::OrchestratorStore,
    roles::Trigger,
    schema::NoteSchemaService,
    tree::{complete_tree, TreeReport, TreeSelection},
};

/// The tool names this handler serves, in the order `tools/list` reports
/// them.
pub const TOOL_NAMES: &[&str] = &[
    "advance_item",
    "complete_tree",
    "get_blocked_items",
    "get_next_item",
    "get_next_status",
    "get_context",
    "manage_items",
    "manage_dependencies",
    "manage_notes",
    "query_items",
    "query_notes",
    "health_check",
];

/// MCP handler over any orchestrator store.
pub struct McpItemHandler<S> {
    store: Arc<S>,
    engine: TransitionEngine<S>,
    items: ItemManager<S>,
    dependencies: DependencyManager<S>,
    notes: NoteManager<S>,
    stalled_after: Duration,
}

impl<S> Clone for McpItemHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            engine: self.engine.clone(),
            items: self.items.clone(),
            dependencies: self.dependencies.clone(),
            notes: self.notes.clone(),
            stalled_after: self.stalled_after,
        }
    }
}

impl<S: OrchestratorStore> McpItemHandler<S> {
    pub fn new(store: Arc<S>, schema: Arc<dyn NoteSchemaService>) -> Self {
        Self {
            engine: TransitionEngine::new(store.clone(), schema),
            items: ItemManager::new(store.clone()),
            dependencies: DependencyManager::new(store.clone()),
            notes: NoteManager::new(store.clone()),
            store,
            stalled_after: Duration::hours(advisory::DEFAULT_STALLED_AFTER_HOURS),
        }
    }

    /// Override the staleness window used by the health-check context.
    pub fn with_stalled_after(mut self, stalled_after: Duration) -> Self {
        self.stalled_after = stalled_after;
        self
    }

    /// Route a named tool call to its implementation and wrap the result
    /// in the `{success, data?, error?}` envelope. Unknown tools are a
    /// protocol error for the transport to report.
    pub async fn dispatch_tool(&self, tool: &str, params: Value) -> std::result::Result<Value, McpError> {
        match tool {
            "advance_item" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.advance_item(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "complete_tree" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.complete_tree(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "get_blocked_items" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.get_blocked_items(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "get_next_item" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.get_next_item(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "get_next_status" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.get_next_status(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "get_context" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.get_context(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "manage_items" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.manage_items(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "manage_dependencies" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.manage_dependencies(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "manage_notes" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.manage_notes(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "query_items" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.query_items(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "query_notes" => match deserialize_params(params) {
                Ok(p) => result_envelope(self.query_notes(p).await),
                Err(e) => result_envelope::<Value>(Err(e)),
            },
            "health_check" => result_envelope(self.health_check().await),
            _ => Err(McpError::Protocol(format!("unknown tool: {tool}"))),
        }
    }
}

#[async_trait]
impl<S: OrchestratorStore> ProtocolHandler for McpItemHandler<S> {
    async fn advance_item(&self, params: AdvanceItemParams) -> Result<AdvanceReport> {
        if params.transitions.is_empty() {
            return Err(WorkItemError::Validation(
                "transitions must not be empty".to_string(),
            ));
        }

        // Parse every trigger up front: a bad entry aborts the whole call
        // before any state mutation.
        let mut requests = Vec::with_capacity(params.transitions.len());
        for spec in params.transitions {
            let trigger = Trigger::from_str(&spec.trigger)?;
            requests.push(TransitionRequest {
                item_id: spec.item_id,
                trigger,
                summary: spec.summary,
                status_label: spec.status_label,
                apply_cascade: spec.apply_cascade.unwrap_or(true),
            });
        }

        Ok(advance_items(&self.engine, &requests).await)
    }

    async fn complete_tree(&self, params: CompleteTreeParams) -> Result<TreeReport> {
        let trigger = Trigger::from_str(&params.trigger)?;
        let selection = match (params.root_id, params.item_ids) {
            (Some(root_id), None) => TreeSelection::Root(root_id),
            (None, Some(item_ids)) if !item_ids.is_empty() => TreeSelection::Items(item_ids),
            (None, Some(_)) => {
                return Err(WorkItemError::Validation(
                    "itemIds must not be empty".to_string(),
                ))
            }
            _ => {
                return Err(WorkItemError::Validation(
                    "provide exactly one of rootId or itemIds".to_string(),
                ))
            }
        };
        complete_tree(&self.engine, selection, trigger).await
    }

    async fn get_blocked_items(&self, params: GetBlockedItemsParams) -> Result<BlockedItemsReport> {
        let blocked = advisory::blocked_items(
            self.store.as_ref(),
            params.parent_id,
            params.include_item_details.unwrap_or(false),
            params.include_ancestors.unwrap_or(false),
        )
        .await?;
        Ok(BlockedItemsReport {
            total: blocked.len() as u32,
            blocked_items: blocked,
        })
    }

    async fn get_next_item(&self, params: GetNextItemParams) -> Result<NextItemReport> {
        let recommendations = advisory::next_items(
            self.store.as_ref(),
            params.parent_id,
            params.priority,
            params.limit,
        )
        .await?;
        Ok(NextItemReport { recommendations })
    }

    async fn get_next_status(&self, params: GetNextStatusParams) -> Result<advisory::NextStatus> {
        advisory::next_status(self.store.as_ref(), params.item_id).await
    }

    async fn get_context(&self, params: GetContextParams) -> Result<advisory::ContextReport> {
        match (params.item_id, params.since) {
            (Some(_), Some(_)) => Err(WorkItemError::Validation(
                "provide at most one of itemId or since".to_string(),
            )),
            (Some(item_id), None) => {
                advisory::item_context(self.store.as_ref(), self.engine.schema().as_ref(), item_id)
                    .await
            }
            (None, Some(since)) => advisory::resume_context(self.store.as_ref(), since).await,
            (None, None) => {
                advisory::health_context(self.store.as_ref(), self.stalled_after).await
            }
        }
    }

    async fn manage_items(&self, params: ManageItemsParams) -> Result<ManageItemsReport> {
        let mut report = ManageItemsReport::default();
        match params.operation {
            ItemOperation::Create => {
                let items = params.items.ok_or_else(|| {
                    WorkItemError::Validation("create requires items".to_string())
                })?;
                for (index, new) in items.into_iter().enumerate() {
                    match self.items.create(new).await {
                        Ok(item) => {
                            report.created += 1;
                            report.items.push(item);
                        }
                        Err(error) => {
                            report.failed += 1;
                            report.failures.push(OperationFailure {
                                index: index as u32,
                                id: None,
                                error: error.to_string(),
                                code: error.code().to_string(),
                            });
                        }
                    }
                }
            }
            ItemOperation::Update => {
                let updates = params.updates.ok_or_else(|| {
                    WorkItemError::Validation("update requires updates".to_string())
                })?;
                for (index, spec) in updates.into_iter().enumerate() {
                    match self.items.update(spec.id, spec.update).await {
                        Ok(item) => {
                            report.updated += 1;
                            report.items.push(item);
                        }
                        Err(error) => {
                            report.failed += 1;
                            report.failures.push(OperationFailure {
                                index: index as u32,
                                id: Some(spec.id),
                                error: error.to_string(),
                                code: error.code().to_string(),
                            });
                        }
                    }
                }
            }
            ItemOperation::Delete => {
                let ids = params.ids.ok_or_else(|| {
                    WorkItemError::Validation("delete requires ids".to_string())
                })?;
                let cascade = params.cascade.unwrap_or(false);
                for (index, id) in ids.into_iter().enumerate() {
                    match self.items.delete(id, cascade).await {
                        Ok(()) => {
                            report.deleted += 1;
                            report.ids.push(id);
                        }
                        Err(error) => {
                            report.failed += 1;
                            report.failures.push(OperationFailure {
                                index: index as u32,
                                id: Some(id),
                                error: error.to_string(),
                                code: error.code().to_string(),
                            });
                        }
                    }
                }
            }
        }
        Ok(report)
    }

    async fn manage_dependencies(
        &self,
        params: ManageDependenciesParams,
    ) -> Result<ManageDependenciesReport> {
        let mut report = ManageDependenciesReport::default();
        match params.operation {
            DependencyOperation::Create => {
                let new = params.dependency.ok_or_else(|| {
                    WorkItemError::Validation("create requires dependency".to_string())
                })?;
                let created = self.dependencies.create(new).await?;
                report.created = 1;
                report.dependencies.push(created);
            }
            DependencyOperation::CreateBatch => {
                let batch = params.dependencies.ok_or_else(|| {
                    WorkItemError::Validation("createBatch requires dependencies".to_string())
                })?;
                for (index, result) in self
                    .dependencies
                    .create_batch(batch)
                    .await
                    .into_iter()
                    .enumerate()
                {
                    match result {
                        Ok(dependency) => {
                            report.created += 1;
                            report.dependencies.push(dependency);
                        }
                        Err(error) => {
                            report.failed += 1;
                            report.failures.push(OperationFailure {
                                index: index as u32,
                                id: None,
                                error: error.to_string(),
                                code: error.code().to_string(),
                            });
                        }
                    }
                }
            }
            DependencyOperation::Delete => {
                let id = params.id.ok_or_else(|| {
                    WorkItemError::Validation("delete requires id".to_string())
                })?;
                self.dependencies.delete(id).await?;
                report.deleted = 1;
            }
        }
        Ok(report)
    }

    async fn manage_notes(&self, params: ManageNotesParams) -> Result<ManageNotesReport> {
        match params.operation {
            NoteOperation::Upsert => {
                let upsert = params.note.ok_or_else(|| {
                    WorkItemError::Validation("upsert requires note".to_string())
                })?;
                let note = self.notes.upsert(upsert).await?;
                Ok(ManageNotesReport {
                    note: Some(note),
                    deleted: None,
                })
            }
            NoteOperation::Delete => {
                let item_id = params.item_id.ok_or_else(|| {
                    WorkItemError::Validation("delete requires itemId".to_string())
                })?;
                let key = params.key.ok_or_else(|| {
                    WorkItemError::Validation("delete requires key".to_string())
                })?;
                self.notes.delete(item_id, &key).await?;
                Ok(ManageNotesReport {
                    note: None,
                    deleted: Some(true),
                })
            }
        }
    }

    async fn query_items(&self, params: QueryItemsParams) -> Result<QueryItemsReport> {
        if let Some(id) = params.id {
            let item = self
                .store
                .get_item(id)
                .await?
                .ok_or_else(|| WorkItemError::item_not_found(id))?;
            return Ok(QueryItemsReport {
                items: vec![item],
                total: 1,
            });
        }

        let filter = item_core::WorkItemFilter {
            parent_id: params.parent_id,
            role: params.role,
            priority: params.priority,
            tag: params.tag,
            limit: params.limit,
            offset: params.offset,
        };
        let items = self.store.list_items(filter).await?;
        Ok(QueryItemsReport {
            total: items.len() as u32,
            items,
        })
    }

    async fn query_notes(&self, params: QueryNotesParams) -> Result<QueryNotesReport> {
        let notes = match params.key {
            Some(key) => self
                .store
                .get_note(params.item_id, &key)
                .await?
                .into_iter()
                .collect(),
            None => self.store.notes_for(params.item_id).await?,
        };
        Ok(QueryNotesReport {
            total: notes.len() as u32,
            notes,
        })
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        self.store.health_check().await?;
        Ok(HealthStatus {
            status: "healthy".to_string(),
            database: true,
            protocol: true,
            timestamp: chrono::Utc::now(),
            version: item_core::VERSION.to_string(),
        })
    }
}
