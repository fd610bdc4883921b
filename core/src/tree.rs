use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    engine::{TransitionEngine, TransitionRequest},
    error::{Result, WorkItemError},
    models::{BlockerStatus, DependencyType, WorkItem},
    repository::OrchestratorStore,
    roles::{Role, Trigger},
};

/// Target selection for a bulk sweep: a subtree or an explicit set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSelection {
    /// The root item and all of its descendants
    Root(Uuid),
    /// An explicit item list
    Items(Vec<Uuid>),
}

/// Per-entry result of a `complete_tree` sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreeEntryResult {
    pub item_id: Uuid,
    pub applied: bool,
    /// Entry was skipped: already terminal, or inside the downstream cone
    /// of a failed predecessor
    #[serde(default)]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockers: Option<Vec<BlockerStatus>>,
}

/// Sweep totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TreeSummary {
    pub total: u32,
    pub completed: u32,
    pub skipped: u32,
    pub gate_failures: u32,
}

/// Full `complete_tree` report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreeReport {
    pub results: Vec<TreeEntryResult>,
    pub summary: TreeSummary,
}

/// Bulk-advance a dependency-ordered set of items with `complete` or
/// `cancel`.
///
/// The target set is swept in topological order of its internal blocking
/// subgraph (blockers before the items they gate), so in-set blockers are
/// terminal by the time their dependents run. A failed entry poisons its
/// downstream cone inside the set: those items are skipped rather than
/// attempted, and the sweep continues elsewhere. Items already terminal are
/// reported skipped up front. A cycle in the blocking subgraph aborts the
/// whole call.
pub async fn complete_tree<S: OrchestratorStore>(
    engine: &TransitionEngine<S>,
    selection: TreeSelection,
    trigger: Trigger,
) -> Result<TreeReport> {
    if !matches!(trigger, Trigger::Complete | Trigger::Cancel) {
        return Err(WorkItemError::Validation(format!(
            "complete_tree accepts triggers 'complete' or 'cancel', got '{trigger}'"
        )));
    }

    let store = engine.store().clone();
    let mut results = Vec::new();

    // Collect target snapshots, preserving a stable submission order.
    let mut targets: Vec<WorkItem> = Vec::new();
    match selection {
        TreeSelection::Root(root_id) => {
            let root = store
                .get_item(root_id)
                .await?
                .ok_or_else(|| WorkItemError::item_not_found(root_id))?;
            let descendants = store.descendants_of(root_id).await?;
            targets.push(root);
            targets.extend(descendants);
        }
        TreeSelection::Items(ids) => {
            for id in ids {
                match store.get_item(id).await? {
                    Some(item) => targets.push(item),
                    None => results.push(TreeEntryResult {
                        item_id: id,
                        applied: false,
                        skipped: false,
                        previous_role: None,
                        new_role: None,
                        error: Some(WorkItemError::item_not_found(id).to_string()),
                        error_code: Some("NOT_FOUND".to_string()),
                        gate_errors: None,
                        blockers: None,
                    }),
                }
            }
        }
    }

    // Items already terminal are reported but not driven.
    targets.retain(|item| {
        if item.is_terminal() {
            results.push(TreeEntryResult {
                item_id: item.id,
                applied: false,
                skipped: true,
                previous_role: Some(item.role),
                new_role: None,
                error: None,
                error_code: None,
                gate_errors: None,
                blockers: None,
            });
            false
        } else {
            true
        }
    });

    let target_ids: Vec<Uuid> = targets.iter().map(|item| item.id).collect();
    let id_set: BTreeSet<Uuid> = target_ids.iter().copied().collect();

    // Blocking subgraph restricted to the target set, normalized to
    // blocker → blocked adjacency.
    let edges = store.blocking_among(&target_ids).await?;
    let mut downstream: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut indegree: HashMap<Uuid, u32> = target_ids.iter().map(|id| (*id, 0)).collect();
    for edge in &edges {
        let (blocker, blocked) = match edge.dependency_type {
            DependencyType::Blocks => (edge.from_item_id, edge.to_item_id),
            DependencyType::IsBlockedBy => (edge.to_item_id, edge.from_item_id),
            DependencyType::RelatesTo => continue,
        };
        if id_set.contains(&blocker) && id_set.contains(&blocked) {
            downstream.entry(blocker).or_default().push(blocked);
            *indegree.entry(blocked).or_default() += 1;
        }
    }

    // Kahn's algorithm, preferring the collection order for determinism.
    let mut order: Vec<Uuid> = Vec::with_capacity(target_ids.len());
    let mut remaining: Vec<Uuid> = target_ids.clone();
    while !remaining.is_empty() {
        let position = remaining
            .iter()
            .position(|id| indegree.get(id).copied().unwrap_or(0) == 0)
            .ok_or_else(|| {
                WorkItemError::CyclicDependency(
                    "blocking subgraph of the target set contains a cycle".to_string(),
                )
            })?;
        let id = remaining.remove(position);
        for blocked in downstream.get(&id).cloned().unwrap_or_default() {
            if let Some(count) = indegree.get_mut(&blocked) {
                *count = count.saturating_sub(1);
            }
        }
        order.push(id);
    }

    let by_id: HashMap<Uuid, WorkItem> = targets.into_iter().map(|item| (item.id, item)).collect();
    let mut poisoned: HashSet<Uuid> = HashSet::new();

    for id in order {
        if poisoned.contains(&id) {
            for blocked in downstream.get(&id).cloned().unwrap_or_default() {
                poisoned.insert(blocked);
            }
            results.push(TreeEntryResult {
                item_id: id,
                applied: false,
                skipped: true,
                previous_role: by_id.get(&id).map(|item| item.role),
                new_role: None,
                error: None,
                error_code: None,
                gate_errors: None,
                blockers: None,
            });
            continue;
        }

        let request = TransitionRequest {
            item_id: id,
            trigger,
            summary: None,
            status_label: None,
            apply_cascade: false,
        };
        match engine.execute(&request).await {
            Ok(executed) => {
                results.push(TreeEntryResult {
                    item_id: id,
                    applied: true,
                    skipped: false,
                    previous_role: Some(executed.previous.role),
                    new_role: Some(executed.item.role),
                    error: None,
                    error_code: None,
                    gate_errors: None,
                    blockers: None,
                });
            }
            Err(error) => {
                for blocked in downstream.get(&id).cloned().unwrap_or_default() {
                    poisoned.insert(blocked);
                }
                let (gate_errors, blockers) = match &error {
                    WorkItemError::GateCheckFailed(missing) => (Some(missing.clone()), None),
                    WorkItemError::BlockedByDependency(list) => (None, Some(list.clone())),
                    _ => (None, None),
                };
                results.push(TreeEntryResult {
                    item_id: id,
                    applied: false,
                    skipped: false,
                    previous_role: by_id.get(&id).map(|item| item.role),
                    new_role: None,
                    error: Some(error.to_string()),
                    error_code: Some(error.code().to_string()),
                    gate_errors,
                    blockers,
                });
            }
        }
    }

    let total = results.len() as u32;
    let completed = results.iter().filter(|entry| entry.applied).count() as u32;
    let skipped = results.iter().filter(|entry| entry.skipped).count() as u32;
    let gate_failures = results
        .iter()
        .filter(|entry| entry.gate_errors.is_some())
        .count() as u32;

    Ok(TreeReport {
        summary: TreeSummary {
            total,
            completed,
            skipped,
            gate_failures,
        },
        results,
    })
}
