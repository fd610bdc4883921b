use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    blockers,
    error::{Result, WorkItemError},
    gate::{self, GateStatus},
    models::{BlockerStatus, Note, RoleTransition, WorkItem, WorkItemFilter},
    repository::OrchestratorStore,
    roles::{Priority, Role, Trigger},
    schema::{NoteRequirement, NoteSchemaService},
};

/// Default window after which an unblocked, non-terminal item with no
/// modification counts as stalled.
pub const DEFAULT_STALLED_AFTER_HOURS: i64 = 72;

/// Default result cap for `get_next_item`.
pub const DEFAULT_NEXT_ITEM_LIMIT: u32 = 5;

/// Cap on transitions returned by the session-resume context mode.
const RECENT_TRANSITION_LIMIT: u32 = 50;

/// Ancestor reference in a blocked-item listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AncestorRef {
    pub item_id: Uuid,
    pub title: String,
    pub role: Role,
}

/// One blocked item with its blocker chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockedItemInfo {
    pub item_id: Uuid,
    pub title: String,
    pub role: Role,
    /// The item sits in the explicit `blocked` role (as opposed to being
    /// held back by dependencies only)
    pub explicitly_blocked: bool,
    pub blockers: Vec<BlockerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<WorkItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancestors: Option<Vec<AncestorRef>>,
}

/// Tri-state recommendation for `get_next_status`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Ready,
    Blocked,
    Terminal,
}

/// `get_next_status` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NextStatus {
    pub recommendation: Recommendation,
    pub current_role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockers: Option<Vec<BlockerStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// `get_context` mode marker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ContextMode {
    Item,
    SessionResume,
    HealthCheck,
}

/// `get_context` payload; populated fields depend on the mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextReport {
    pub mode: ContextMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<WorkItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<NoteRequirement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_status: Option<GateStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_items: Option<Vec<WorkItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_items: Option<Vec<BlockedItemInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stalled_items: Option<Vec<WorkItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_transitions: Option<Vec<RoleTransition>>,
}

/// Enumerate items explicitly blocked or held back by unsatisfied
/// dependencies, each with its blocker chain.
pub async fn blocked_items<S: OrchestratorStore>(
    store: &S,
    parent_id: Option<Uuid>,
    include_details: bool,
    include_ancestors: bool,
) -> Result<Vec<BlockedItemInfo>> {
    let filter = WorkItemFilter {
        parent_id,
        ..Default::default()
    };
    let items = store.list_items(filter).await?;

    let mut out = Vec::new();
    for item in items {
        if item.is_terminal() {
            continue;
        }
        let chain = blockers::incoming_blocker_statuses(store, item.id).await?;
        let dependency_blocked = chain.iter().any(|status| !status.satisfied);
        if !item.is_blocked() && !dependency_blocked {
            continue;
        }

        let ancestors = if include_ancestors {
            Some(ancestor_chain(store, &item).await?)
        } else {
            None
        };
        out.push(BlockedItemInfo {
            item_id: item.id,
            title: item.title.clone(),
            role: item.role,
            explicitly_blocked: item.is_blocked(),
            blockers: chain,
            item: include_details.then_some(item),
            ancestors,
        });
    }
    Ok(out)
}

/// Rank-sorted recommendation of unblocked, non-terminal items.
///
/// Sort: priority descending, then complexity ascending, then creation
/// time ascending; capped at `limit`.
pub async fn next_items<S: OrchestratorStore>(
    store: &S,
    parent_id: Option<Uuid>,
    priority: Option<Priority>,
    limit: Option<u32>,
) -> Result<Vec<WorkItem>> {
    let filter = WorkItemFilter {
        parent_id,
        priority,
        ..Default::default()
    };
    let items = store.list_items(filter).await?;

    let mut candidates = Vec::new();
    for item in items {
        if item.is_terminal() || item.is_blocked() {
            continue;
        }
        let unsatisfied = blockers::unsatisfied_blockers(store, item.id).await?;
        if unsatisfied.is_empty() {
            candidates.push(item);
        }
    }

    candidates.sort_by(|a, b| {
        b.priority
            .weight()
            .cmp(&a.priority.weight())
            .then(a.complexity.cmp(&b.complexity))
            .then(a.created_at.cmp(&b.created_at))
    });
    candidates.truncate(limit.unwrap_or(DEFAULT_NEXT_ITEM_LIMIT) as usize);
    Ok(candidates)
}

/// Compute the readiness of a single item and the trigger to use next.
pub async fn next_status<S: OrchestratorStore>(store: &S, item_id: Uuid) -> Result<NextStatus> {
    let item = store
        .get_item(item_id)
        .await?
        .ok_or_else(|| WorkItemError::item_not_found(item_id))?;

    if item.is_terminal() {
        return Ok(NextStatus {
            recommendation: Recommendation::Terminal,
            current_role: item.role,
            next_role: None,
            trigger: None,
            blockers: None,
            suggestion: Some("item is terminal; no further transitions apply".to_string()),
        });
    }

    if item.is_blocked() {
        return Ok(NextStatus {
            recommendation: Recommendation::Blocked,
            current_role: item.role,
            next_role: item.previous_role,
            trigger: Some(Trigger::Resume),
            blockers: None,
            suggestion: Some("item is parked; resume it to continue".to_string()),
        });
    }

    let unsatisfied = blockers::unsatisfied_blockers(store, item.id).await?;
    if !unsatisfied.is_empty() {
        return Ok(NextStatus {
            recommendation: Recommendation::Blocked,
            current_role: item.role,
            next_role: None,
            trigger: None,
            suggestion: Some(format!(
                "waiting on {} unsatisfied dependencies",
                unsatisfied.len()
            )),
            blockers: Some(unsatisfied),
        });
    }

    Ok(NextStatus {
        recommendation: Recommendation::Ready,
        current_role: item.role,
        next_role: item.role.next_on_ladder(),
        trigger: Some(Trigger::Start),
        blockers: None,
        suggestion: None,
    })
}

/// Item-mode context: snapshot, notes, applicable schema, and the gate
/// status for the next ladder role.
pub async fn item_context<S: OrchestratorStore>(
    store: &S,
    schema: &dyn NoteSchemaService,
    item_id: Uuid,
) -> Result<ContextReport> {
    let item = store
        .get_item(item_id)
        .await?
        .ok_or_else(|| WorkItemError::item_not_found(item_id))?;

    let notes = store.notes_for(item.id).await?;
    let requirements = schema.requirements_for(&item.tag_set());
    let gate_status = match item.role.next_on_ladder() {
        Some(dest) => Some(gate::check_gate(store, schema, &item, dest, None).await?),
        None => None,
    };

    Ok(ContextReport {
        mode: ContextMode::Item,
        item: Some(item),
        notes: Some(notes),
        schema: Some(requirements),
        gate_status,
        active_items: None,
        blocked_items: None,
        stalled_items: None,
        recent_transitions: None,
    })
}

/// Session-resume context: what moved since `since`, what is in flight,
/// what is blocked.
pub async fn resume_context<S: OrchestratorStore>(
    store: &S,
    since: DateTime<Utc>,
) -> Result<ContextReport> {
    let recent = store
        .transitions_since(since, RECENT_TRANSITION_LIMIT)
        .await?;
    let active = active_items(store).await?;
    let blocked = blocked_items(store, None, false, false).await?;

    Ok(ContextReport {
        mode: ContextMode::SessionResume,
        item: None,
        notes: None,
        schema: None,
        gate_status: None,
        active_items: Some(active),
        blocked_items: Some(blocked),
        stalled_items: None,
        recent_transitions: Some(recent),
    })
}

/// Health-check context: in-flight, blocked and stalled items.
pub async fn health_context<S: OrchestratorStore>(
    store: &S,
    stalled_after: Duration,
) -> Result<ContextReport> {
    let active = active_items(store).await?;
    let blocked = blocked_items(store, None, false, false).await?;

    let cutoff = Utc::now() - stalled_after;
    let mut stalled = Vec::new();
    for item in store.list_items(WorkItemFilter::default()).await? {
        if item.is_terminal() || item.is_blocked() || item.modified_at >= cutoff {
            continue;
        }
        let unsatisfied = blockers::unsatisfied_blockers(store, item.id).await?;
        if unsatisfied.is_empty() {
            stalled.push(item);
        }
    }

    Ok(ContextReport {
        mode: ContextMode::HealthCheck,
        item: None,
        notes: None,
        schema: None,
        gate_status: None,
        active_items: Some(active),
        blocked_items: Some(blocked),
        stalled_items: Some(stalled),
        recent_transitions: None,
    })
}

async fn active_items<S: OrchestratorStore>(store: &S) -> Result<Vec<WorkItem>> {
    let items = store.list_items(WorkItemFilter::default()).await?;
    Ok(items
        .into_iter()
        .filter(|item| matches!(item.role, Role::Work | Role::Review))
        .collect())
}

async fn ancestor_chain<S: OrchestratorStore>(
    store: &S,
    item: &WorkItem,
) -> Result<Vec<AncestorRef>> {
    let mut chain = Vec::new();
    let mut cursor = item.parent_id;
    while let Some(parent_id) = cursor {
        let Some(parent) = store.get_item(parent_id).await? else {
            break;
        };
        cursor = parent.parent_id;
        chain.push(AncestorRef {
            item_id: parent.id,
            title: parent.title,
            role: parent.role,
        });
    }
    Ok(chain)
}
