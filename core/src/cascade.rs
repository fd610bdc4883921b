use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{Result, WorkItemError},
    models::{NewRoleTransition, WorkItem, MAX_DEPTH},
    repository::OrchestratorStore,
    roles::Role,
};

/// Trigger string recorded on cascade audit records.
pub const CASCADE_TRIGGER: &str = "cascade";

/// One applied parent cascade, reported closest-first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CascadeEvent {
    pub item_id: Uuid,
    pub previous_role: Role,
    pub target_role: Role,
    pub trigger: String,
}

/// Walk up from a just-terminal item, lifting each parent whose children
/// are now all terminal.
///
/// The walk is an iterative loop bounded by [`MAX_DEPTH`]; every level
/// re-reads child counts and the parent snapshot from the store rather
/// than trusting anything in memory. A cascade step is not gated: it is a
/// derived fact about children, not a user-driven advance. The parent's
/// status label is preserved.
///
/// Two concurrent siblings can both observe "all children terminal"; the
/// store's `apply_transition` accepts only the writer whose `from_role`
/// expectation still holds, so the loser sees `Conflict` and the walk
/// stops without error.
pub async fn run_cascade<S: OrchestratorStore>(
    store: &S,
    start: &WorkItem,
) -> Result<Vec<CascadeEvent>> {
    let mut events = Vec::new();
    let mut current = start.clone();

    for _ in 0..MAX_DEPTH {
        let Some(parent_id) = current.parent_id else {
            break;
        };

        let counts = store.children_role_counts(parent_id).await?;
        let total: u64 = counts.values().sum();
        if total == 0 {
            break;
        }
        let terminal = counts.get(&Role::Terminal).copied().unwrap_or(0);
        if terminal != total {
            break;
        }

        let Some(parent) = store.get_item(parent_id).await? else {
            break;
        };
        if parent.role == Role::Terminal {
            break;
        }

        let now = parent.next_modified_at();
        let mut lifted = parent.clone();
        lifted.role = Role::Terminal;
        lifted.previous_role = None;
        lifted.modified_at = now;

        let audit = NewRoleTransition {
            item_id: parent.id,
            from_role: parent.role,
            to_role: Role::Terminal,
            from_status_label: parent.status_label.clone(),
            to_status_label: lifted.status_label.clone(),
            trigger: CASCADE_TRIGGER.to_string(),
            summary: None,
            transitioned_at: now,
        };

        let stored = match store.apply_transition(&lifted, audit).await {
            Ok(stored) => stored,
            // A concurrent cascade already lifted this parent.
            Err(WorkItemError::Conflict(_)) => break,
            Err(e) => return Err(e),
        };

        events.push(CascadeEvent {
            item_id: parent.id,
            previous_role: parent.role,
            target_role: Role::Terminal,
            trigger: CASCADE_TRIGGER.to_string(),
        });

        current = stored;
    }

    Ok(events)
}
