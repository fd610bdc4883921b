use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{blockers, error::Result, repository::OrchestratorStore};

/// A downstream item whose incoming blockers are now all satisfied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnblockedItem {
    pub item_id: Uuid,
    pub title: String,
}

/// Probe the items downstream of a just-advanced blocker.
///
/// For each outgoing blocking edge of `item_id`, the gated target is
/// re-evaluated: if every one of its incoming blockers is satisfied it is
/// reported as unblocked. Detection is advisory and mutates nothing.
/// Targets that are already terminal, or whose rows are missing, are never
/// reported.
pub async fn detect_unblocked<S: OrchestratorStore>(
    store: &S,
    item_id: Uuid,
) -> Result<Vec<UnblockedItem>> {
    let edges = store.outgoing_blocking(item_id).await?;
    let targets: BTreeSet<Uuid> = edges
        .iter()
        .filter_map(|edge| edge.blocked_by(item_id))
        .collect();

    let mut unblocked = Vec::new();
    for target_id in targets {
        let Some(target) = store.get_item(target_id).await? else {
            continue;
        };
        if target.is_terminal() {
            continue;
        }
        let statuses = blockers::incoming_blocker_statuses(store, target_id).await?;
        if statuses.iter().all(|status| status.satisfied) {
            unblocked.push(UnblockedItem {
                item_id: target.id,
                title: target.title,
            });
        }
    }

    Ok(unblocked)
}
