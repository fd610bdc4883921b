use uuid::Uuid;

use crate::{
    error::Result,
    models::BlockerStatus,
    repository::{DependencyRepository, WorkItemRepository},
    roles::Role,
};

/// Evaluate every incoming blocker of `item_id` against its threshold.
///
/// A blocker is satisfied iff the blocker item exists and its role is
/// at-or-beyond the edge's effective unblock role; a missing blocker row is
/// unsatisfied. The returned list covers all incoming blocking edges, with
/// per-edge satisfaction, so callers can either gate on it or render it.
pub async fn incoming_blocker_statuses<S>(store: &S, item_id: Uuid) -> Result<Vec<BlockerStatus>>
where
    S: WorkItemRepository + DependencyRepository + ?Sized,
{
    let edges = store.incoming_blocking(item_id).await?;
    let mut statuses = Vec::with_capacity(edges.len());

    for edge in edges {
        let Some(blocker_id) = edge.blocker_for(item_id) else {
            continue;
        };
        let required = edge.effective_unblock_role().unwrap_or(Role::Terminal);
        let status = match store.get_item(blocker_id).await? {
            Some(blocker) => BlockerStatus {
                blocker_id,
                blocker_title: Some(blocker.title.clone()),
                blocker_role: Some(blocker.role),
                required_role: required,
                satisfied: blocker.role.is_at_or_beyond(required),
            },
            None => BlockerStatus {
                blocker_id,
                blocker_title: None,
                blocker_role: None,
                required_role: required,
                satisfied: false,
            },
        };
        statuses.push(status);
    }

    Ok(statuses)
}

/// The unsatisfied subset of [`incoming_blocker_statuses`].
pub async fn unsatisfied_blockers<S>(store: &S, item_id: Uuid) -> Result<Vec<BlockerStatus>>
where
    S: WorkItemRepository + DependencyRepository + ?Sized,
{
    Ok(incoming_blocker_statuses(store, item_id)
        .await?
        .into_iter()
        .filter(|status| !status.satisfied)
        .collect())
}
