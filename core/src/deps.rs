use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{Result, WorkItemError},
    models::{Dependency, NewDependency},
    repository::OrchestratorStore,
};

/// Creation and deletion of dependency edges, guarding the blocking
/// subgraph's acyclicity.
pub struct DependencyManager<S> {
    store: Arc<S>,
}

impl<S> Clone for DependencyManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: OrchestratorStore> DependencyManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate and persist a new edge.
    ///
    /// Rejects self-edges, edges between missing items, duplicates of
    /// `(from, to, type)`, and blocking edges whose reverse path already
    /// exists in the blocking subgraph.
    pub async fn create(&self, new: NewDependency) -> Result<Dependency> {
        if new.from_item_id == new.to_item_id {
            return Err(WorkItemError::SelfDependency(new.from_item_id));
        }
        for id in [new.from_item_id, new.to_item_id] {
            if self.store.get_item(id).await?.is_none() {
                return Err(WorkItemError::item_not_found(id));
            }
        }

        if new.dependency_type.is_blocking() {
            // Normalize to blocker → blocked before the reachability probe.
            let (blocker, blocked) = match new.dependency_type {
                crate::models::DependencyType::IsBlockedBy => (new.to_item_id, new.from_item_id),
                _ => (new.from_item_id, new.to_item_id),
            };
            if self.blocking_path_exists(blocked, blocker).await? {
                return Err(WorkItemError::CyclicDependency(format!(
                    "{blocked} already blocks {blocker} through the existing graph"
                )));
            }
        }

        let dependency = Dependency {
            id: Uuid::new_v4(),
            from_item_id: new.from_item_id,
            to_item_id: new.to_item_id,
            dependency_type: new.dependency_type,
            unblock_at: new.unblock_at,
            created_at: Utc::now(),
        };
        self.store.insert_dependency(dependency).await
    }

    /// Per-entry batch creation: one bad edge does not abort the rest.
    pub async fn create_batch(
        &self,
        batch: Vec<NewDependency>,
    ) -> Vec<std::result::Result<Dependency, WorkItemError>> {
        let mut results = Vec::with_capacity(batch.len());
        for new in batch {
            results.push(self.create(new).await);
        }
        results
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.store.get_dependency(id).await?.is_none() {
            return Err(WorkItemError::dependency_not_found(id));
        }
        self.store.delete_dependency(id).await
    }

    /// Forward reachability in the blocking subgraph: does a blocks-path
    /// lead from `from` to `to`?
    async fn blocking_path_exists(&self, from: Uuid, to: Uuid) -> Result<bool> {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut frontier: VecDeque<Uuid> = VecDeque::new();
        frontier.push_back(from);
        visited.insert(from);

        while let Some(current) = frontier.pop_front() {
            if current == to {
                return Ok(true);
            }
            for edge in self.store.outgoing_blocking(current).await? {
                if let Some(blocked) = edge.blocked_by(current) {
                    if visited.insert(blocked) {
                        frontier.push_back(blocked);
                    }
                }
            }
        }
        Ok(false)
    }
}
