use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::{Result, WorkItemError},
    models::{NewWorkItem, UpdateWorkItem, WorkItem, MAX_DEPTH},
    repository::OrchestratorStore,
    validation::ItemValidator,
};

/// Creation, update and deletion of work items.
///
/// Role, status-label and previous-role changes are owned by the
/// transition engine and are deliberately not reachable from here; updates
/// cover metadata, hierarchy placement and the descriptive fields.
pub struct ItemManager<S> {
    store: Arc<S>,
}

impl<S> Clone for ItemManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: OrchestratorStore> ItemManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate and persist a new item in `Queue`, deriving depth from the
    /// parent.
    pub async fn create(&self, new: NewWorkItem) -> Result<WorkItem> {
        ItemValidator::validate_new_item(&new)?;

        let parent = match new.parent_id {
            None => None,
            Some(parent_id) => Some(
                self.store
                    .get_item(parent_id)
                    .await?
                    .ok_or_else(|| WorkItemError::item_not_found(parent_id))?,
            ),
        };

        let item = WorkItem::from_new(new, parent.as_ref())?;
        self.store.insert_item(item).await
    }

    /// Apply a partial update. Reparenting re-derives the depth of the
    /// moved item and of every descendant in the same transaction, and
    /// rejects self-parenting, descendant cycles, and moves whose subtree
    /// would sink below [`MAX_DEPTH`].
    pub async fn update(&self, id: Uuid, updates: UpdateWorkItem) -> Result<WorkItem> {
        ItemValidator::validate_update(&updates)?;

        let item = self
            .store
            .get_item(id)
            .await?
            .ok_or_else(|| WorkItemError::item_not_found(id))?;

        let mut next = item.clone();
        if let Some(title) = updates.title {
            next.title = title;
        }
        if let Some(description) = updates.description {
            next.description = description;
        }
        if let Some(summary) = updates.summary {
            next.summary = summary;
        }
        if let Some(priority) = updates.priority {
            next.priority = priority;
        }
        if let Some(complexity) = updates.complexity {
            next.complexity = complexity;
        }
        if let Some(requires_verification) = updates.requires_verification {
            next.requires_verification = requires_verification;
        }
        if let Some(metadata) = updates.metadata {
            next.metadata = metadata;
        }
        if let Some(tags) = updates.tags {
            next.tags = tags;
        }

        match updates.parent_id {
            None => {
                next.modified_at = item.next_modified_at();
                self.store.save_item(&next).await
            }
            Some(new_parent_id) if new_parent_id == item.parent_id => {
                next.modified_at = item.next_modified_at();
                self.store.save_item(&next).await
            }
            Some(new_parent_id) => self.reparent(&item, next, new_parent_id).await,
        }
    }

    /// Delete an item and, with `cascade`, its whole subtree. The store's
    /// foreign keys drop each item's notes, dependencies and transitions.
    pub async fn delete(&self, id: Uuid, cascade: bool) -> Result<()> {
        let item = self
            .store
            .get_item(id)
            .await?
            .ok_or_else(|| WorkItemError::item_not_found(id))?;

        let descendants = self.store.descendants_of(item.id).await?;
        if !descendants.is_empty() && !cascade {
            return Err(WorkItemError::Validation(format!(
                "item {id} has {} descendants; pass cascade to delete the subtree",
                descendants.len()
            )));
        }

        // Deepest first, so children never outlive their parent.
        let mut ordered = descendants;
        ordered.sort_by_key(|descendant| std::cmp::Reverse(descendant.depth));
        for descendant in ordered {
            self.store.delete_item(descendant.id).await?;
        }
        self.store.delete_item(item.id).await
    }

    async fn reparent(
        &self,
        item: &WorkItem,
        mut next: WorkItem,
        new_parent_id: Option<Uuid>,
    ) -> Result<WorkItem> {
        let new_depth = match new_parent_id {
            None => 0,
            Some(parent_id) => {
                if parent_id == item.id {
                    return Err(WorkItemError::Validation(format!(
                        "item {parent_id} cannot be its own parent"
                    )));
                }
                let parent = self
                    .store
                    .get_item(parent_id)
                    .await?
                    .ok_or_else(|| WorkItemError::item_not_found(parent_id))?;
                parent.depth + 1
            }
        };

        let descendants = self.store.descendants_of(item.id).await?;
        if let Some(parent_id) = new_parent_id {
            if descendants.iter().any(|descendant| descendant.id == parent_id) {
                return Err(WorkItemError::Validation(format!(
                    "cannot move item {} under its own descendant {parent_id}",
                    item.id
                )));
            }
        }

        let subtree_reach = descendants
            .iter()
            .map(|descendant| descendant.depth - item.depth)
            .max()
            .unwrap_or(0);
        if new_depth + subtree_reach > MAX_DEPTH {
            return Err(WorkItemError::Validation(format!(
                "reparenting would push the subtree to depth {}, exceeding the maximum of {MAX_DEPTH}",
                new_depth + subtree_reach
            )));
        }

        next.parent_id = new_parent_id;
        next.depth = new_depth;
        next.modified_at = item.next_modified_at();

        let shift = new_depth - item.depth;
        let mut batch = vec![next.clone()];
        for descendant in descendants {
            let mut moved = descendant.clone();
            moved.depth += shift;
            moved.modified_at = descendant.next_modified_at();
            batch.push(moved);
        }
        self.store.save_items(&batch).await?;

        Ok(next)
    }
}
