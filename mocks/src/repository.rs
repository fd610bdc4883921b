//! In-memory implementation of the orchestrator store
//!
//! Provides a thread-safe store over `parking_lot` mutexes with:
//! - the same semantics as the SQLite store (conflict detection,
//!   transition atomicity, cascade-idempotent `apply_transition`)
//! - error injection for failure testing

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use item_core::{
    error::{Result, WorkItemError},
    models::{
        Dependency, NewRoleTransition, Note, NoteUpsert, RoleTransition, WorkItem, WorkItemFilter,
    },
    repository::{
        DependencyRepository, NoteRepository, TransitionRepository, WorkItemRepository,
    },
    roles::Role,
};

/// Thread-safe in-memory store for engine and protocol tests.
#[derive(Default)]
pub struct MemoryStore {
    items: Arc<Mutex<HashMap<Uuid, WorkItem>>>,
    dependencies: Arc<Mutex<HashMap<Uuid, Dependency>>>,
    notes: Arc<Mutex<HashMap<(Uuid, String), Note>>>,
    transitions: Arc<Mutex<Vec<RoleTransition>>>,
    error_injection: Arc<Mutex<Option<WorkItemError>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with items.
    pub fn with_items(items: Vec<WorkItem>) -> Self {
        let store = Self::new();
        {
            let mut map = store.items.lock();
            for item in items {
                map.insert(item.id, item);
            }
        }
        store
    }

    /// Inject an error for the next store operation.
    pub fn inject_error(&self, error: WorkItemError) {
        *self.error_injection.lock() = Some(error);
    }

    /// Count of persisted audit records, for invariant assertions.
    pub fn transition_count(&self) -> usize {
        self.transitions.lock().len()
    }

    fn take_injected(&self) -> Result<()> {
        if let Some(error) = self.error_injection.lock().take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl WorkItemRepository for MemoryStore {
    async fn insert_item(&self, item: WorkItem) -> Result<WorkItem> {
        self.take_injected()?;
        let mut items = self.items.lock();
        if items.contains_key(&item.id) {
            return Err(WorkItemError::Conflict(format!(
                "item {} already exists",
                item.id
            )));
        }
        items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn save_item(&self, item: &WorkItem) -> Result<WorkItem> {
        self.take_injected()?;
        let mut items = self.items.lock();
        if !items.contains_key(&item.id) {
            return Err(WorkItemError::item_not_found(item.id));
        }
        items.insert(item.id, item.clone());
        Ok(item.clone())
    }

    async fn save_items(&self, batch: &[WorkItem]) -> Result<()> {
        self.take_injected()?;
        let mut items = self.items.lock();
        for item in batch {
            if !items.contains_key(&item.id) {
                return Err(WorkItemError::item_not_found(item.id));
            }
        }
        for item in batch {
            items.insert(item.id, item.clone());
        }
        Ok(())
    }

    async fn delete_item(&self, id: Uuid) -> Result<()> {
        self.take_injected()?;
        if self.items.lock().remove(&id).is_none() {
            return Err(WorkItemError::item_not_found(id));
        }
        // Mirror the SQL foreign-key cascades.
        self.dependencies
            .lock()
            .retain(|_, dep| dep.from_item_id != id && dep.to_item_id != id);
        self.notes.lock().retain(|(item_id, _), _| *item_id != id);
        self.transitions.lock().retain(|t| t.item_id != id);
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<WorkItem>> {
        self.take_injected()?;
        Ok(self.items.lock().get(&id).cloned())
    }

    async fn list_items(&self, filter: WorkItemFilter) -> Result<Vec<WorkItem>> {
        self.take_injected()?;
        let mut out: Vec<WorkItem> = self
            .items
            .lock()
            .values()
            .filter(|item| {
                filter.parent_id.map_or(true, |p| item.parent_id == Some(p))
                    && filter.role.map_or(true, |r| item.role == r)
                    && filter.priority.map_or(true, |p| item.priority == p)
                    && filter
                        .tag
                        .as_deref()
                        .map_or(true, |t| item.tag_set().iter().any(|tag| tag == t))
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let offset = filter.offset.unwrap_or(0) as usize;
        let out: Vec<WorkItem> = out.into_iter().skip(offset).collect();
        match filter.limit {
            Some(limit) => Ok(out.into_iter().take(limit as usize).collect()),
            None => Ok(out),
        }
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<WorkItem>> {
        self.take_injected()?;
        let mut out: Vec<WorkItem> = self
            .items
            .lock()
            .values()
            .filter(|item| item.parent_id == Some(parent_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn children_role_counts(&self, parent_id: Uuid) -> Result<HashMap<Role, u64>> {
        self.take_injected()?;
        let mut counts = HashMap::new();
        for item in self.items.lock().values() {
            if item.parent_id == Some(parent_id) {
                *counts.entry(item.role).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn descendants_of(&self, root_id: Uuid) -> Result<Vec<WorkItem>> {
        self.take_injected()?;
        let items = self.items.lock();
        let mut out = Vec::new();
        let mut frontier = vec![root_id];
        while let Some(current) = frontier.pop() {
            let mut children: Vec<&WorkItem> = items
                .values()
                .filter(|item| item.parent_id == Some(current))
                .collect();
            children.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            for child in children {
                frontier.push(child.id);
                out.push(child.clone());
            }
        }
        Ok(out)
    }

    async fn health_check(&self) -> Result<()> {
        self.take_injected()
    }

    async fn apply_transition(
        &self,
        item: &WorkItem,
        audit: NewRoleTransition,
    ) -> Result<WorkItem> {
        self.take_injected()?;
        // Item update and audit insert under one lock: readers observe
        // both or neither, as the SQL store's transaction guarantees.
        let mut items = self.items.lock();
        let stored = items
            .get(&item.id)
            .ok_or_else(|| WorkItemError::item_not_found(item.id))?;
        if stored.role != audit.from_role {
            return Err(WorkItemError::Conflict(format!(
                "item {} is '{}', expected '{}'",
                item.id, stored.role, audit.from_role
            )));
        }
        items.insert(item.id, item.clone());
        self.transitions.lock().push(RoleTransition {
            id: Uuid::new_v4(),
            item_id: audit.item_id,
            from_role: audit.from_role,
            to_role: audit.to_role,
            from_status_label: audit.from_status_label,
            to_status_label: audit.to_status_label,
            trigger: audit.trigger,
            summary: audit.summary,
            transitioned_at: audit.transitioned_at,
        });
        Ok(item.clone())
    }
}

#[async_trait]
impl DependencyRepository for MemoryStore {
    async fn insert_dependency(&self, dependency: Dependency) -> Result<Dependency> {
        self.take_injected()?;
        let mut deps = self.dependencies.lock();
        let duplicate = deps.values().any(|existing| {
            existing.from_item_id == dependency.from_item_id
                && existing.to_item_id == dependency.to_item_id
                && existing.dependency_type == dependency.dependency_type
        });
        if duplicate {
            return Err(WorkItemError::DuplicateDependency(format!(
                "{} -{}-> {}",
                dependency.from_item_id, dependency.dependency_type, dependency.to_item_id
            )));
        }
        deps.insert(dependency.id, dependency.clone());
        Ok(dependency)
    }

    async fn delete_dependency(&self, id: Uuid) -> Result<()> {
        self.take_injected()?;
        self.dependencies.lock().remove(&id);
        Ok(())
    }

    async fn get_dependency(&self, id: Uuid) -> Result<Option<Dependency>> {
        self.take_injected()?;
        Ok(self.dependencies.lock().get(&id).cloned())
    }

    async fn dependencies_for(&self, item_id: Uuid) -> Result<Vec<Dependency>> {
        self.take_injected()?;
        let mut out: Vec<Dependency> = self
            .dependencies
            .lock()
            .values()
            .filter(|dep| dep.from_item_id == item_id || dep.to_item_id == item_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn incoming_blocking(&self, item_id: Uuid) -> Result<Vec<Dependency>> {
        self.take_injected()?;
        let mut out: Vec<Dependency> = self
            .dependencies
            .lock()
            .values()
            .filter(|dep| dep.blocker_for(item_id).is_some())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn outgoing_blocking(&self, item_id: Uuid) -> Result<Vec<Dependency>> {
        self.take_injected()?;
        let mut out: Vec<Dependency> = self
            .dependencies
            .lock()
            .values()
            .filter(|dep| dep.blocked_by(item_id).is_some())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn blocking_among(&self, ids: &[Uuid]) -> Result<Vec<Dependency>> {
        self.take_injected()?;
        let mut out: Vec<Dependency> = self
            .dependencies
            .lock()
            .values()
            .filter(|dep| {
                dep.dependency_type.is_blocking()
                    && ids.contains(&dep.from_item_id)
                    && ids.contains(&dep.to_item_id)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}

#[async_trait]
impl NoteRepository for MemoryStore {
    async fn upsert_note(&self, upsert: NoteUpsert) -> Result<Note> {
        self.take_injected()?;
        let mut notes = self.notes.lock();
        let key = (upsert.item_id, upsert.key.clone());
        let now = Utc::now();
        let note = match notes.get(&key) {
            Some(existing) => Note {
                role: upsert.role,
                body: upsert.body,
                modified_at: now.max(existing.modified_at + chrono::Duration::milliseconds(1)),
                ..existing.clone()
            },
            None => Note {
                id: Uuid::new_v4(),
                item_id: upsert.item_id,
                key: upsert.key,
                role: upsert.role,
                body: upsert.body,
                created_at: now,
                modified_at: now,
            },
        };
        notes.insert(key, note.clone());
        Ok(note)
    }

    async fn get_note(&self, item_id: Uuid, key: &str) -> Result<Option<Note>> {
        self.take_injected()?;
        Ok(self.notes.lock().get(&(item_id, key.to_string())).cloned())
    }

    async fn notes_for(&self, item_id: Uuid) -> Result<Vec<Note>> {
        self.take_injected()?;
        let mut out: Vec<Note> = self
            .notes
            .lock()
            .values()
            .filter(|note| note.item_id == item_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    async fn delete_note(&self, item_id: Uuid, key: &str) -> Result<bool> {
        self.take_injected()?;
        Ok(self
            .notes
            .lock()
            .remove(&(item_id, key.to_string()))
            .is_some())
    }
}

#[async_trait]
impl TransitionRepository for MemoryStore {
    async fn transitions_for(&self, item_id: Uuid) -> Result<Vec<RoleTransition>> {
        self.take_injected()?;
        let mut out: Vec<RoleTransition> = self
            .transitions
            .lock()
            .iter()
            .filter(|t| t.item_id == item_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.transitioned_at.cmp(&b.transitioned_at));
        Ok(out)
    }

    async fn transitions_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RoleTransition>> {
        self.take_injected()?;
        let mut out: Vec<RoleTransition> = self
            .transitions
            .lock()
            .iter()
            .filter(|t| t.transitioned_at >= since)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.transitioned_at.cmp(&a.transitioned_at));
        out.truncate(limit as usize);
        Ok(out)
    }
}
