use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        Dependency, NewRoleTransition, Note, NoteUpsert, RoleTransition, WorkItem, WorkItemFilter,
    },
    roles::Role,
};

/// Persistence contract for work items.
///
/// Implementations must be thread-safe and transactional at the call
/// boundary: each method is a complete unit of work, and
/// [`apply_transition`](WorkItemRepository::apply_transition) writes the
/// item mutation and its audit record in a single transaction. The engine
/// treats returned entities as immutable snapshots.
#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    /// Persist a fully-built item snapshot.
    ///
    /// # Returns
    /// * `Ok(WorkItem)` - The stored item
    /// * `Err(WorkItemError::Conflict)` - If the id already exists
    /// * `Err(WorkItemError::Database)` - If the store operation fails
    async fn insert_item(&self, item: WorkItem) -> Result<WorkItem>;

    /// Overwrite an existing item with a new snapshot.
    ///
    /// # Returns
    /// * `Ok(WorkItem)` - The stored item
    /// * `Err(WorkItemError::NotFound)` - If no row matches the id
    async fn save_item(&self, item: &WorkItem) -> Result<WorkItem>;

    /// Overwrite several items atomically (one transaction). Used by
    /// reparenting to keep subtree depths consistent.
    async fn save_items(&self, items: &[WorkItem]) -> Result<()>;

    /// Delete an item; incident dependencies, notes and transitions are
    /// removed with it.
    async fn delete_item(&self, id: Uuid) -> Result<()>;

    /// Fetch one item by id.
    async fn get_item(&self, id: Uuid) -> Result<Option<WorkItem>>;

    /// List items matching the filter, ordered by creation time.
    async fn list_items(&self, filter: WorkItemFilter) -> Result<Vec<WorkItem>>;

    /// Direct children of a parent.
    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<WorkItem>>;

    /// Current role counts of the children of a parent, read fresh from
    /// the store. The cascade detector re-reads these between levels.
    async fn children_role_counts(&self, parent_id: Uuid) -> Result<HashMap<Role, u64>>;

    /// All descendants of a root (flat, any depth).
    async fn descendants_of(&self, root_id: Uuid) -> Result<Vec<WorkItem>>;

    /// Store reachability probe for monitoring.
    async fn health_check(&self) -> Result<()>;

    /// Persist a transition: item update plus audit insert in a single
    /// transaction, so readers observe both or neither.
    ///
    /// The stored role must still equal `audit.from_role` at write time;
    /// otherwise the call fails with `Conflict` and writes nothing. This is
    /// what makes concurrent cascade attempts on the same parent collapse
    /// to a single write.
    async fn apply_transition(&self, item: &WorkItem, audit: NewRoleTransition)
        -> Result<WorkItem>;
}

/// Persistence contract for dependency edges.
#[async_trait]
pub trait DependencyRepository: Send + Sync {
    /// Persist a new edge.
    ///
    /// # Returns
    /// * `Err(WorkItemError::DuplicateDependency)` - If `(from, to, type)` exists
    async fn insert_dependency(&self, dependency: Dependency) -> Result<Dependency>;

    /// Delete an edge by id.
    async fn delete_dependency(&self, id: Uuid) -> Result<()>;

    /// Fetch one edge by id.
    async fn get_dependency(&self, id: Uuid) -> Result<Option<Dependency>>;

    /// Every edge touching an item, regardless of type or direction.
    async fn dependencies_for(&self, item_id: Uuid) -> Result<Vec<Dependency>>;

    /// Incoming blockers of an item under the normalization
    /// `{e : e.to = item ∧ e.type = BLOCKS} ∪ {e : e.from = item ∧ e.type = IS_BLOCKED_BY}`.
    async fn incoming_blocking(&self, item_id: Uuid) -> Result<Vec<Dependency>>;

    /// Blocking edges on which `item` is the blocker side (the inverse of
    /// [`incoming_blocking`](DependencyRepository::incoming_blocking)).
    async fn outgoing_blocking(&self, item_id: Uuid) -> Result<Vec<Dependency>>;

    /// Blocking edges whose endpoints both fall inside `ids`.
    async fn blocking_among(&self, ids: &[Uuid]) -> Result<Vec<Dependency>>;
}

/// Persistence contract for notes.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert or update the note identified by `(item_id, key)`.
    async fn upsert_note(&self, note: NoteUpsert) -> Result<Note>;

    /// Fetch one note by its per-item key.
    async fn get_note(&self, item_id: Uuid, key: &str) -> Result<Option<Note>>;

    /// All notes of an item.
    async fn notes_for(&self, item_id: Uuid) -> Result<Vec<Note>>;

    /// Delete a note; returns whether a row existed.
    async fn delete_note(&self, item_id: Uuid, key: &str) -> Result<bool>;
}

/// Persistence contract for the append-only transition audit.
#[async_trait]
pub trait TransitionRepository: Send + Sync {
    /// Transition history of an item, oldest first.
    async fn transitions_for(&self, item_id: Uuid) -> Result<Vec<RoleTransition>>;

    /// Transitions at or after `since`, newest first, capped at `limit`.
    async fn transitions_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RoleTransition>>;
}

/// The full store the orchestration engine composes over. Blanket-implemented
/// for anything providing all four repository contracts.
pub trait OrchestratorStore:
    WorkItemRepository + DependencyRepository + NoteRepository + TransitionRepository
{
}

impl<S> OrchestratorStore for S where
    S: WorkItemRepository + DependencyRepository + NoteRepository + TransitionRepository
{
}
