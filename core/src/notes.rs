use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::{Result, WorkItemError},
    models::{Note, NoteUpsert},
    repository::OrchestratorStore,
    validation::ItemValidator,
};

/// Upsert and deletion of accountability notes.
pub struct NoteManager<S> {
    store: Arc<S>,
}

impl<S> Clone for NoteManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: OrchestratorStore> NoteManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate and upsert the note identified by `(item_id, key)`.
    pub async fn upsert(&self, note: NoteUpsert) -> Result<Note> {
        ItemValidator::validate_note(&note)?;
        if self.store.get_item(note.item_id).await?.is_none() {
            return Err(WorkItemError::item_not_found(note.item_id));
        }
        self.store.upsert_note(note).await
    }

    /// Delete a note; not-found is an error so callers learn about typos.
    pub async fn delete(&self, item_id: Uuid, key: &str) -> Result<()> {
        if !self.store.delete_note(item_id, key).await? {
            return Err(WorkItemError::NotFound(format!(
                "note '{key}' on item {item_id}"
            )));
        }
        Ok(())
    }
}
