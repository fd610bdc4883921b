use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    blockers,
    error::{Result, WorkItemError},
    gate,
    models::{NewRoleTransition, WorkItem},
    repository::OrchestratorStore,
    roles::{Role, Trigger},
    schema::NoteSchemaService,
};

/// A requested transition on one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub item_id: Uuid,
    pub trigger: Trigger,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status_label: Option<String>,
    #[serde(default = "default_apply_cascade")]
    pub apply_cascade: bool,
}

fn default_apply_cascade() -> bool {
    true
}

impl TransitionRequest {
    pub fn new(item_id: Uuid, trigger: Trigger) -> Self {
        Self {
            item_id,
            trigger,
            summary: None,
            status_label: None,
            apply_cascade: true,
        }
    }
}

/// Result of evaluating a trigger against an item snapshot: the new
/// snapshot, the audit record to persist with it, and which derived
/// detectors should run afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// New item snapshot (role, previous role, status label, summary and
    /// modified-at already applied)
    pub item: WorkItem,
    /// Audit record; `from_role` doubles as the optimistic-concurrency
    /// expectation for the store
    pub audit: NewRoleTransition,
    /// The destination is terminal: the cascade detector is a candidate
    pub reached_terminal: bool,
    /// The destination rank did not drop: unblock probes should run
    pub rank_advanced: bool,
}

/// A persisted transition, as returned by [`TransitionEngine::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTransition {
    /// Snapshot before the transition
    pub previous: WorkItem,
    /// Stored snapshot after the transition
    pub item: WorkItem,
    pub reached_terminal: bool,
    pub rank_advanced: bool,
}

/// The role/trigger state machine with dependency and role-entry gating.
///
/// The engine is stateless apart from the store handle: every evaluation
/// reads fresh snapshots, and persistence happens through the store's
/// atomic [`apply_transition`](crate::repository::WorkItemRepository::apply_transition)
/// contract. Gating applies to ladder-advancing triggers (`start`,
/// `complete`); `cancel`, `block`/`hold` and `resume` bypass both the
/// blocker evaluation and the role-entry gate.
pub struct TransitionEngine<S> {
    store: Arc<S>,
    schema: Arc<dyn NoteSchemaService>,
}

impl<S> Clone for TransitionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            schema: self.schema.clone(),
        }
    }
}

impl<S: OrchestratorStore> TransitionEngine<S> {
    pub fn new(store: Arc<S>, schema: Arc<dyn NoteSchemaService>) -> Self {
        Self { store, schema }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn schema(&self) -> &Arc<dyn NoteSchemaService> {
        &self.schema
    }

    /// Evaluate a trigger against an item snapshot without persisting.
    ///
    /// Ordering: state-machine checks first (destination computation),
    /// then incoming-blocker gating, then the role-entry gate for the
    /// destination. Fails with the first violated family.
    pub async fn evaluate(
        &self,
        item: &WorkItem,
        trigger: Trigger,
        summary: Option<&str>,
        status_label: Option<&str>,
    ) -> Result<TransitionOutcome> {
        let destination = Self::destination(item, trigger)?;

        let gated = matches!(trigger, Trigger::Start | Trigger::Complete);
        if gated {
            let unsatisfied = blockers::unsatisfied_blockers(self.store.as_ref(), item.id).await?;
            if !unsatisfied.is_empty() {
                return Err(WorkItemError::BlockedByDependency(unsatisfied));
            }

            let gate_status = gate::check_gate(
                self.store.as_ref(),
                self.schema.as_ref(),
                item,
                destination,
                summary,
            )
            .await?;
            if !gate_status.can_advance {
                return Err(WorkItemError::GateCheckFailed(gate_status.missing));
            }
        }

        let now = item.next_modified_at();
        let mut next = item.clone();
        next.role = destination;
        next.previous_role = if destination == Role::Blocked {
            Some(item.role)
        } else {
            None
        };
        next.status_label = match (trigger, status_label) {
            (_, Some(label)) => Some(label.to_string()),
            (Trigger::Cancel, None) => Some("cancelled".to_string()),
            _ => None,
        };
        if let Some(summary) = summary {
            next.summary = summary.to_string();
        }
        next.modified_at = now;

        let audit = NewRoleTransition {
            item_id: item.id,
            from_role: item.role,
            to_role: destination,
            from_status_label: item.status_label.clone(),
            to_status_label: next.status_label.clone(),
            trigger: trigger.as_str().to_string(),
            summary: summary.map(str::to_string),
            transitioned_at: now,
        };

        let reached_terminal = destination == Role::Terminal;
        let rank_advanced = match (destination.rank(), item.role.rank()) {
            (Some(dest), Some(current)) => dest >= current,
            (Some(_), None) => true,
            (None, _) => false,
        };

        Ok(TransitionOutcome {
            item: next,
            audit,
            reached_terminal,
            rank_advanced,
        })
    }

    /// Load, evaluate and persist a requested transition. The item update
    /// and its audit record land in one store transaction.
    pub async fn execute(&self, request: &TransitionRequest) -> Result<ExecutedTransition> {
        let item = self
            .store
            .get_item(request.item_id)
            .await?
            .ok_or_else(|| WorkItemError::item_not_found(request.item_id))?;

        let outcome = self
            .evaluate(
                &item,
                request.trigger,
                request.summary.as_deref(),
                request.status_label.as_deref(),
            )
            .await?;

        let stored = self
            .store
            .apply_transition(&outcome.item, outcome.audit)
            .await?;

        Ok(ExecutedTransition {
            previous: item,
            item: stored,
            reached_terminal: outcome.reached_terminal,
            rank_advanced: outcome.rank_advanced,
        })
    }

    /// Destination role for a trigger, or the state-machine error that
    /// rules it out.
    fn destination(item: &WorkItem, trigger: Trigger) -> Result<Role> {
        match trigger {
            Trigger::Start => match item.role {
                Role::Terminal => Err(WorkItemError::AlreadyTerminal(item.id)),
                Role::Blocked => Err(WorkItemError::ItemBlocked(item.id)),
                role => role
                    .next_on_ladder()
                    .ok_or(WorkItemError::InvalidRoleForTrigger { role, trigger }),
            },
            Trigger::Complete => match item.role {
                Role::Terminal => Err(WorkItemError::AlreadyTerminal(item.id)),
                Role::Blocked => Err(WorkItemError::ItemBlocked(item.id)),
                _ => Ok(Role::Terminal),
            },
            Trigger::Cancel => match item.role {
                Role::Terminal => Err(WorkItemError::AlreadyTerminal(item.id)),
                _ => Ok(Role::Terminal),
            },
            Trigger::Block | Trigger::Hold => match item.role {
                Role::Blocked => Err(WorkItemError::AlreadyBlocked(item.id)),
                Role::Terminal => Err(WorkItemError::CannotBlockTerminal(item.id)),
                _ => Ok(Role::Blocked),
            },
            Trigger::Resume => match item.role {
                Role::Blocked => item
                    .previous_role
                    .ok_or(WorkItemError::MissingPreviousRole(item.id)),
                _ => Err(WorkItemError::NotBlocked(item.id)),
            },
        }
    }
}
