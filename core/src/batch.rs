use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    cascade::{self, CascadeEvent},
    engine::{TransitionEngine, TransitionRequest},
    error::WorkItemError,
    models::BlockerStatus,
    repository::OrchestratorStore,
    roles::Role,
    unblock::{self, UnblockedItem},
};

/// Per-entry result of an `advance_item` batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceEntryResult {
    pub item_id: Uuid,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Unsatisfied blockers when the entry failed with `BLOCKED_BY_DEPENDENCY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockers: Option<Vec<BlockerStatus>>,
    /// Missing gate requirements when the entry failed with `GATE_CHECK_FAILED`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cascade_events: Vec<CascadeEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unblocked_items: Vec<UnblockedItem>,
    /// A cascade failure after the base transition persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl AdvanceEntryResult {
    fn failed(item_id: Uuid, error: &WorkItemError) -> Self {
        let (blockers, gate_errors) = match error {
            WorkItemError::BlockedByDependency(list) => (Some(list.clone()), None),
            WorkItemError::GateCheckFailed(missing) => (None, Some(missing.clone())),
            _ => (None, None),
        };
        Self {
            item_id,
            applied: false,
            previous_role: None,
            new_role: None,
            error: Some(error.to_string()),
            error_code: Some(error.code().to_string()),
            blockers,
            gate_errors,
            cascade_events: Vec::new(),
            unblocked_items: Vec::new(),
            warning: None,
        }
    }
}

/// Batch totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceSummary {
    pub total: u32,
    pub succeeded: u32,
    pub failed: u32,
}

/// Full `advance_item` report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceReport {
    pub results: Vec<AdvanceEntryResult>,
    pub summary: AdvanceSummary,
    /// Union of unblocked items across all successful entries, deduplicated
    /// by id
    pub all_unblocked_items: Vec<UnblockedItem>,
}

/// Apply a list of requested transitions in submitted order.
///
/// Entries are independent: a failure in one never aborts the batch, and
/// each successful entry's item+audit write is one store transaction.
/// Cascade application runs after the base transition in its own
/// transactions; a cascade failure is recorded as a warning on the entry
/// without reversing the base transition. Unblock probes run for the
/// advanced item and for every cascaded parent, union-deduplicated by id.
pub async fn advance_items<S: OrchestratorStore>(
    engine: &TransitionEngine<S>,
    requests: &[TransitionRequest],
) -> AdvanceReport {
    let store = engine.store().clone();
    let mut results = Vec::with_capacity(requests.len());
    let mut all_unblocked: Vec<UnblockedItem> = Vec::new();
    let mut seen_unblocked: BTreeSet<Uuid> = BTreeSet::new();

    for request in requests {
        let executed = match engine.execute(request).await {
            Ok(executed) => executed,
            Err(error) => {
                results.push(AdvanceEntryResult::failed(request.item_id, &error));
                continue;
            }
        };

        let mut cascade_events = Vec::new();
        let mut warning = None;
        if request.apply_cascade && executed.reached_terminal {
            match cascade::run_cascade(store.as_ref(), &executed.item).await {
                Ok(events) => cascade_events = events,
                Err(error) => {
                    warn!(item_id = %request.item_id, %error, "cascade failed after base transition");
                    warning = Some(format!("cascade failed: {error}"));
                }
            }
        }

        let mut unblocked_items = Vec::new();
        if executed.rank_advanced {
            let mut probe_ids = vec![executed.item.id];
            probe_ids.extend(cascade_events.iter().map(|event| event.item_id));

            let mut entry_seen = BTreeSet::new();
            for probe_id in probe_ids {
                match unblock::detect_unblocked(store.as_ref(), probe_id).await {
                    Ok(found) => {
                        for item in found {
                            if entry_seen.insert(item.item_id) {
                                unblocked_items.push(item);
                            }
                        }
                    }
                    Err(error) => {
                        warn!(item_id = %probe_id, %error, "unblock probe failed");
                    }
                }
            }
        }

        for item in &unblocked_items {
            if seen_unblocked.insert(item.item_id) {
                all_unblocked.push(item.clone());
            }
        }

        results.push(AdvanceEntryResult {
            item_id: executed.item.id,
            applied: true,
            previous_role: Some(executed.previous.role),
            new_role: Some(executed.item.role),
            error: None,
            error_code: None,
            blockers: None,
            gate_errors: None,
            cascade_events,
            unblocked_items,
            warning,
        });
    }

    let succeeded = results.iter().filter(|entry| entry.applied).count() as u32;
    let total = results.len() as u32;
    AdvanceReport {
        summary: AdvanceSummary {
            total,
            succeeded,
            failed: total - succeeded,
        },
        results,
        all_unblocked_items: all_unblocked,
    }
}
