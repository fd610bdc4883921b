use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::WorkItem,
    repository::NoteRepository,
    roles::Role,
    schema::NoteSchemaService,
};

/// Outcome of a role-entry gate evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GateStatus {
    /// Whether the item may enter `phase`
    pub can_advance: bool,
    /// Missing requirements: note keys, plus the `"summary"` sentinel when
    /// verification demands a summary that is absent
    pub missing: Vec<String>,
    /// The destination role the gate was evaluated for
    pub phase: Role,
}

impl GateStatus {
    pub fn open(phase: Role) -> Self {
        Self {
            can_advance: true,
            missing: Vec::new(),
            phase,
        }
    }
}

/// Sentinel entry in [`GateStatus::missing`] for an absent summary.
pub const MISSING_SUMMARY: &str = "summary";

/// Evaluate the role-entry gate for `item` entering `dest`.
///
/// Note requirements come from the schema provider keyed by the item's tag
/// set; a requirement applies when its phase is ranked at or below `dest`
/// (it should have been produced before entering `dest`) and is satisfied
/// by a persisted note with a non-empty body. When the item requires
/// verification and `dest` is terminal, the summary — after applying the
/// trigger's proposed summary — must be non-empty.
pub async fn check_gate<S>(
    store: &S,
    schema: &dyn NoteSchemaService,
    item: &WorkItem,
    dest: Role,
    proposed_summary: Option<&str>,
) -> Result<GateStatus>
where
    S: NoteRepository + ?Sized,
{
    let mut missing = Vec::new();

    if let Some(dest_rank) = dest.rank() {
        let requirements = schema.requirements_for(&item.tag_set());
        for req in requirements {
            if !req.required {
                continue;
            }
            let applies = req.role.rank().map_or(false, |r| r <= dest_rank);
            if !applies {
                continue;
            }
            let satisfied = match store.get_note(item.id, &req.key).await? {
                Some(note) => !note.body.trim().is_empty(),
                None => false,
            };
            if !satisfied {
                missing.push(req.key);
            }
        }
    }

    if item.requires_verification && dest == Role::Terminal {
        let effective = proposed_summary.unwrap_or(item.summary.as_str());
        if effective.trim().is_empty() {
            missing.push(MISSING_SUMMARY.to_string());
        }
    }

    Ok(GateStatus {
        can_advance: missing.is_empty(),
        missing,
        phase: dest,
    })
}
