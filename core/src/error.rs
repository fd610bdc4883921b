use thiserror::Error;
use uuid::Uuid;

use crate::models::BlockerStatus;
use crate::roles::{Role, Trigger};

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, WorkItemError>;

/// Error taxonomy for the work-item orchestration engine.
///
/// The variants fall into five families: input validation, state-machine
/// violations, gating (dependency blockers and role-entry gates), graph
/// integrity, and persistence. Each carries enough structure for the tool
/// layer to report per-entry failures without re-parsing messages, and maps
/// to a stable wire code via [`WorkItemError::code`].
///
/// # Examples
///
/// ```rust
/// use item_core::error::WorkItemError;
/// use uuid::Uuid;
///
/// let err = WorkItemError::AlreadyTerminal(Uuid::nil());
/// assert_eq!(err.code(), "ALREADY_TERMINAL");
/// assert_eq!(err.status_code(), 422);
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkItemError {
    /// Entity not found by the given identifier
    #[error("not found: {0}")]
    NotFound(String),

    /// Input validation failure
    #[error("validation error: {0}")]
    Validation(String),

    /// Unparseable role name
    #[error("unknown role: '{0}'")]
    InvalidRole(String),

    /// Unparseable trigger name
    #[error("unknown trigger: '{0}'")]
    InvalidTrigger(String),

    /// Trigger applied to a role it has no path from
    #[error("trigger '{trigger}' is not valid for role '{role}'")]
    InvalidRoleForTrigger { role: Role, trigger: Trigger },

    /// Terminal items accept no further transitions
    #[error("item {0} is already terminal")]
    AlreadyTerminal(Uuid),

    /// `block`/`hold` on an item already parked
    #[error("item {0} is already blocked")]
    AlreadyBlocked(Uuid),

    /// `resume` on an item that is not blocked
    #[error("item {0} is not blocked")]
    NotBlocked(Uuid),

    /// Ladder trigger on a blocked item; it must be resumed first
    #[error("item {0} is blocked; resume it before advancing")]
    ItemBlocked(Uuid),

    /// `block`/`hold` on a terminal item
    #[error("item {0} is terminal and cannot be blocked")]
    CannotBlockTerminal(Uuid),

    /// Blocked item without a recorded previous role (data corruption)
    #[error("item {0} is blocked without a recorded previous role")]
    MissingPreviousRole(Uuid),

    /// Transition gated by unsatisfied incoming blockers
    #[error("transition blocked by {} unsatisfied dependencies", .0.len())]
    BlockedByDependency(Vec<BlockerStatus>),

    /// Role-entry gate rejected the transition; carries the missing keys
    #[error("gate check failed, missing: {}", .0.join(", "))]
    GateCheckFailed(Vec<String>),

    /// Blocking edge would close a cycle
    #[error("cyclic dependency: {0}")]
    CyclicDependency(String),

    /// `(from, to, type)` edge already exists
    #[error("duplicate dependency: {0}")]
    DuplicateDependency(String),

    /// An item cannot depend on itself
    #[error("item {0} cannot depend on itself")]
    SelfDependency(Uuid),

    /// Hierarchy or cascade depth bound exceeded
    #[error("maximum hierarchy depth exceeded")]
    MaxDepthExceeded,

    /// Unique-constraint conflict
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying store failure
    #[error("database error: {0}")]
    Database(String),

    /// JSON encode/decode failure
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Transport/protocol failure
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Configuration failure
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkItemError {
    /// Create a not-found error for a work item id
    pub fn item_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("work item {id}"))
    }

    /// Create a not-found error for a dependency id
    pub fn dependency_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("dependency {id}"))
    }

    /// Create a validation error for an empty field
    pub fn empty_field(field: &str) -> Self {
        Self::Validation(format!("field '{field}' cannot be empty"))
    }

    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorkItemError::NotFound(_))
    }

    /// Check if this error indicates a validation problem
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkItemError::Validation(_)
                | WorkItemError::InvalidRole(_)
                | WorkItemError::InvalidTrigger(_)
        )
    }

    /// Stable wire code used in the tool result envelope
    pub fn code(&self) -> &'static str {
        match self {
            WorkItemError::NotFound(_) => "NOT_FOUND",
            WorkItemError::Validation(_) => "VALIDATION",
            WorkItemError::InvalidRole(_) => "INVALID_ROLE",
            WorkItemError::InvalidTrigger(_) => "INVALID_TRIGGER",
            WorkItemError::InvalidRoleForTrigger { .. } => "INVALID_ROLE_FOR_TRIGGER",
            WorkItemError::AlreadyTerminal(_) => "ALREADY_TERMINAL",
            WorkItemError::AlreadyBlocked(_) => "ALREADY_BLOCKED",
            WorkItemError::NotBlocked(_) => "NOT_BLOCKED",
            WorkItemError::ItemBlocked(_) => "ITEM_BLOCKED",
            WorkItemError::CannotBlockTerminal(_) => "CANNOT_BLOCK_TERMINAL",
            WorkItemError::MissingPreviousRole(_) => "MISSING_PREVIOUS_ROLE",
            WorkItemError::BlockedByDependency(_) => "BLOCKED_BY_DEPENDENCY",
            WorkItemError::GateCheckFailed(_) => "GATE_CHECK_FAILED",
            WorkItemError::CyclicDependency(_) => "CYCLIC_DEPENDENCY",
            WorkItemError::DuplicateDependency(_) => "DUPLICATE_DEPENDENCY",
            WorkItemError::SelfDependency(_) => "SELF_DEPENDENCY",
            WorkItemError::MaxDepthExceeded => "MAX_DEPTH_EXCEEDED",
            WorkItemError::Conflict(_) => "CONFLICT",
            WorkItemError::Database(_) => "DATABASE",
            WorkItemError::Serialization(_) => "SERIALIZATION",
            WorkItemError::Protocol(_) => "PROTOCOL",
            WorkItemError::Configuration(_) => "CONFIGURATION",
            WorkItemError::Internal(_) => "INTERNAL",
        }
    }

    /// Convert to an HTTP status code equivalent
    pub fn status_code(&self) -> u16 {
        match self {
            WorkItemError::NotFound(_) => 404,
            WorkItemError::Validation(_)
            | WorkItemError::InvalidRole(_)
            | WorkItemError::InvalidTrigger(_) => 400,
            WorkItemError::InvalidRoleForTrigger { .. }
            | WorkItemError::AlreadyTerminal(_)
            | WorkItemError::AlreadyBlocked(_)
            | WorkItemError::NotBlocked(_)
            | WorkItemError::ItemBlocked(_)
            | WorkItemError::CannotBlockTerminal(_)
            | WorkItemError::MissingPreviousRole(_)
            | WorkItemError::BlockedByDependency(_)
            | WorkItemError::GateCheckFailed(_)
            | WorkItemError::MaxDepthExceeded => 422,
            WorkItemError::CyclicDependency(_)
            | WorkItemError::DuplicateDependency(_)
            | WorkItemError::SelfDependency(_)
            | WorkItemError::Conflict(_) => 409,
            WorkItemError::Database(_)
            | WorkItemError::Serialization(_)
            | WorkItemError::Protocol(_)
            | WorkItemError::Configuration(_)
            | WorkItemError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let id = Uuid::nil();
        assert_eq!(WorkItemError::item_not_found(id).code(), "NOT_FOUND");
        assert_eq!(WorkItemError::AlreadyTerminal(id).code(), "ALREADY_TERMINAL");
        assert_eq!(
            WorkItemError::BlockedByDependency(vec![]).code(),
            "BLOCKED_BY_DEPENDENCY"
        );
        assert_eq!(
            WorkItemError::GateCheckFailed(vec!["summary".into()]).code(),
            "GATE_CHECK_FAILED"
        );
    }

    #[test]
    fn test_status_codes() {
        let id = Uuid::nil();
        assert_eq!(WorkItemError::item_not_found(id).status_code(), 404);
        assert_eq!(WorkItemError::empty_field("title").status_code(), 400);
        assert_eq!(WorkItemError::SelfDependency(id).status_code(), 409);
        assert_eq!(WorkItemError::AlreadyTerminal(id).status_code(), 422);
        assert_eq!(WorkItemError::Database("down".into()).status_code(), 500);
    }

    #[test]
    fn test_predicates() {
        assert!(WorkItemError::NotFound("x".into()).is_not_found());
        assert!(!WorkItemError::Validation("x".into()).is_not_found());
        assert!(WorkItemError::InvalidRole("done".into()).is_validation());
        assert!(WorkItemError::InvalidTrigger("finish".into()).is_validation());
    }

    #[test]
    fn test_gate_failure_message_lists_keys() {
        let err =
            WorkItemError::GateCheckFailed(vec!["acceptance-criteria".into(), "summary".into()]);
        assert_eq!(
            err.to_string(),
            "gate check failed, missing: acceptance-criteria, summary"
        );
    }
}
