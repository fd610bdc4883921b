use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WorkItemError;

/// Lifecycle role of a work item.
///
/// The first four roles form the progression ladder
/// `Queue < Work < Review < Terminal`; `Blocked` sits off the ladder and
/// carries no rank. An item parked in `Blocked` remembers the role it came
/// from in `WorkItem::previous_role`.
///
/// # Examples
///
/// ```rust
/// use item_core::roles::Role;
///
/// assert!(Role::Review.is_at_or_beyond(Role::Work));
/// assert!(!Role::Blocked.is_at_or_beyond(Role::Queue));
/// assert_eq!("TERMINAL".parse::<Role>().unwrap(), Role::Terminal);
/// ```
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Item is waiting to be picked up
    Queue,
    /// Item is actively being worked on
    Work,
    /// Item is under review
    Review,
    /// Item is finished (completed or cancelled)
    Terminal,
    /// Item is parked off the ladder
    Blocked,
}

impl Role {
    /// Ladder rank of this role, `None` for `Blocked`.
    pub fn rank(self) -> Option<u8> {
        match self {
            Role::Queue => Some(0),
            Role::Work => Some(1),
            Role::Review => Some(2),
            Role::Terminal => Some(3),
            Role::Blocked => None,
        }
    }

    /// Whether this role sits on the progression ladder.
    pub fn is_ranked(self) -> bool {
        self.rank().is_some()
    }

    /// True iff both roles are ranked and `self` has reached `threshold`.
    ///
    /// A blocked item is never at-or-beyond any threshold.
    pub fn is_at_or_beyond(self, threshold: Role) -> bool {
        match (self.rank(), threshold.rank()) {
            (Some(current), Some(required)) => current >= required,
            _ => false,
        }
    }

    /// The next role up the ladder, `None` from `Terminal` or `Blocked`.
    pub fn next_on_ladder(self) -> Option<Role> {
        match self {
            Role::Queue => Some(Role::Work),
            Role::Work => Some(Role::Review),
            Role::Review => Some(Role::Terminal),
            Role::Terminal | Role::Blocked => None,
        }
    }

    /// Wire-exact lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Queue => "queue",
            Role::Work => "work",
            Role::Review => "review",
            Role::Terminal => "terminal",
            Role::Blocked => "blocked",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = WorkItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(Role::Queue),
            "work" => Ok(Role::Work),
            "review" => Ok(Role::Review),
            "terminal" => Ok(Role::Terminal),
            "blocked" => Ok(Role::Blocked),
            _ => Err(WorkItemError::InvalidRole(s.to_string())),
        }
    }
}

/// Declarative lifecycle trigger applied to a work item.
///
/// `Block` and `Hold` are an alias pair with identical semantics; the audit
/// trail records whichever spelling the caller used.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Advance one step up the ladder
    Start,
    /// Jump directly to `Terminal`
    Complete,
    /// Terminate with the `cancelled` status label
    Cancel,
    /// Park the item in `Blocked`
    Block,
    /// Alias of `Block`
    Hold,
    /// Restore a blocked item to its previous role
    Resume,
}

impl Trigger {
    /// Wire-exact lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Start => "start",
            Trigger::Complete => "complete",
            Trigger::Cancel => "cancel",
            Trigger::Block => "block",
            Trigger::Hold => "hold",
            Trigger::Resume => "resume",
        }
    }

    /// Whether this trigger parks the item in `Blocked`.
    pub fn is_blocking(self) -> bool {
        matches!(self, Trigger::Block | Trigger::Hold)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = WorkItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Trigger::Start),
            "complete" => Ok(Trigger::Complete),
            "cancel" => Ok(Trigger::Cancel),
            "block" => Ok(Trigger::Block),
            "hold" => Ok(Trigger::Hold),
            "resume" => Ok(Trigger::Resume),
            _ => Err(WorkItemError::InvalidTrigger(s.to_string())),
        }
    }
}

/// Work item priority, ordered `High > Medium > Low` for recommendations.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort weight, higher is more urgent.
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 2,
            Priority::Medium => 1,
            Priority::Low => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = WorkItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(WorkItemError::Validation(format!("unknown priority: '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_order() {
        assert!(Role::Queue.rank() < Role::Work.rank());
        assert!(Role::Work.rank() < Role::Review.rank());
        assert!(Role::Review.rank() < Role::Terminal.rank());
        assert_eq!(Role::Blocked.rank(), None);
    }

    #[test]
    fn test_at_or_beyond() {
        assert!(Role::Terminal.is_at_or_beyond(Role::Queue));
        assert!(Role::Work.is_at_or_beyond(Role::Work));
        assert!(!Role::Queue.is_at_or_beyond(Role::Work));

        // Blocked is never at-or-beyond, on either side
        assert!(!Role::Blocked.is_at_or_beyond(Role::Queue));
        assert!(!Role::Terminal.is_at_or_beyond(Role::Blocked));
    }

    #[test]
    fn test_next_on_ladder() {
        assert_eq!(Role::Queue.next_on_ladder(), Some(Role::Work));
        assert_eq!(Role::Work.next_on_ladder(), Some(Role::Review));
        assert_eq!(Role::Review.next_on_ladder(), Some(Role::Terminal));
        assert_eq!(Role::Terminal.next_on_ladder(), None);
        assert_eq!(Role::Blocked.next_on_ladder(), None);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("queue".parse::<Role>().unwrap(), Role::Queue);
        assert_eq!("REVIEW".parse::<Role>().unwrap(), Role::Review);
        assert_eq!(" terminal ".parse::<Role>().unwrap(), Role::Terminal);
        assert!(matches!(
            "done".parse::<Role>(),
            Err(WorkItemError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_trigger_parsing() {
        assert_eq!("start".parse::<Trigger>().unwrap(), Trigger::Start);
        assert_eq!("HOLD".parse::<Trigger>().unwrap(), Trigger::Hold);
        assert!("hold".parse::<Trigger>().unwrap().is_blocking());
        assert!(matches!(
            "finish".parse::<Trigger>(),
            Err(WorkItemError::InvalidTrigger(_))
        ));
    }

    #[test]
    fn test_wire_names_are_lowercase() {
        for role in [
            Role::Queue,
            Role::Work,
            Role::Review,
            Role::Terminal,
            Role::Blocked,
        ] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
    }

    #[test]
    fn test_priority_weights() {
        assert!(Priority::High.weight() > Priority::Medium.weight());
        assert!(Priority::Medium.weight() > Priority::Low.weight());
        assert_eq!(Priority::default(), Priority::Medium);
    }
}
