use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::WorkItemError;
use crate::roles::{Priority, Role};

/// Maximum hierarchy depth; a root item sits at depth 0.
pub const MAX_DEPTH: i64 = 3;

/// Maximum length of the short summary field.
pub const MAX_SUMMARY_LEN: usize = 500;

/// Maximum length of a note key.
pub const MAX_NOTE_KEY_LEN: usize = 200;

/// A node in the work-item hierarchy.
///
/// Items are created in `Queue` and driven through the role ladder by
/// triggers; all role, status-label and previous-role mutations go through
/// the transition engine. `depth` is derived from the parent chain and never
/// exceeds [`MAX_DEPTH`]. `modified_at` is strictly monotone: every mutation
/// produces a timestamp strictly greater than the previous one.
///
/// # Examples
///
/// ```rust
/// use item_core::models::{NewWorkItem, WorkItem};
/// use item_core::roles::{Priority, Role};
///
/// let new = NewWorkItem {
///     title: "Wire up the persistence layer".to_string(),
///     ..Default::default()
/// };
/// let item = WorkItem::from_new(new, None).unwrap();
/// assert_eq!(item.role, Role::Queue);
/// assert_eq!(item.depth, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Unique identifier
    pub id: Uuid,
    /// Owning parent, `None` for root items
    pub parent_id: Option<Uuid>,
    /// Non-empty title
    pub title: String,
    /// Optional long-form description
    pub description: Option<String>,
    /// Short summary, at most [`MAX_SUMMARY_LEN`] characters
    pub summary: String,
    /// Current lifecycle role
    pub role: Role,
    /// Role held before entering `Blocked`; only set while blocked
    pub previous_role: Option<Role>,
    /// Short textual qualifier on terminal transitions (e.g. `"cancelled"`)
    pub status_label: Option<String>,
    /// Scheduling priority
    pub priority: Priority,
    /// Complexity estimate in 1..=10
    pub complexity: i64,
    /// Whether a non-empty summary is required before entering `Terminal`
    pub requires_verification: bool,
    /// Distance from the root of the hierarchy, 0..=[`MAX_DEPTH`]
    pub depth: i64,
    /// Freeform metadata
    pub metadata: Option<serde_json::Value>,
    /// Comma-joined lower-case kebab tags
    pub tags: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp, strictly monotone
    pub modified_at: DateTime<Utc>,
}

impl WorkItem {
    /// Build a fresh item from creation input, deriving depth from the
    /// parent snapshot. Fails when the derived depth would exceed
    /// [`MAX_DEPTH`].
    pub fn from_new(new: NewWorkItem, parent: Option<&WorkItem>) -> crate::error::Result<Self> {
        let depth = match parent {
            None => 0,
            Some(p) => p.depth + 1,
        };
        if depth > MAX_DEPTH {
            return Err(WorkItemError::Validation(format!(
                "depth {depth} exceeds the maximum of {MAX_DEPTH}"
            )));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            parent_id: parent.map(|p| p.id),
            title: new.title,
            description: new.description,
            summary: new.summary,
            role: Role::Queue,
            previous_role: None,
            status_label: None,
            priority: new.priority,
            complexity: new.complexity,
            requires_verification: new.requires_verification,
            depth,
            metadata: new.metadata,
            tags: new.tags,
            created_at: now,
            modified_at: now,
        })
    }

    /// Parsed tag set: trimmed, lower-cased, empty entries dropped.
    pub fn tag_set(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.role == Role::Terminal
    }

    pub fn is_blocked(&self) -> bool {
        self.role == Role::Blocked
    }

    /// Next `modified_at` value, strictly greater than the current one even
    /// when the wall clock has not advanced.
    pub fn next_modified_at(&self) -> DateTime<Utc> {
        let now = Utc::now();
        if now > self.modified_at {
            now
        } else {
            self.modified_at + Duration::milliseconds(1)
        }
    }
}

/// Creation input for a work item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkItem {
    /// Owning parent id, if any
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Non-empty title
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_complexity")]
    pub complexity: i64,
    #[serde(default)]
    pub requires_verification: bool,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub tags: Option<String>,
}

fn default_complexity() -> i64 {
    5
}

impl Default for NewWorkItem {
    fn default() -> Self {
        Self {
            parent_id: None,
            title: String::new(),
            description: None,
            summary: String::new(),
            priority: Priority::Medium,
            complexity: default_complexity(),
            requires_verification: false,
            metadata: None,
            tags: None,
        }
    }
}

/// Partial update for a work item.
///
/// Outer `Option` means "field present in the request"; the inner `Option`
/// on clearable fields distinguishes "set to value" from "clear".
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkItem {
    pub title: Option<String>,
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    pub summary: Option<String>,
    pub priority: Option<Priority>,
    pub complexity: Option<i64>,
    pub requires_verification: Option<bool>,
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Option<serde_json::Value>>,
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Option<String>>,
}

/// Serde adapter keeping `null` distinct from "absent" for `Option<Option<T>>`.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Ok(Some(Option::deserialize(deserializer)?))
    }
}

/// Filter criteria for listing work items; fields combine with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemFilter {
    pub parent_id: Option<Uuid>,
    pub role: Option<Role>,
    pub priority: Option<Priority>,
    /// Matches items whose tag set contains this tag
    pub tag: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Typed edge between two work items.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
pub enum DependencyType {
    /// `from` gates `to`
    #[serde(rename = "BLOCKS")]
    Blocks,
    /// `from` is gated by `to` (semantic dual of `BLOCKS`, persisted literally)
    #[serde(rename = "IS_BLOCKED_BY")]
    IsBlockedBy,
    /// Informational link, never blocking
    #[serde(rename = "RELATES_TO")]
    RelatesTo,
}

impl DependencyType {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyType::Blocks => "BLOCKS",
            DependencyType::IsBlockedBy => "IS_BLOCKED_BY",
            DependencyType::RelatesTo => "RELATES_TO",
        }
    }

    pub fn is_blocking(self) -> bool {
        !matches!(self, DependencyType::RelatesTo)
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = WorkItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BLOCKS" => Ok(DependencyType::Blocks),
            "IS_BLOCKED_BY" => Ok(DependencyType::IsBlockedBy),
            "RELATES_TO" => Ok(DependencyType::RelatesTo),
            _ => Err(WorkItemError::Validation(format!(
                "unknown dependency type: '{s}'"
            ))),
        }
    }
}

/// A persisted dependency edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub id: Uuid,
    pub from_item_id: Uuid,
    pub to_item_id: Uuid,
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    /// Role threshold (lower-case name) at which the blocker releases
    pub unblock_at: Option<Role>,
    pub created_at: DateTime<Utc>,
}

impl Dependency {
    /// Threshold the blocker must reach: `unblock_at` if set, else
    /// `terminal` for blocking edges, `None` for `RELATES_TO`.
    pub fn effective_unblock_role(&self) -> Option<Role> {
        if self.dependency_type.is_blocking() {
            Some(self.unblock_at.unwrap_or(Role::Terminal))
        } else {
            None
        }
    }

    /// Blocker side of this edge when it gates `item`; `None` if it does not.
    pub fn blocker_for(&self, item: Uuid) -> Option<Uuid> {
        match self.dependency_type {
            DependencyType::Blocks if self.to_item_id == item => Some(self.from_item_id),
            DependencyType::IsBlockedBy if self.from_item_id == item => Some(self.to_item_id),
            _ => None,
        }
    }

    /// Gated side of this edge when `item` is the blocker; `None` otherwise.
    pub fn blocked_by(&self, item: Uuid) -> Option<Uuid> {
        match self.dependency_type {
            DependencyType::Blocks if self.from_item_id == item => Some(self.to_item_id),
            DependencyType::IsBlockedBy if self.to_item_id == item => Some(self.from_item_id),
            _ => None,
        }
    }
}

/// Creation input for a dependency edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewDependency {
    pub from_item_id: Uuid,
    pub to_item_id: Uuid,
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    #[serde(default)]
    pub unblock_at: Option<Role>,
}

/// Status of one incoming blocker of an item, as evaluated against its
/// threshold. Surfaces both in `BlockedByDependency` failures and in the
/// advisory blocked-item listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockerStatus {
    pub blocker_id: Uuid,
    /// Title of the blocker, `None` when the blocker row is missing
    pub blocker_title: Option<String>,
    /// Current role of the blocker, `None` when the blocker row is missing
    pub blocker_role: Option<Role>,
    pub required_role: Role,
    pub satisfied: bool,
}

/// Accountability note attached to a work item, consulted by gate checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub item_id: Uuid,
    /// Non-blank key, unique per item, at most [`MAX_NOTE_KEY_LEN`] chars
    pub key: String,
    /// Ladder phase the note belongs to: `queue`, `work` or `review`
    pub role: Role,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Upsert input for a note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteUpsert {
    pub item_id: Uuid,
    pub key: String,
    pub role: Role,
    #[serde(default)]
    pub body: String,
}

/// Append-only audit record of a role transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleTransition {
    pub id: Uuid,
    pub item_id: Uuid,
    pub from_role: Role,
    pub to_role: Role,
    pub from_status_label: Option<String>,
    pub to_status_label: Option<String>,
    /// Trigger spelling as submitted (`start`, `hold`, `cascade`, ...)
    pub trigger: String,
    pub summary: Option<String>,
    pub transitioned_at: DateTime<Utc>,
}

/// Audit record awaiting persistence, written atomically with its item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewRoleTransition {
    pub item_id: Uuid,
    pub from_role: Role,
    pub to_role: Role,
    pub from_status_label: Option<String>,
    pub to_status_label: Option<String>,
    pub trigger: String,
    pub summary: Option<String>,
    pub transitioned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> WorkItem {
        WorkItem::from_new(
            NewWorkItem {
                title: title.to_string(),
                ..Default::default()
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_from_new_derives_depth() {
        let root = item("root");
        assert_eq!(root.depth, 0);
        assert_eq!(root.parent_id, None);
        assert_eq!(root.role, Role::Queue);

        let child = WorkItem::from_new(
            NewWorkItem {
                title: "child".to_string(),
                ..Default::default()
            },
            Some(&root),
        )
        .unwrap();
        assert_eq!(child.depth, 1);
        assert_eq!(child.parent_id, Some(root.id));
    }

    #[test]
    fn test_from_new_rejects_excess_depth() {
        let mut deep = item("deep");
        deep.depth = MAX_DEPTH;
        let result = WorkItem::from_new(
            NewWorkItem {
                title: "too deep".to_string(),
                ..Default::default()
            },
            Some(&deep),
        );
        assert!(matches!(result, Err(WorkItemError::Validation(_))));
    }

    #[test]
    fn test_tag_set_parsing() {
        let mut it = item("tagged");
        it.tags = Some(" Feature-Task, bug-fix ,,infra ".to_string());
        assert_eq!(it.tag_set(), vec!["feature-task", "bug-fix", "infra"]);

        it.tags = None;
        assert!(it.tag_set().is_empty());
    }

    #[test]
    fn test_next_modified_at_is_strictly_monotone() {
        let mut it = item("clock");
        // Pin modified_at in the future to force the +1ms fallback.
        it.modified_at = Utc::now() + Duration::seconds(60);
        let next = it.next_modified_at();
        assert!(next > it.modified_at);
        assert_eq!(next, it.modified_at + Duration::milliseconds(1));
    }

    #[test]
    fn test_effective_unblock_role_defaults() {
        let now = Utc::now();
        let mut dep = Dependency {
            id: Uuid::new_v4(),
            from_item_id: Uuid::new_v4(),
            to_item_id: Uuid::new_v4(),
            dependency_type: DependencyType::Blocks,
            unblock_at: None,
            created_at: now,
        };
        assert_eq!(dep.effective_unblock_role(), Some(Role::Terminal));

        dep.unblock_at = Some(Role::Work);
        assert_eq!(dep.effective_unblock_role(), Some(Role::Work));

        dep.dependency_type = DependencyType::RelatesTo;
        assert_eq!(dep.effective_unblock_role(), None);
    }

    #[test]
    fn test_blocker_normalization() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let now = Utc::now();

        let blocks = Dependency {
            id: Uuid::new_v4(),
            from_item_id: a,
            to_item_id: b,
            dependency_type: DependencyType::Blocks,
            unblock_at: None,
            created_at: now,
        };
        // A blocks B: B's incoming blocker is A, A's outgoing target is B.
        assert_eq!(blocks.blocker_for(b), Some(a));
        assert_eq!(blocks.blocker_for(a), None);
        assert_eq!(blocks.blocked_by(a), Some(b));

        let dual = Dependency {
            dependency_type: DependencyType::IsBlockedBy,
            ..blocks.clone()
        };
        // A is-blocked-by B: A's incoming blocker is B.
        assert_eq!(dual.blocker_for(a), Some(b));
        assert_eq!(dual.blocked_by(b), Some(a));
    }

    #[test]
    fn test_dependency_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&DependencyType::IsBlockedBy).unwrap(),
            "\"IS_BLOCKED_BY\""
        );
        assert_eq!(
            "blocks".parse::<DependencyType>().unwrap(),
            DependencyType::Blocks
        );
    }

    #[test]
    fn test_update_distinguishes_clear_from_absent() {
        let absent: UpdateWorkItem = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent_id, None);

        let cleared: UpdateWorkItem = serde_json::from_str(r#"{"parentId": null}"#).unwrap();
        assert_eq!(cleared.parent_id, Some(None));
    }
}
