//! Fluent builders for test fixtures

use chrono::{DateTime, Utc};
use uuid::Uuid;

use item_core::{
    models::{Dependency, DependencyType, WorkItem},
    roles::{Priority, Role},
};

/// Builder for work-item fixtures; defaults to a root item in `Queue`.
pub struct WorkItemBuilder {
    item: WorkItem,
}

impl Default for WorkItemBuilder {
    fn default() -> Self {
        Self::new("test item")
    }
}

impl WorkItemBuilder {
    pub fn new(title: &str) -> Self {
        let now = Utc::now();
        Self {
            item: WorkItem {
                id: Uuid::new_v4(),
                parent_id: None,
                title: title.to_string(),
                description: None,
                summary: String::new(),
                role: Role::Queue,
                previous_role: None,
                status_label: None,
                priority: Priority::Medium,
                complexity: 5,
                requires_verification: false,
                depth: 0,
                metadata: None,
                tags: None,
                created_at: now,
                modified_at: now,
            },
        }
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.item.id = id;
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.item.role = role;
        self
    }

    pub fn previous_role(mut self, role: Role) -> Self {
        self.item.previous_role = Some(role);
        self
    }

    pub fn child_of(mut self, parent: &WorkItem) -> Self {
        self.item.parent_id = Some(parent.id);
        self.item.depth = parent.depth + 1;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.item.priority = priority;
        self
    }

    pub fn complexity(mut self, complexity: i64) -> Self {
        self.item.complexity = complexity;
        self
    }

    pub fn summary(mut self, summary: &str) -> Self {
        self.item.summary = summary.to_string();
        self
    }

    pub fn requires_verification(mut self) -> Self {
        self.item.requires_verification = true;
        self
    }

    pub fn tags(mut self, tags: &str) -> Self {
        self.item.tags = Some(tags.to_string());
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.item.created_at = at;
        self.item.modified_at = at;
        self
    }

    pub fn build(self) -> WorkItem {
        self.item
    }
}

/// Build a blocking edge `blocker BLOCKS blocked` with an optional
/// threshold.
pub fn blocks(blocker: &WorkItem, blocked: &WorkItem, unblock_at: Option<Role>) -> Dependency {
    Dependency {
        id: Uuid::new_v4(),
        from_item_id: blocker.id,
        to_item_id: blocked.id,
        dependency_type: DependencyType::Blocks,
        unblock_at,
        created_at: Utc::now(),
    }
}

/// Build the literal dual: `gated IS_BLOCKED_BY blocker`.
pub fn is_blocked_by(gated: &WorkItem, blocker: &WorkItem, unblock_at: Option<Role>) -> Dependency {
    Dependency {
        id: Uuid::new_v4(),
        from_item_id: gated.id,
        to_item_id: blocker.id,
        dependency_type: DependencyType::IsBlockedBy,
        unblock_at,
        created_at: Utc::now(),
    }
}

/// Build an informational `RELATES_TO` edge.
pub fn relates_to(from: &WorkItem, to: &WorkItem) -> Dependency {
    Dependency {
        id: Uuid::new_v4(),
        from_item_id: from.id,
        to_item_id: to.id,
        dependency_type: DependencyType::RelatesTo,
        unblock_at: None,
        created_at: Utc::now(),
    }
}
