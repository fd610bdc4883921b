use crate::common::{
    row_to_dependency, row_to_item, row_to_note, row_to_transition, sqlx_error,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, QueryBuilder, Row, SqlitePool};
use std::collections::HashMap;
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

const ITEM_COLUMNS: &str = "id, parent_id, title, description, summary, role, previous_role, \
     status_label, priority, complexity, requires_verification, depth, metadata, tags, \
     created_at, modified_at";

const DEPENDENCY_COLUMNS: &str =
    "id, from_item_id, to_item_id, \"type\", unblock_at, created_at";

const NOTE_COLUMNS: &str = "id, item_id, \"key\", role, body, created_at, modified_at";

const TRANSITION_COLUMNS: &str = "id, item_id, from_role, to_role, from_status_label, \
     to_status_label, \"trigger\", summary, transitioned_at";

/// SQLite implementation of the orchestrator store.
///
/// One pool serves all four repository contracts. File databases run in
/// WAL mode with foreign keys on; in-memory databases are pinned to a
/// single connection so every caller sees the same data.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a SQLite database URL (file path or `:memory:`).
    ///
    /// # Examples
    /// ```rust,no_run
    /// use database::SqliteStore;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = SqliteStore::new(":memory:").await?;
    /// store.migrate().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:");
        let path = database_url.trim_start_matches("sqlite://");

        let connect_options = if in_memory {
            sqlx::sqlite::SqliteConnectOptions::new()
                .in_memory(true)
                .foreign_keys(true)
        } else {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        };

        let pool_options = if in_memory {
            // A pooled :memory: database is one database per connection;
            // pin the pool to a single connection that never expires.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(sqlx_error)?;

        Ok(Self { pool })
    }

    /// Create the schema when missing. Idempotent; runs at startup.
    pub async fn migrate(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS work_items (
                id TEXT PRIMARY KEY,
                parent_id TEXT NULL REFERENCES work_items(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT NULL,
                summary TEXT NOT NULL DEFAULT '',
                role TEXT NOT NULL,
                previous_role TEXT NULL,
                status_label TEXT NULL,
                priority TEXT NOT NULL,
                complexity INTEGER NOT NULL CHECK (complexity BETWEEN 1 AND 10),
                requires_verification INTEGER NOT NULL DEFAULT 0,
                depth INTEGER NOT NULL CHECK (depth BETWEEN 0 AND 3),
                metadata TEXT NULL,
                tags TEXT NULL,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_work_items_parent ON work_items(parent_id)",
            "CREATE INDEX IF NOT EXISTS idx_work_items_role ON work_items(role)",
            r#"
            CREATE TABLE IF NOT EXISTS dependencies (
                id TEXT PRIMARY KEY,
                from_item_id TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
                to_item_id TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
                "type" TEXT NOT NULL,
                unblock_at TEXT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(from_item_id, to_item_id, "type")
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_dependencies_from ON dependencies(from_item_id)",
            "CREATE INDEX IF NOT EXISTS idx_dependencies_to ON dependencies(to_item_id)",
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                item_id TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
                "key" TEXT NOT NULL,
                role TEXT NOT NULL,
                body TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                UNIQUE(item_id, "key")
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS role_transitions (
                id TEXT PRIMARY KEY,
                item_id TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
                from_role TEXT NOT NULL,
                to_role TEXT NOT NULL,
                from_status_label TEXT NULL,
                to_status_label TEXT NULL,
                "trigger" TEXT NOT NULL,
                summary TEXT NULL,
                transitioned_at TEXT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_role_transitions_item ON role_transitions(item_id)",
            "CREATE INDEX IF NOT EXISTS idx_role_transitions_at ON role_transitions(transitioned_at)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(sqlx_error)?;
        }

        tracing::info!("database schema ready");
        Ok(())
    }

    /// Direct pool access for test scaffolding.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl WorkItemRepository for SqliteStore {
    async fn insert_item(&self, item: WorkItem) -> Result<WorkItem> {
        sqlx::query(
            r#"
            INSERT INTO work_items (id, parent_id, title, description, summary, role,
                previous_role, status_label, priority, complexity, requires_verification,
                depth, metadata, tags, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.id.to_string())
        .bind(item.parent_id.map(|id| id.to_string()))
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.summary)
        .bind(item.role.as_str())
        .bind(item.previous_role.map(|role| role.as_str()))
        .bind(&item.status_label)
        .bind(item.priority.as_str())
        .bind(item.complexity)
        .bind(item.requires_verification)
        .bind(item.depth)
        .bind(item.metadata.as_ref().map(|value| value.to_string()))
        .bind(&item.tags)
        .bind(item.created_at)
        .bind(item.modified_at)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error)?;

        Ok(item)
    }

    async fn save_item(&self, item: &WorkItem) -> Result<WorkItem> {
        let result = sqlx::query(
            r#"
            UPDATE work_items SET parent_id = ?, title = ?, description = ?, summary = ?,
                role = ?, previous_role = ?, status_label = ?, priority = ?, complexity = ?,
                requires_verification = ?, depth = ?, metadata = ?, tags = ?, modified_at = ?
            WHERE id = ?
            "#,
        )
        .bind(item.parent_id.map(|id| id.to_string()))
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.summary)
        .bind(item.role.as_str())
        .bind(item.previous_role.map(|role| role.as_str()))
        .bind(&item.status_label)
        .bind(item.priority.as_str())
        .bind(item.complexity)
        .bind(item.requires_verification)
        .bind(item.depth)
        .bind(item.metadata.as_ref().map(|value| value.to_string()))
        .bind(&item.tags)
        .bind(item.modified_at)
        .bind(item.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(WorkItemError::item_not_found(item.id));
        }
        Ok(item.clone())
    }

    async fn save_items(&self, items: &[WorkItem]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error)?;
        for item in items {
            let result = sqlx::query(
                r#"
                UPDATE work_items SET parent_id = ?, title = ?, description = ?, summary = ?,
                    role = ?, previous_role = ?, status_label = ?, priority = ?, complexity = ?,
                    requires_verification = ?, depth = ?, metadata = ?, tags = ?, modified_at = ?
                WHERE id = ?
                "#,
            )
            .bind(item.parent_id.map(|id| id.to_string()))
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.summary)
            .bind(item.role.as_str())
            .bind(item.previous_role.map(|role| role.as_str()))
            .bind(&item.status_label)
            .bind(item.priority.as_str())
            .bind(item.complexity)
            .bind(item.requires_verification)
            .bind(item.depth)
            .bind(item.metadata.as_ref().map(|value| value.to_string()))
            .bind(&item.tags)
            .bind(item.modified_at)
            .bind(item.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(sqlx_error)?;

            if result.rows_affected() == 0 {
                return Err(WorkItemError::item_not_found(item.id));
            }
        }
        tx.commit().await.map_err(sqlx_error)
    }

    async fn delete_item(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM work_items WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(WorkItemError::item_not_found(id));
        }
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<WorkItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM work_items WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error)?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn list_items(&self, filter: WorkItemFilter) -> Result<Vec<WorkItem>> {
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM work_items"));
        let mut has_conditions = false;

        let mut push_clause = |builder: &mut QueryBuilder<sqlx::Sqlite>, has: &mut bool| {
            builder.push(if *has { " AND " } else { " WHERE " });
            *has = true;
        };

        if let Some(parent_id) = filter.parent_id {
            push_clause(&mut builder, &mut has_conditions);
            builder.push("parent_id = ");
            builder.push_bind(parent_id.to_string());
        }
        if let Some(role) = filter.role {
            push_clause(&mut builder, &mut has_conditions);
            builder.push("role = ");
            builder.push_bind(role.as_str());
        }
        if let Some(priority) = filter.priority {
            push_clause(&mut builder, &mut has_conditions);
            builder.push("priority = ");
            builder.push_bind(priority.as_str());
        }
        if let Some(ref tag) = filter.tag {
            push_clause(&mut builder, &mut has_conditions);
            builder.push("(',' || LOWER(REPLACE(IFNULL(tags, ''), ' ', '')) || ',') LIKE ");
            builder.push_bind(format!("%,{},%", tag.trim().to_ascii_lowercase()));
        }

        builder.push(" ORDER BY created_at ASC, id ASC");
        if filter.limit.is_some() || filter.offset.is_some() {
            builder.push(" LIMIT ");
            builder.push_bind(filter.limit.map(i64::from).unwrap_or(-1));
            builder.push(" OFFSET ");
            builder.push_bind(filter.offset.map(i64::from).unwrap_or(0));
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error)?;
        rows.iter().map(row_to_item).collect()
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM work_items WHERE parent_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(parent_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error)?;

        rows.iter().map(row_to_item).collect()
    }

    async fn children_role_counts(&self, parent_id: Uuid) -> Result<HashMap<Role, u64>> {
        let rows = sqlx::query(
            "SELECT role, COUNT(*) AS total FROM work_items WHERE parent_id = ? GROUP BY role",
        )
        .bind(parent_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error)?;

        let mut counts = HashMap::new();
        for row in rows {
            let role: String = row.get("role");
            let role: Role = role
                .parse()
                .map_err(|_| WorkItemError::Database(format!("invalid role '{role}'")))?;
            let total: i64 = row.get("total");
            counts.insert(role, total as u64);
        }
        Ok(counts)
    }

    async fn descendants_of(&self, root_id: Uuid) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query(&format!(
            r#"
            WITH RECURSIVE subtree(id) AS (
                SELECT id FROM work_items WHERE parent_id = ?
                UNION ALL
                SELECT w.id FROM work_items w JOIN subtree s ON w.parent_id = s.id
            )
            SELECT {ITEM_COLUMNS} FROM work_items
            WHERE id IN (SELECT id FROM subtree)
            ORDER BY depth ASC, created_at ASC, id ASC
            "#
        ))
        .bind(root_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error)?;

        rows.iter().map(row_to_item).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error)?;
        Ok(())
    }

    async fn apply_transition(
        &self,
        item: &WorkItem,
        audit: NewRoleTransition,
    ) -> Result<WorkItem> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error)?;

        // The role predicate is the optimistic-concurrency guard: a
        // concurrent writer that already moved the item makes this a no-op.
        let result = sqlx::query(
            r#"
            UPDATE work_items SET role = ?, previous_role = ?, status_label = ?, summary = ?,
                modified_at = ?
            WHERE id = ? AND role = ?
            "#,
        )
        .bind(item.role.as_str())
        .bind(item.previous_role.map(|role| role.as_str()))
        .bind(&item.status_label)
        .bind(&item.summary)
        .bind(item.modified_at)
        .bind(item.id.to_string())
        .bind(audit.from_role.as_str())
        .execute(&mut *tx)
        .await
        .map_err(sqlx_error)?;

        if result.rows_affected() == 0 {
            let current = sqlx::query("SELECT role FROM work_items WHERE id = ?")
                .bind(item.id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(sqlx_error)?;
            return match current {
                None => Err(WorkItemError::item_not_found(item.id)),
                Some(row) => {
                    let role: String = row.get("role");
                    Err(WorkItemError::Conflict(format!(
                        "item {} is '{role}', expected '{}'",
                        item.id, audit.from_role
                    )))
                }
            };
        }

        sqlx::query(
            r#"
            INSERT INTO role_transitions (id, item_id, from_role, to_role, from_status_label,
                to_status_label, "trigger", summary, transitioned_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(audit.item_id.to_string())
        .bind(audit.from_role.as_str())
        .bind(audit.to_role.as_str())
        .bind(&audit.from_status_label)
        .bind(&audit.to_status_label)
        .bind(&audit.trigger)
        .bind(&audit.summary)
        .bind(audit.transitioned_at)
        .execute(&mut *tx)
        .await
        .map_err(sqlx_error)?;

        tx.commit().await.map_err(sqlx_error)?;
        Ok(item.clone())
    }
}

#[async_trait]
impl DependencyRepository for SqliteStore {
    async fn insert_dependency(&self, dependency: Dependency) -> Result<Dependency> {
        sqlx::query(
            r#"
            INSERT INTO dependencies (id, from_item_id, to_item_id, "type", unblock_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(dependency.id.to_string())
        .bind(dependency.from_item_id.to_string())
        .bind(dependency.to_item_id.to_string())
        .bind(dependency.dependency_type.as_str())
        .bind(dependency.unblock_at.map(|role| role.as_str()))
        .bind(dependency.created_at)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error)?;

        Ok(dependency)
    }

    async fn delete_dependency(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM dependencies WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(sqlx_error)?;
        Ok(())
    }

    async fn get_dependency(&self, id: Uuid) -> Result<Option<Dependency>> {
        let row = sqlx::query(&format!(
            "SELECT {DEPENDENCY_COLUMNS} FROM dependencies WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error)?;

        row.as_ref().map(row_to_dependency).transpose()
    }

    async fn dependencies_for(&self, item_id: Uuid) -> Result<Vec<Dependency>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEPENDENCY_COLUMNS} FROM dependencies
             WHERE from_item_id = ? OR to_item_id = ?
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(item_id.to_string())
        .bind(item_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error)?;

        rows.iter().map(row_to_dependency).collect()
    }

    async fn incoming_blocking(&self, item_id: Uuid) -> Result<Vec<Dependency>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DEPENDENCY_COLUMNS} FROM dependencies
            WHERE (to_item_id = ? AND "type" = 'BLOCKS')
               OR (from_item_id = ? AND "type" = 'IS_BLOCKED_BY')
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(item_id.to_string())
        .bind(item_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error)?;

        rows.iter().map(row_to_dependency).collect()
    }

    async fn outgoing_blocking(&self, item_id: Uuid) -> Result<Vec<Dependency>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DEPENDENCY_COLUMNS} FROM dependencies
            WHERE (from_item_id = ? AND "type" = 'BLOCKS')
               OR (to_item_id = ? AND "type" = 'IS_BLOCKED_BY')
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(item_id.to_string())
        .bind(item_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error)?;

        rows.iter().map(row_to_dependency).collect()
    }

    async fn blocking_among(&self, ids: &[Uuid]) -> Result<Vec<Dependency>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(format!(
            r#"SELECT {DEPENDENCY_COLUMNS} FROM dependencies
               WHERE "type" IN ('BLOCKS', 'IS_BLOCKED_BY') AND from_item_id IN ("#
        ));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        builder.push(") AND to_item_id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        builder.push(") ORDER BY created_at ASC, id ASC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error)?;
        rows.iter().map(row_to_dependency).collect()
    }
}

#[async_trait]
impl NoteRepository for SqliteStore {
    async fn upsert_note(&self, note: NoteUpsert) -> Result<Note> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO notes (id, item_id, "key", role, body, created_at, modified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(item_id, "key") DO UPDATE SET
                role = excluded.role,
                body = excluded.body,
                modified_at = excluded.modified_at
            RETURNING {NOTE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(note.item_id.to_string())
        .bind(&note.key)
        .bind(note.role.as_str())
        .bind(&note.body)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(sqlx_error)?;

        row_to_note(&row)
    }

    async fn get_note(&self, item_id: Uuid, key: &str) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            r#"SELECT {NOTE_COLUMNS} FROM notes WHERE item_id = ? AND "key" = ?"#
        ))
        .bind(item_id.to_string())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error)?;

        row.as_ref().map(row_to_note).transpose()
    }

    async fn notes_for(&self, item_id: Uuid) -> Result<Vec<Note>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {NOTE_COLUMNS} FROM notes WHERE item_id = ? ORDER BY "key" ASC"#
        ))
        .bind(item_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error)?;

        rows.iter().map(row_to_note).collect()
    }

    async fn delete_note(&self, item_id: Uuid, key: &str) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM notes WHERE item_id = ? AND "key" = ?"#)
            .bind(item_id.to_string())
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TransitionRepository for SqliteStore {
    async fn transitions_for(&self, item_id: Uuid) -> Result<Vec<RoleTransition>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSITION_COLUMNS} FROM role_transitions
             WHERE item_id = ? ORDER BY transitioned_at ASC, id ASC"
        ))
        .bind(item_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error)?;

        rows.iter().map(row_to_transition).collect()
    }

    async fn transitions_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<RoleTransition>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSITION_COLUMNS} FROM role_transitions
             WHERE transitioned_at >= ? ORDER BY transitioned_at DESC LIMIT ?"
        ))
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error)?;

        rows.iter().map(row_to_transition).collect()
    }
}
