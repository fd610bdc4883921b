use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use item_core::{
    error::{Result, WorkItemError},
    models::{Dependency, DependencyType, Note, RoleTransition, WorkItem},
    roles::{Priority, Role},
};

/// Parse a TEXT column holding a UUID.
pub fn column_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: String = row.get(column);
    raw.parse()
        .map_err(|e| WorkItemError::Database(format!("invalid uuid in column '{column}': {e}")))
}

fn column_uuid_opt(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let raw: Option<String> = row.get(column);
    raw.map(|value| {
        value.parse().map_err(|e| {
            WorkItemError::Database(format!("invalid uuid in column '{column}': {e}"))
        })
    })
    .transpose()
}

fn column_role(row: &SqliteRow, column: &str) -> Result<Role> {
    let raw: String = row.get(column);
    raw.parse()
        .map_err(|_| WorkItemError::Database(format!("invalid role '{raw}' in column '{column}'")))
}

fn column_role_opt(row: &SqliteRow, column: &str) -> Result<Option<Role>> {
    let raw: Option<String> = row.get(column);
    raw.map(|value| {
        value.parse().map_err(|_| {
            WorkItemError::Database(format!("invalid role '{value}' in column '{column}'"))
        })
    })
    .transpose()
}

/// Convert a SQLite row to a work item.
pub fn row_to_item(row: &SqliteRow) -> Result<WorkItem> {
    let priority: String = row.get("priority");
    let priority: Priority = priority
        .parse()
        .map_err(|_| WorkItemError::Database(format!("invalid priority '{priority}'")))?;

    let metadata: Option<String> = row.get("metadata");
    let metadata = metadata
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| WorkItemError::Database(format!("invalid metadata json: {e}")))
        })
        .transpose()?;

    let created_at: DateTime<Utc> = row.get("created_at");
    let modified_at: DateTime<Utc> = row.get("modified_at");

    Ok(WorkItem {
        id: column_uuid(row, "id")?,
        parent_id: column_uuid_opt(row, "parent_id")?,
        title: row.get("title"),
        description: row.get("description"),
        summary: row.get("summary"),
        role: column_role(row, "role")?,
        previous_role: column_role_opt(row, "previous_role")?,
        status_label: row.get("status_label"),
        priority,
        complexity: row.get("complexity"),
        requires_verification: row.get("requires_verification"),
        depth: row.get("depth"),
        metadata,
        tags: row.get("tags"),
        created_at,
        modified_at,
    })
}

/// Convert a SQLite row to a dependency edge.
pub fn row_to_dependency(row: &SqliteRow) -> Result<Dependency> {
    let kind: String = row.get("type");
    let dependency_type: DependencyType = kind
        .parse()
        .map_err(|_| WorkItemError::Database(format!("invalid dependency type '{kind}'")))?;

    Ok(Dependency {
        id: column_uuid(row, "id")?,
        from_item_id: column_uuid(row, "from_item_id")?,
        to_item_id: column_uuid(row, "to_item_id")?,
        dependency_type,
        unblock_at: column_role_opt(row, "unblock_at")?,
        created_at: row.get("created_at"),
    })
}

/// Convert a SQLite row to a note.
pub fn row_to_note(row: &SqliteRow) -> Result<Note> {
    Ok(Note {
        id: column_uuid(row, "id")?,
        item_id: column_uuid(row, "item_id")?,
        key: row.get("key"),
        role: column_role(row, "role")?,
        body: row.get("body"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
    })
}

/// Convert a SQLite row to an audit record.
pub fn row_to_transition(row: &SqliteRow) -> Result<RoleTransition> {
    Ok(RoleTransition {
        id: column_uuid(row, "id")?,
        item_id: column_uuid(row, "item_id")?,
        from_role: column_role(row, "from_role")?,
        to_role: column_role(row, "to_role")?,
        from_status_label: row.get("from_status_label"),
        to_status_label: row.get("to_status_label"),
        trigger: row.get("trigger"),
        summary: row.get("summary"),
        transitioned_at: row.get("transitioned_at"),
    })
}

/// Convert a SQLx error to the domain taxonomy.
pub fn sqlx_error(err: sqlx::Error) -> WorkItemError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if message.contains("UNIQUE constraint failed") {
                if message.contains("dependencies.") {
                    WorkItemError::DuplicateDependency(message.to_string())
                } else {
                    WorkItemError::Conflict(message.to_string())
                }
            } else if message.contains("FOREIGN KEY constraint failed") {
                WorkItemError::Conflict("foreign key constraint failed".to_string())
            } else {
                WorkItemError::Database(format!("database constraint error: {message}"))
            }
        }
        sqlx::Error::PoolTimedOut => WorkItemError::Database("connection pool timeout".to_string()),
        sqlx::Error::Io(io_err) => WorkItemError::Database(format!("database I/O error: {io_err}")),
        _ => WorkItemError::Database(format!("database operation failed: {err}")),
    }
}
