use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use database::SqliteStore;
use item_core::schema::{NoOpNoteSchemaService, NoteSchemaService, StaticNoteSchemaService};
use mcp_protocol::McpItemHandler;

/// Connect the store and bring the schema up to date.
pub async fn initialize_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let url = config.database_url();
    ensure_database_directory(&url)?;

    let store = SqliteStore::new(&url)
        .await
        .with_context(|| format!("failed to open database at {url}"))?;
    store
        .migrate()
        .await
        .context("failed to run database migrations")?;

    info!(database = %url, "store initialized");
    Ok(Arc::new(store))
}

/// Load the note-schema provider: a JSON file when configured, otherwise
/// schema-free mode.
pub fn load_note_schema(config: &Config) -> Result<Arc<dyn NoteSchemaService>> {
    match config.gates.note_schema_path {
        Some(ref path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read note schema at {path}"))?;
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("note schema at {path} is not valid JSON"))?;
            let schema = StaticNoteSchemaService::from_json(value)
                .with_context(|| format!("note schema at {path} has an invalid shape"))?;
            Ok(Arc::new(schema))
        }
        None => Ok(Arc::new(NoOpNoteSchemaService)),
    }
}

/// Assemble the tool handler from configuration.
pub async fn build_handler(config: &Config) -> Result<McpItemHandler<SqliteStore>> {
    let store = initialize_store(config).await?;
    let schema = load_note_schema(config)?;
    let mut handler = McpItemHandler::new(store, schema);
    if let Some(hours) = config.gates.stalled_after_hours {
        handler = handler.with_stalled_after(chrono::Duration::hours(hours));
    }
    Ok(handler)
}

fn ensure_database_directory(url: &str) -> Result<()> {
    if url.contains(":memory:") {
        return Ok(());
    }
    let path = Path::new(url.trim_start_matches("sqlite://"));
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create database directory {parent:?}"))?;
        }
    }
    Ok(())
}
