use crate::config::{Config, LogFormat};
use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber from configuration.
///
/// Logs go to stderr so the STDIO transport keeps stdout for JSON-RPC.
pub fn init_telemetry(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Log the effective configuration at startup.
pub fn log_startup_info(config: &Config) {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.database_url(),
        "loom-mcp starting"
    );
    if let Some(ref path) = config.gates.note_schema_path {
        info!(schema = %path, "note schema loaded from file");
    } else {
        info!("no note schema configured; gate checks run in schema-free mode");
    }
}
