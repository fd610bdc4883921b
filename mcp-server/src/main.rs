mod config;
mod setup;
mod stdio;
mod telemetry;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use config::Config;
use mcp_protocol::McpServer;
use stdio::StdioMcpServer;
use telemetry::{init_telemetry, log_startup_info};

#[derive(Parser)]
#[command(name = "loom-mcp")]
#[command(about = "Work-item orchestration MCP server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Serve MCP over HTTP instead of STDIO
    #[arg(long)]
    http: bool,

    /// Port for the HTTP transport
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// Database URL override
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Listen address override for the HTTP transport
    #[arg(long, env = "LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Log level override
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    if let Some(ref database_url) = cli.database_url {
        config.database.url = Some(database_url.clone());
    }
    if let Some(ref listen_addr) = cli.listen_addr {
        config.server.listen_addr = listen_addr.clone();
    }
    config.server.port = cli.port;
    if let Some(ref log_level) = cli.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    init_telemetry(&config)?;
    log_startup_info(&config);

    let handler = setup::build_handler(&config).await?;

    if cli.http {
        let addr = config.server_address();
        info!(%addr, "serving MCP over HTTP");
        McpServer::new(handler).serve(&addr).await
    } else {
        StdioMcpServer::new(handler).serve().await
    }
}
