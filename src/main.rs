use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcp_sequential_thinking::{
    config::{Config, LogFormat},
    critic::{Critic, HttpCritic, NoopCritic},
    server::{AppState, McpServer},
    session::SessionController,
    store::SessionStore,
};

/// Sequential Thinking MCP server
#[derive(Debug, Parser)]
#[command(name = "mcp-sequential-thinking", version, about)]
struct Cli {
    /// Directory for the session dataset (overrides MCP_STORAGE_DIR)
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Log level filter (overrides LOG_LEVEL)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(dir) = cli.storage_dir {
        config.storage.dir = dir;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Sequential Thinking MCP server starting..."
    );

    // Initialize storage
    let store = match SessionStore::open(&config.storage) {
        Ok(s) => {
            info!(dir = %config.storage.dir.display(), "Session store opened");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to open session store");
            return Err(e.into());
        }
    };
    let controller = SessionController::new(store);

    // Initialize the critic when an API key is configured
    let critic: Arc<dyn Critic> = match HttpCritic::from_config(&config.critic) {
        Ok(Some(c)) => {
            info!(base_url = %c.base_url(), model = %config.critic.model, "Critic enabled");
            Arc::new(c)
        }
        Ok(None) => {
            info!("No critic API key configured, critical responses disabled");
            Arc::new(NoopCritic)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize critic");
            return Err(e.into());
        }
    };

    // Create application state
    let state = Arc::new(AppState::new(config, controller, critic));

    // Start MCP server
    let server = McpServer::new(state);

    info!("Server ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
