use std::path::PathBuf;

use clap::Parser;
use taskd_server::ServerConfig;
use taskd_store::Database;

/// Task-tracking HTTP service backed by SQLite.
#[derive(Debug, Parser)]
#[command(name = "taskd")]
struct Cli {
    /// Port to listen on (0 picks a free port).
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Path to the SQLite database file. `:memory:` for a throwaway store.
    #[arg(long, default_value = "tasks.db")]
    db: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting taskd");

    let db = if cli.db.as_os_str() == ":memory:" {
        Database::in_memory()
    } else {
        Database::open(&cli.db)
    }
    .expect("Failed to open database");

    let config = ServerConfig { port: cli.port };
    let handle = taskd_server::start(config, db)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "taskd ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
