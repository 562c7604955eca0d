use clap::Args;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use launchdeck_core::config::AppCatalog;
use launchdeck_core::manager::{LifecycleManager, ManagerConfig};
use launchdeck_core::server::run_server;

use crate::commands::{ServerArgs, run_cli_async};

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub server: ServerArgs,
    #[arg(
        short = 'c',
        long = "config",
        value_name = "PATH",
        help = "Path to the app catalog. Defaults to ~/.launchdeck/apps.toml"
    )]
    pub config: Option<PathBuf>,
}

pub async fn run(args: ServeArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: ServeArgs) -> Result<(), String> {
    let (host, port) = args.server.resolve();

    let catalog_path = match args.config {
        Some(path) => path,
        None => AppCatalog::default_path().map_err(|err| err.to_string())?,
    };
    let catalog = AppCatalog::load(&catalog_path).map_err(|err| err.to_string())?;
    debug!(path = %catalog_path.display(), apps = catalog.len(), "Catalog loaded.");

    let manager = LifecycleManager::new(Arc::new(catalog), ManagerConfig::from_env());

    // Bind synchronously so a bad host/port fails before anything prints,
    // then hand the listener to the server to avoid a TOCTOU window.
    let std_listener = TcpListener::bind((&*host, port))
        .map_err(|e| format!("Failed to bind {host}:{port}: {e}"))?;
    std_listener
        .set_nonblocking(true)
        .map_err(|e| format!("Failed to set listener to non-blocking: {e}"))?;
    let listener = tokio::net::TcpListener::from_std(std_listener)
        .map_err(|e| format!("Failed to convert to tokio listener: {e}"))?;

    println!("🛰️  Control server listening at http://{host}:{port}");
    println!("   Catalog: {}", catalog_path.display());
    println!("   Press Ctrl+C to stop all apps and exit.\n");

    run_server(listener, manager).await
}
