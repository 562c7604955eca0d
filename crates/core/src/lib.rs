//! launchdeck core: process lifecycle and port-allocation manager.
//!
//! The [`manager::LifecycleManager`] orchestrates the leaf components
//! (port prober/allocator in [`ports`], port reaper in [`reaper`], process
//! supervisor in [`supervisor`] and run registry in [`registry`]) to start,
//! track and stop locally-configured development apps. The axum control
//! surface in [`server`] is a thin collaborator over the manager.

pub mod config;
pub mod error;
pub mod manager;
pub mod ports;
pub mod reaper;
pub mod registry;
pub mod server;
pub mod supervisor;

pub use error::{Error, Result};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Initialize tracing for the process.
///
/// `LAUNCHDECK_LOG` controls the log level: either a plain level
/// (`trace`, `debug`, `info`, `warn`, `error`) applied to launchdeck
/// crates, or a full tracing filter spec like `launchdeck_core=debug`.
pub fn init_tracing() {
    let filter = match std::env::var("LAUNCHDECK_LOG") {
        Ok(level) if is_plain_level(&level) => {
            format!("launchdeck_core={level},launchdeck_cli={level},launchdeck={level}")
        }
        Ok(spec) => spec,
        Err(_) => "launchdeck_core=info,launchdeck_cli=info,launchdeck=info".to_string(),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

fn is_plain_level(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    )
}
