//! Shared tunables and helpers for the launchdeck workspace.
//!
//! This crate holds the environment-variable plumbing and path expansion
//! used by both the core manager library and the `launchdeck` CLI.

pub mod env;
pub mod paths;

/// Address the port prober binds to, and the control server listens on.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port for the launchdeck control server.
pub const DEFAULT_SERVER_PORT: u16 = 4500;

/// Default cap on the number of ports scanned per allocation.
pub const DEFAULT_MAX_PORT_ATTEMPTS: u32 = 10;

/// Default grace period before a stopped process is force-killed (ms).
pub const DEFAULT_STOP_GRACE_MS: u64 = 5000;

/// Default delay between an app reaching Running and the browser opening (ms).
pub const DEFAULT_BROWSER_DELAY_MS: u64 = 3000;

/// Well-known dev port ranges swept by the bulk cleanup operation when the
/// caller supplies none: CRA/Next, launchdeck itself, Vite, and uvicorn.
pub const DEFAULT_CLEANUP_RANGES: &[(u16, u16)] =
    &[(3000, 3020), (4500, 4510), (5173, 5180), (8000, 8010)];
