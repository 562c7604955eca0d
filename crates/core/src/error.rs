//! Error types for the lifecycle manager.

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the lifecycle manager and its components.
///
/// Every failure is returned as a structured value; nothing in the manager
/// panics or leaves an unhandled fault. State-guard violations
/// (`AlreadyRunning`, `NotRunning`) are recoverable and simply reported to
/// the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No app with this id in the catalog.
    #[error("app '{0}' not found")]
    NotFound(String),

    /// Start rejected: the app already has a live run record. Carries the
    /// previously allocated port so the caller can report it.
    #[error("app '{id}' is already running")]
    AlreadyRunning { id: String, port: Option<u16> },

    /// Stop rejected: no run record for this app.
    #[error("app '{0}' is not running")]
    NotRunning(String),

    /// App configuration failed validation before any process touched the OS.
    #[error("invalid configuration for app '{id}': {reason}")]
    InvalidConfig { id: String, reason: String },

    /// The scanned port window was exhausted.
    #[error("no available ports in range {start}-{end}")]
    NoPortsAvailable { start: u16, end: u16 },

    /// The probe socket failed for a reason unrelated to port occupancy.
    #[error("failed to probe port {port} on {host}: {source}")]
    PortProbe {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The OS refused to create the process. Surfaced verbatim, not retried.
    #[error("failed to spawn '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    /// Failed to load or parse the app catalog file.
    #[error("failed to load app catalog from {path}: {reason}")]
    CatalogLoad { path: String, reason: String },
}

impl Error {
    /// Short machine-readable tag, used by the HTTP layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::AlreadyRunning { .. } => "already_running",
            Error::NotRunning(_) => "not_running",
            Error::InvalidConfig { .. } => "invalid_config",
            Error::NoPortsAvailable { .. } => "no_ports_available",
            Error::PortProbe { .. } => "port_probe_failed",
            Error::SpawnFailed { .. } => "spawn_failed",
            Error::CatalogLoad { .. } => "catalog_load_failed",
        }
    }
}
