//! Lifecycle manager: orchestrates start/stop/status/cleanup per app.
//!
//! Per-app state machine: `Stopped → Starting → Running → Stopping →
//! Stopped`, with terminal-mode apps taking the untracked
//! `Stopped → Launched` shortcut. The registry's atomic reservation
//! serializes operations per app id; operations on different ids proceed
//! in parallel because no lock is held across a probe, reap or spawn.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{AppCatalog, AppConfig};
use crate::error::{Error, Result};
use crate::ports::allocate_port;
use crate::reaper;
use crate::registry::{RunRecord, RunRegistry};
use crate::supervisor::{ExitEvent, Supervisor, launch_in_terminal};
use launchdeck_common::{
    DEFAULT_BROWSER_DELAY_MS, DEFAULT_CLEANUP_RANGES, DEFAULT_HOST, DEFAULT_MAX_PORT_ATTEMPTS,
    DEFAULT_STOP_GRACE_MS, env,
};

/// Environment-driven tunables consumed by the manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Address ports are probed on and apps are reached at.
    pub bind_host: String,
    /// Cap on ports scanned per allocation.
    pub max_port_attempts: u32,
    /// Grace period between SIGTERM and the SIGKILL escalation.
    pub stop_grace: Duration,
    /// Delay between reaching Running and the browser auto-open.
    pub browser_delay: Duration,
    /// Master switch for browser auto-open.
    pub auto_open: bool,
    /// Master switch for terminal-mode launches.
    pub terminal_open: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_HOST.to_string(),
            max_port_attempts: DEFAULT_MAX_PORT_ATTEMPTS,
            stop_grace: Duration::from_millis(DEFAULT_STOP_GRACE_MS),
            browser_delay: Duration::from_millis(DEFAULT_BROWSER_DELAY_MS),
            auto_open: true,
            terminal_open: true,
        }
    }
}

impl ManagerConfig {
    /// Read tunables from `LAUNCHDECK_*` variables, with documented defaults.
    pub fn from_env() -> Self {
        Self {
            bind_host: env::var_or("LAUNCHDECK_HOST", DEFAULT_HOST),
            max_port_attempts: env::var_u32_or(
                "LAUNCHDECK_MAX_PORT_ATTEMPTS",
                DEFAULT_MAX_PORT_ATTEMPTS,
            ),
            stop_grace: Duration::from_millis(env::var_u64_or(
                "LAUNCHDECK_STOP_GRACE_MS",
                DEFAULT_STOP_GRACE_MS,
            )),
            browser_delay: Duration::from_millis(env::var_u64_or(
                "LAUNCHDECK_BROWSER_DELAY_MS",
                DEFAULT_BROWSER_DELAY_MS,
            )),
            auto_open: env::var_flag("LAUNCHDECK_AUTO_OPEN", true),
            terminal_open: env::var_flag("LAUNCHDECK_TERMINAL_OPEN", true),
        }
    }
}

/// Result of a successful start request.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub app_id: String,
    pub name: String,
    pub port: Option<u16>,
    pub pid: Option<u32>,
    /// True for terminal-mode launches, which are not tracked.
    pub terminal: bool,
}

/// Merged catalog + registry view of one app.
#[derive(Debug, Clone, Serialize)]
pub struct AppStatus {
    pub id: String,
    pub name: String,
    pub path: String,
    pub kind: String,
    pub description: String,
    pub preferred_port: Option<u16>,
    pub is_running: bool,
    pub port: Option<u16>,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Orchestrates prober, allocator, reaper, supervisor and registry.
#[derive(Debug)]
pub struct LifecycleManager {
    catalog: Arc<AppCatalog>,
    registry: Arc<RunRegistry>,
    supervisor: Supervisor,
    config: ManagerConfig,
}

impl LifecycleManager {
    /// Build a manager and start its exit-event consumer, the single point
    /// where spontaneous process exits mutate run state.
    pub fn new(catalog: Arc<AppCatalog>, config: ManagerConfig) -> Arc<Self> {
        let (supervisor, exit_rx) = Supervisor::new();
        let registry = Arc::new(RunRegistry::new());
        Self::consume_exits(Arc::clone(&registry), exit_rx);
        Arc::new(Self {
            catalog,
            registry,
            supervisor,
            config,
        })
    }

    /// The catalog this manager serves.
    pub fn catalog(&self) -> &AppCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Start an app: reserve its id, reap + allocate a port, spawn, and
    /// commit the run record. Any failure past the reservation releases it,
    /// so a failed start never leaves a partial record.
    pub async fn start_app(&self, app_id: &str) -> Result<StartOutcome> {
        let app = self
            .catalog
            .get(app_id)
            .ok_or_else(|| Error::NotFound(app_id.to_string()))?;

        // Config problems are rejected before any process touches the OS.
        let warnings = app.validate()?;
        for warning in warnings {
            warn!(app = %app.id, "{warning}");
        }

        self.registry.reserve(app_id).await?;
        match self.start_reserved(app.as_ref()).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.registry.release(app_id).await;
                Err(err)
            }
        }
    }

    /// The part of a start that runs while holding a reservation.
    async fn start_reserved(&self, app: &AppConfig) -> Result<StartOutcome> {
        // Terminal/CLI apps: hand off to a terminal window, track nothing.
        if !app.auto_open_browser {
            if self.config.terminal_open {
                launch_in_terminal(app).await?;
            } else {
                debug!(app = %app.id, "Terminal launches disabled, skipping.");
            }
            self.registry.release(&app.id).await;
            return Ok(StartOutcome {
                app_id: app.id.clone(),
                name: app.name.clone(),
                port: None,
                pid: None,
                terminal: true,
            });
        }

        // Recover the preferred port if a stale process still holds it.
        if let Some(preferred) = app.preferred_port {
            debug!(app = %app.id, port = preferred, "Sweeping preferred port before allocation.");
            reaper::reap_port(preferred).await;
        }

        let port = allocate_port(
            &self.config.bind_host,
            app.preferred_port,
            app.max_port,
            self.config.max_port_attempts,
        )?;

        let handle = self.supervisor.spawn(app, port).await?;
        let record = RunRecord::new(app.id.clone(), Arc::clone(&handle), port);
        let pid = record.pid();
        self.registry.commit(record).await;
        self.supervisor.watch(app.id.clone(), &handle);

        info!(app = %app.id, pid, port, "App running.");

        // Browser auto-open is a fire-and-forget side effect, scheduled a
        // fixed delay after Running and cancelled with the record.
        if self.config.auto_open {
            if let Some(port) = port {
                let url = format!("http://localhost:{port}");
                let delay = self.config.browser_delay;
                let app_id = app.id.clone();
                handle.schedule(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    debug!(app = %app_id, %url, "Opening browser.");
                    if let Err(err) = open::that_detached(&url) {
                        warn!(app = %app_id, error = %err, "Failed to open browser.");
                    }
                }));
            }
        }

        Ok(StartOutcome {
            app_id: app.id.clone(),
            name: app.name.clone(),
            port,
            pid: Some(pid),
            terminal: false,
        })
    }

    /// Stop a running app: remove its record (authoritative for restart
    /// eligibility), then run the graceful-then-forceful termination
    /// sequence as a detached safety net.
    pub async fn stop_app(&self, app_id: &str) -> Result<()> {
        let record = self
            .registry
            .remove(app_id)
            .await
            .ok_or_else(|| Error::NotRunning(app_id.to_string()))?;

        info!(app = %app_id, pid = record.pid(), "Stopping app.");
        self.supervisor
            .terminate(&record.handle, self.config.stop_grace)
            .await;
        Ok(())
    }

    /// Status for one app, merging catalog metadata with live run state.
    pub async fn status(&self, app_id: &str) -> Result<AppStatus> {
        let app = self
            .catalog
            .get(app_id)
            .ok_or_else(|| Error::NotFound(app_id.to_string()))?;
        Ok(self.status_of(app.as_ref()).await)
    }

    /// Status for every configured app, ordered by id.
    pub async fn status_all(&self) -> Vec<AppStatus> {
        let mut statuses = Vec::with_capacity(self.catalog.len());
        for app in self.catalog.all() {
            statuses.push(self.status_of(app.as_ref()).await);
        }
        statuses
    }

    /// Number of committed run records.
    pub async fn running_count(&self) -> usize {
        self.registry.running_count().await
    }

    /// Sweep port ranges via the reaper. `None` sweeps the well-known dev
    /// ranges. Returns the ports that were actually freed.
    pub async fn cleanup_ports(&self, ranges: Option<Vec<(u16, u16)>>) -> Vec<u16> {
        let ranges = ranges.unwrap_or_else(|| DEFAULT_CLEANUP_RANGES.to_vec());
        let mut freed = Vec::new();
        for (start, end) in ranges {
            freed.extend(reaper::reap_range(start, end).await);
        }
        info!(count = freed.len(), "Port cleanup complete.");
        freed
    }

    /// Stop every running app; used when the control server shuts down.
    pub async fn shutdown(&self) {
        for snapshot in self.registry.running().await {
            if let Err(err) = self.stop_app(&snapshot.app_id).await {
                debug!(app = %snapshot.app_id, error = %err, "App already gone during shutdown.");
            }
        }
    }

    async fn status_of(&self, app: &AppConfig) -> AppStatus {
        let run = self.registry.get(&app.id).await;
        AppStatus {
            id: app.id.clone(),
            name: app.name.clone(),
            path: app.path.display().to_string(),
            kind: app.kind.clone(),
            description: app.description.clone(),
            preferred_port: app.preferred_port,
            is_running: run.is_some(),
            port: run.as_ref().and_then(|r| r.port),
            pid: run.as_ref().map(|r| r.pid),
            started_at: run.map(|r| r.started_at),
        }
    }

    /// Single consumer of supervisor exit events: removes the record (and
    /// with it any still-pending scheduled tasks) exactly once per exit.
    fn consume_exits(registry: Arc<RunRegistry>, mut exit_rx: mpsc::UnboundedReceiver<ExitEvent>) {
        tokio::spawn(async move {
            while let Some(event) = exit_rx.recv().await {
                if registry.remove(&event.app_id).await.is_some() {
                    info!(
                        app = %event.app_id,
                        pid = event.pid,
                        code = event.code,
                        "Run record removed after process exit."
                    );
                } else {
                    // Explicit stop already removed the record.
                    debug!(app = %event.app_id, pid = event.pid, "Exit for untracked run.");
                }
            }
        });
    }
}
