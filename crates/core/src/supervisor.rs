//! Process supervisor: spawns, watches and terminates managed children.
//!
//! Background apps are spawned non-detached with piped output; their
//! stdout/stderr are drained line-by-line into the operational log tagged
//! with the app name, and their exit is observed (not polled) by a watcher
//! task that relays a single [`ExitEvent`] to the lifecycle manager.
//! Termination is graceful-then-forceful: SIGTERM to the whole process
//! tree, with a SIGKILL escalation scheduled independently of the caller
//! that no-ops if the process exits within the grace period.
//!
//! Terminal-mode apps bypass all of this: the command is handed to a
//! detached terminal-opening helper and never tracked.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sysinfo::{Pid, Signal, System};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{Error, Result};

/// Emitted exactly once per supervised process, when its exit is observed.
#[derive(Debug, Clone)]
pub struct ExitEvent {
    pub app_id: String,
    pub pid: u32,
    pub code: Option<i32>,
}

/// Opaque handle to a supervised child process.
///
/// Owns the scheduled tasks attached to this run (force-kill escalation,
/// browser auto-open); cancelling them when the run record is removed
/// guarantees a stale timer can never act on a reused app slot.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    child: Mutex<Option<Child>>,
    exited: AtomicBool,
    scheduled: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the exit watcher has observed this process exiting.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Attach a cancellable scheduled task to this run.
    pub fn schedule(&self, task: JoinHandle<()>) {
        self.scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task);
    }

    /// Abort every scheduled task still pending for this run.
    pub fn cancel_scheduled(&self) {
        let tasks = std::mem::take(&mut *self.scheduled.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            task.abort();
        }
    }
}

/// Spawns and terminates managed processes; relays exits over a channel.
#[derive(Debug, Clone)]
pub struct Supervisor {
    exit_tx: mpsc::UnboundedSender<ExitEvent>,
}

impl Supervisor {
    /// Create a supervisor and the receiving end of its exit-event channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ExitEvent>) {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        (Self { exit_tx }, exit_rx)
    }

    /// Spawn the app's command in its working directory, layering the app's
    /// env overrides (and `PORT`, when allocated) atop the inherited
    /// environment. Output draining starts immediately; exit watching
    /// starts when the manager calls [`Supervisor::watch`].
    pub async fn spawn(&self, app: &AppConfig, port: Option<u16>) -> Result<Arc<ProcessHandle>> {
        let mut cmd = Command::new(&app.command);
        cmd.args(&app.args)
            .current_dir(&app.path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (key, value) in &app.env {
            cmd.env(key, value);
        }
        if let Some(port) = port {
            cmd.env("PORT", port.to_string());
        }

        let mut child = cmd.spawn().map_err(|err| spawn_error(&app.command, &err))?;
        let pid = child.id().ok_or_else(|| Error::SpawnFailed {
            command: app.command.clone(),
            reason: "child exited before a pid could be read".to_string(),
        })?;

        info!(app = %app.id, pid, port, command = %app.command, "Spawned process.");
        drain_output(&mut child, &app.name);

        Ok(Arc::new(ProcessHandle {
            pid,
            child: Mutex::new(Some(child)),
            exited: AtomicBool::new(false),
            scheduled: std::sync::Mutex::new(Vec::new()),
        }))
    }

    /// Start the exit watcher for a spawned process.
    ///
    /// The watcher owns the child from here on and emits exactly one
    /// [`ExitEvent`] when `wait()` returns. The manager calls this after
    /// the run record is committed, so the event can never outrun the
    /// record it is meant to remove.
    pub fn watch(&self, app_id: String, handle: &Arc<ProcessHandle>) {
        let tx = self.exit_tx.clone();
        let handle = Arc::clone(handle);
        tokio::spawn(async move {
            let child = handle.child.lock().await.take();
            let Some(mut child) = child else {
                warn!(app = %app_id, "No child to watch.");
                return;
            };

            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!(app = %app_id, error = %err, "Failed to wait for child.");
                    None
                }
            };
            handle.exited.store(true, Ordering::SeqCst);

            match code {
                Some(0) => info!(app = %app_id, "Process exited cleanly."),
                Some(code) => warn!(app = %app_id, code, "Process exited with nonzero code."),
                None => warn!(app = %app_id, "Process terminated by signal."),
            }
            let _ = tx.send(ExitEvent {
                app_id,
                pid: handle.pid,
                code,
            });
        });
    }

    /// Graceful-then-forceful termination: SIGTERM the process tree now,
    /// and schedule a SIGKILL escalation after `grace` that runs
    /// independently of the caller and no-ops if the exit was observed in
    /// the meantime.
    pub async fn terminate(&self, handle: &Arc<ProcessHandle>, grace: Duration) {
        if handle.has_exited() {
            debug!(pid = handle.pid(), "Process already exited, nothing to terminate.");
            return;
        }
        signal_tree(handle.pid(), Signal::Term).await;

        let handle = Arc::clone(handle);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if handle.has_exited() {
                return;
            }
            warn!(
                pid = handle.pid(),
                grace_ms = grace.as_millis() as u64,
                "Process ignored SIGTERM, escalating to SIGKILL."
            );
            signal_tree(handle.pid(), Signal::Kill).await;
        });
    }

    /// Immediate SIGKILL of the process tree; no-op on an exited handle.
    pub async fn force_kill(&self, handle: &Arc<ProcessHandle>) {
        if handle.has_exited() {
            return;
        }
        signal_tree(handle.pid(), Signal::Kill).await;
    }
}

/// Hand the command to a detached terminal-opening helper.
///
/// This path intentionally forfeits lifecycle tracking: no handle is
/// returned and stop/terminate semantics do not apply. macOS gets an
/// osascript-driven Terminal window; elsewhere `LAUNCHDECK_TERMINAL`
/// (default `x-terminal-emulator`) is spawned with `-e sh -c`.
pub async fn launch_in_terminal(app: &AppConfig) -> Result<()> {
    let shell_line = terminal_command_line(app);

    #[cfg(target_os = "macos")]
    let mut cmd = {
        let terminal = launchdeck_common::env::var_or("LAUNCHDECK_TERMINAL", "Terminal");
        let script = format!(
            "tell application \"{terminal}\"\n  do script \"{}\"\n  activate\nend tell",
            shell_line.replace('"', "\\\"")
        );
        let mut cmd = Command::new("osascript");
        cmd.args(["-e", &script]);
        cmd
    };

    #[cfg(not(target_os = "macos"))]
    let mut cmd = {
        let terminal =
            launchdeck_common::env::var_or("LAUNCHDECK_TERMINAL", "x-terminal-emulator");
        let mut cmd = Command::new(terminal);
        cmd.args(["-e", "sh", "-c", &shell_line]);
        cmd
    };

    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| spawn_error("terminal helper", &err))?;

    info!(app = %app.id, "Launched in terminal.");
    // Detach: the terminal owns the process from here.
    drop(child);
    Ok(())
}

fn terminal_command_line(app: &AppConfig) -> String {
    let mut line = format!(
        "cd {} && {}",
        shell_quote(&app.path.display().to_string()),
        shell_quote(&app.command)
    );
    for arg in &app.args {
        line.push(' ');
        line.push_str(&shell_quote(arg));
    }
    line
}

/// Single-quote a value for `sh -c`, escaping embedded single quotes.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Spawn stdout/stderr drainers that forward each line to the log, tagged
/// with the app's display name.
fn drain_output(child: &mut Child, name: &str) {
    if let Some(stdout) = child.stdout.take() {
        let name = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(app = %name, "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let name = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(app = %name, "{line}");
            }
        });
    }
}

fn spawn_error(command: &str, err: &std::io::Error) -> Error {
    let reason = if err.kind() == std::io::ErrorKind::NotFound {
        format!("executable not found; make sure '{command}' is installed and in PATH")
    } else {
        err.to_string()
    };
    Error::SpawnFailed {
        command: command.to_string(),
        reason,
    }
}

/// Send a signal to a process and all of its descendants, children first.
///
/// Descendants started before the root are skipped, which guards against
/// acting on a recycled pid. Runs on a blocking thread because sysinfo's
/// process table refresh is synchronous.
async fn signal_tree(pid: u32, signal: Signal) {
    let _ = tokio::task::spawn_blocking(move || signal_tree_blocking(pid, signal)).await;
}

fn signal_tree_blocking(root: u32, signal: Signal) {
    let mut sys = System::new_all();
    sys.refresh_all();

    let root_pid = Pid::from_u32(root);
    let Some(root_process) = sys.process(root_pid) else {
        debug!(pid = root, "Process not found, may have already exited.");
        return;
    };
    let root_start = root_process.start_time();

    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (pid, process) in sys.processes() {
        if let Some(parent) = process.parent() {
            children.entry(parent).or_default().push(*pid);
        }
    }

    // Preorder walk; reversed iteration signals leaves before their parents.
    let mut order = vec![root_pid];
    let mut cursor = 0;
    while cursor < order.len() {
        if let Some(kids) = children.get(&order[cursor]) {
            order.extend(kids.iter().copied());
        }
        cursor += 1;
    }

    for pid in order.into_iter().rev() {
        let Some(process) = sys.process(pid) else {
            continue;
        };
        if process.start_time() < root_start {
            continue;
        }
        if process.kill_with(signal).unwrap_or(false) {
            debug!(?pid, name = ?process.name(), ?signal, "Signalled process.");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn shell_app(id: &str, script: &str) -> AppConfig {
        AppConfig {
            id: id.to_string(),
            name: id.to_string(),
            path: PathBuf::from("/tmp"),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: BTreeMap::new(),
            preferred_port: None,
            max_port: None,
            auto_open_browser: true,
            kind: "custom".to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_terminal_command_line() {
        let mut app = shell_app("web", "sleep 1");
        app.command = "npm".to_string();
        app.args = vec!["run".to_string(), "dev".to_string()];
        assert_eq!(terminal_command_line(&app), "cd '/tmp' && 'npm' 'run' 'dev'");
    }

    #[test]
    fn test_terminal_command_line_quotes_awkward_args() {
        let mut app = shell_app("web", "sleep 1");
        app.command = "npm".to_string();
        app.args = vec!["run".to_string(), "dev server".to_string()];
        app.path = PathBuf::from("/tmp/my app");
        assert_eq!(
            terminal_command_line(&app),
            "cd '/tmp/my app' && 'npm' 'run' 'dev server'"
        );

        app.args = vec!["it's".to_string()];
        assert_eq!(
            terminal_command_line(&app),
            "cd '/tmp/my app' && 'npm' 'it'\\''s'"
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_is_structured() {
        let (supervisor, _rx) = Supervisor::new();
        let mut app = shell_app("ghost", "true");
        app.command = "launchdeck-no-such-binary".to_string();
        let err = supervisor.spawn(&app, None).await.unwrap_err();
        assert!(matches!(err, Error::SpawnFailed { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_exit_is_observed_once() {
        let (supervisor, mut rx) = Supervisor::new();
        let app = shell_app("quick", "exit 3");
        let handle = supervisor.spawn(&app, None).await.unwrap();
        supervisor.watch(app.id.clone(), &handle);

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.app_id, "quick");
        assert_eq!(event.code, Some(3));
        assert!(handle.has_exited());
    }

    #[tokio::test]
    async fn test_terminate_on_exited_handle_is_noop() {
        let (supervisor, mut rx) = Supervisor::new();
        let app = shell_app("done", "exit 0");
        let handle = supervisor.spawn(&app, None).await.unwrap();
        supervisor.watch(app.id.clone(), &handle);
        let _ = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;

        // Must not signal anything or panic on a dead handle.
        supervisor
            .terminate(&handle, Duration::from_millis(10))
            .await;
        supervisor.force_kill(&handle).await;
    }

    #[tokio::test]
    async fn test_terminate_kills_stubborn_process() {
        let (supervisor, mut rx) = Supervisor::new();
        // The shell ignores SIGTERM so only the SIGKILL escalation can end it.
        let app = shell_app("stubborn", "trap '' TERM; while :; do sleep 1; done");
        let handle = supervisor.spawn(&app, None).await.unwrap();
        supervisor.watch(app.id.clone(), &handle);

        supervisor
            .terminate(&handle, Duration::from_millis(200))
            .await;
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.app_id, "stubborn");
        // Killed by signal, so no exit code.
        assert_eq!(event.code, None);
    }

    #[tokio::test]
    async fn test_scheduled_tasks_are_cancelled() {
        let (supervisor, _rx) = Supervisor::new();
        let app = shell_app("timers", "sleep 30");
        let handle = supervisor.spawn(&app, None).await.unwrap();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        handle.schedule(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            flag.store(true, Ordering::SeqCst);
        }));
        handle.cancel_scheduled();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!fired.load(Ordering::SeqCst));

        supervisor.force_kill(&handle).await;
    }
}
