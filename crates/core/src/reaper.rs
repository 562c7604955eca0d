//! Port reaper: forcibly frees ports by killing whatever holds them.
//!
//! Listener lookup shells out to `lsof`, so reaping is host-specific: on a
//! system without `lsof` every reap is a silent no-op, which callers treat
//! as "nothing to free". Absence of a process on a port is success, never
//! an error. Used preemptively on an app's preferred port before
//! allocation, and by the bulk cleanup operation.

use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Kill whatever is listening on `port`. Returns whether anything was freed.
pub async fn reap_port(port: u16) -> bool {
    let pids = listeners_on_port(port).await;
    if pids.is_empty() {
        return false;
    }
    let killed = kill_pids(pids).await;
    if killed > 0 {
        info!(port, killed, "Freed port.");
    }
    killed > 0
}

/// Sweep an inclusive port range, returning the ports that were freed.
pub async fn reap_range(start: u16, end: u16) -> Vec<u16> {
    let mut freed = Vec::new();
    for port in start..=end.max(start) {
        if reap_port(port).await {
            freed.push(port);
        }
    }
    freed
}

/// Find pids with a TCP listener on `port` via `lsof`.
async fn listeners_on_port(port: u16) -> Vec<u32> {
    let output = Command::new("lsof")
        .args(["-t", "-i", &format!("tcp:{port}"), "-s", "TCP:LISTEN"])
        .output()
        .await;

    match output {
        Ok(output) => parse_lsof_pids(&String::from_utf8_lossy(&output.stdout)),
        Err(err) => {
            // lsof missing or unusable: reaping is unsupported on this host.
            debug!(port, error = %err, "lsof lookup failed, skipping reap.");
            Vec::new()
        }
    }
}

/// Parse `lsof -t` output: one pid per line.
fn parse_lsof_pids(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .collect()
}

/// SIGKILL the given pids, skipping our own process. Returns the number of
/// processes that were actually signalled.
async fn kill_pids(pids: Vec<u32>) -> usize {
    let own_pid = std::process::id();
    let result = tokio::task::spawn_blocking(move || {
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);

        let mut killed = 0;
        for pid in pids {
            if pid == own_pid {
                warn!(pid, "Refusing to reap our own process.");
                continue;
            }
            let Some(process) = sys.process(Pid::from_u32(pid)) else {
                debug!(pid, "Process already gone before reap.");
                continue;
            };
            if process.kill_with(Signal::Kill).unwrap_or(false) {
                debug!(pid, name = ?process.name(), "Killed port holder.");
                killed += 1;
            } else {
                warn!(pid, "Failed to kill port holder.");
            }
        }
        killed
    })
    .await;

    result.unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lsof_pids() {
        assert_eq!(parse_lsof_pids("1234\n5678\n"), vec![1234, 5678]);
        assert_eq!(parse_lsof_pids("  901 \n"), vec![901]);
        assert_eq!(parse_lsof_pids(""), Vec::<u32>::new());
        assert_eq!(parse_lsof_pids("garbage\n42\n"), vec![42]);
    }

    #[tokio::test]
    async fn test_reap_free_port_is_noop() {
        // Grab an OS-assigned port and release it so nothing listens there.
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(!reap_port(port).await);
    }

    #[tokio::test]
    async fn test_reap_range_nothing_listening() {
        let a = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let b = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let (start, end) = (
            a.local_addr().unwrap().port().min(b.local_addr().unwrap().port()),
            a.local_addr().unwrap().port().max(b.local_addr().unwrap().port()),
        );
        drop((a, b));

        // The range in between may contain live listeners on a busy host,
        // so only sweep the two known-free endpoints.
        assert!(reap_range(start, start).await.is_empty());
        assert!(reap_range(end, end).await.is_empty());
    }
}
