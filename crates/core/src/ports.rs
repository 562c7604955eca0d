//! Port prober and allocator.
//!
//! Availability is tested with a transient listening socket that is closed
//! immediately, so the probe itself never holds a port. There is an
//! inherent window between "probed free" and the child process binding the
//! port; the design accepts that race, and a lost race shows up as the
//! child exiting immediately (handled like any other spontaneous exit).

use std::io::ErrorKind;
use std::net::TcpListener;

use crate::error::{Error, Result};

/// Test whether `host:port` can currently be bound.
///
/// A port that is in use is a normal `Ok(false)`; only transport-level
/// setup errors unrelated to occupancy escalate as [`Error::PortProbe`].
pub fn is_port_available(host: &str, port: u16) -> Result<bool> {
    match TcpListener::bind((host, port)) {
        Ok(listener) => {
            drop(listener);
            Ok(true)
        }
        Err(err) if matches!(err.kind(), ErrorKind::AddrInUse | ErrorKind::PermissionDenied) => {
            Ok(false)
        }
        Err(source) => Err(Error::PortProbe {
            host: host.to_string(),
            port,
            source,
        }),
    }
}

/// Find the first free port in the app's window, scanning ascending from
/// `preferred` up to `min(max, preferred + max_attempts - 1)`.
///
/// Returns `Ok(None)` when the app has no port window at all (terminal/CLI
/// launch), and [`Error::NoPortsAvailable`] when the scanned window is
/// exhausted. `max_attempts` bounds worst-case scan cost regardless of how
/// wide the configured range is.
pub fn allocate_port(
    host: &str,
    preferred: Option<u16>,
    max: Option<u16>,
    max_attempts: u32,
) -> Result<Option<u16>> {
    let (Some(start), Some(max)) = (preferred, max) else {
        return Ok(None);
    };

    let attempts = max_attempts.max(1);
    let capped = u32::from(start)
        .saturating_add(attempts - 1)
        .min(u32::from(u16::MAX)) as u16;
    let end = max.min(capped);

    // An inverted window (max below preferred) is empty: nothing may be
    // allocated outside [preferred, max].
    if end < start {
        return Err(Error::NoPortsAvailable { start, end });
    }

    for port in start..=end {
        if is_port_available(host, port)? {
            tracing::debug!(port, start, end, "Allocated port.");
            return Ok(Some(port));
        }
    }

    Err(Error::NoPortsAvailable { start, end })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use launchdeck_common::DEFAULT_HOST;

    /// Bind an OS-assigned port and keep the listener alive to occupy it.
    fn occupy() -> (TcpListener, u16) {
        let listener = TcpListener::bind((DEFAULT_HOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn test_probe_free_then_occupied() {
        let (listener, port) = occupy();
        assert!(!is_port_available(DEFAULT_HOST, port).unwrap());
        drop(listener);
        assert!(is_port_available(DEFAULT_HOST, port).unwrap());
    }

    #[test]
    fn test_probe_does_not_hold_the_port() {
        let (listener, port) = occupy();
        drop(listener);
        assert!(is_port_available(DEFAULT_HOST, port).unwrap());
        // A second probe right after must still see the port free.
        assert!(is_port_available(DEFAULT_HOST, port).unwrap());
    }

    #[test]
    fn test_allocate_skips_occupied_preferred() {
        let (_guard, port) = occupy();
        let allocated = allocate_port(DEFAULT_HOST, Some(port), Some(port + 10), 10)
            .unwrap()
            .unwrap();
        assert_ne!(allocated, port);
        assert!(allocated > port && allocated <= port + 10);
        assert!(is_port_available(DEFAULT_HOST, allocated).unwrap());
    }

    #[test]
    fn test_allocate_exhausted_window() {
        let (_guard, port) = occupy();
        let err = allocate_port(DEFAULT_HOST, Some(port), Some(port), 10).unwrap_err();
        assert!(matches!(
            err,
            Error::NoPortsAvailable { start, end } if start == port && end == port
        ));
    }

    #[test]
    fn test_allocate_window_capped_by_max_attempts() {
        let (_guard, port) = occupy();
        // max_attempts = 1 restricts the scan to the preferred port only,
        // even though the configured range is wider.
        let err = allocate_port(DEFAULT_HOST, Some(port), Some(port + 100), 1).unwrap_err();
        assert!(matches!(
            err,
            Error::NoPortsAvailable { start, end } if start == port && end == port
        ));
    }

    #[test]
    fn test_allocate_rejects_inverted_window() {
        let (_guard, port) = occupy();
        // The window is empty, so allocation must fail rather than hand
        // out the preferred port above the configured maximum.
        let err = allocate_port(DEFAULT_HOST, Some(port), Some(port - 1), 10).unwrap_err();
        assert!(matches!(
            err,
            Error::NoPortsAvailable { start, end } if start == port && end == port - 1
        ));
    }

    #[test]
    fn test_allocate_without_window_is_skipped() {
        assert_eq!(allocate_port(DEFAULT_HOST, None, None, 10).unwrap(), None);
        assert_eq!(
            allocate_port(DEFAULT_HOST, Some(3000), None, 10).unwrap(),
            None
        );
        assert_eq!(
            allocate_port(DEFAULT_HOST, None, Some(3010), 10).unwrap(),
            None
        );
    }
}
