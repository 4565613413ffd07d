//! TCP port probing and reclamation
//!
//! The connect probe is deliberately fail-open: any connection failure or
//! timeout counts as "free" so that a transient network error never blocks
//! a launch. Reclamation finds the process holding a port and applies the
//! graceful-then-forced termination policy.

#[cfg(target_os = "linux")]
mod proc_net;

use crate::errors::ReclaimError;
use crate::models::PortOwnership;
use crate::procs;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::info;

/// Timeout for the readiness/availability connect probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Bounded wait between the graceful terminate and the forced kill
const DEFAULT_RECLAIM_GRACE: Duration = Duration::from_secs(5);

/// Probe whether a port is free with the default timeout.
pub async fn is_free(host: &str, port: u16) -> bool {
    is_free_with_timeout(host, port, DEFAULT_PROBE_TIMEOUT).await
}

/// Probe whether a port is free.
///
/// A successful connect means "in use"; a refused connection, any other
/// error, or a timeout all mean "free".
pub async fn is_free_with_timeout(host: &str, port: u16, probe_timeout: Duration) -> bool {
    match timeout(probe_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => false,
        Ok(Err(_)) => true,
        Err(_elapsed) => true,
    }
}

/// Reclaims TCP ports held by stale processes
#[derive(Debug, Clone)]
pub struct PortReclaimer {
    grace: Duration,
}

impl Default for PortReclaimer {
    fn default() -> Self {
        Self::new(DEFAULT_RECLAIM_GRACE)
    }
}

impl PortReclaimer {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Look up who currently holds a port. Never cached; bindings change
    /// between observations.
    pub fn owner(&self, port: u16) -> PortOwnership {
        PortOwnership {
            port,
            pid: lookup_pid(port),
        }
    }

    /// Free a port by terminating its owning process.
    ///
    /// Idempotent: an already-free port is a no-op success, as is an owner
    /// that disappears during the lookup. Fails only when the forced kill
    /// itself errors.
    pub async fn free(&self, port: u16) -> Result<(), ReclaimError> {
        let ownership = self.owner(port);

        let Some(pid) = ownership.pid else {
            info!(port, "port has no owning process, nothing to reclaim");
            return Ok(());
        };

        info!(port, pid, "reclaiming port from owning process");
        procs::terminate_pid(pid, self.grace)
            .await
            .map_err(|e| ReclaimError::Kill {
                port,
                pid,
                message: e.to_string(),
            })?;

        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn lookup_pid(port: u16) -> Option<u32> {
    proc_net::listener_inode(port).and_then(proc_net::pid_for_inode)
}

#[cfg(not(target_os = "linux"))]
fn lookup_pid(port: u16) -> Option<u32> {
    tracing::warn!(port, "port ownership lookup not supported on this platform");
    None
}
