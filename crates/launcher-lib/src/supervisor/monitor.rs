//! Background health monitoring of the running application
//!
//! Two independent periodic actions: a liveness poll with a resource sample
//! on every tick, and a less frequent TCP connectivity probe. A dead
//! process requests shutdown; a non-answering socket only warns. That
//! asymmetry is intentional: a transient non-listening socket is not fatal,
//! a dead process is.

use crate::port;
use crate::procs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid as SysPid, ProcessesToUpdate, System};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

const GIB: u64 = 1024 * 1024 * 1024;

/// Configuration for the health monitoring loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Liveness poll interval (default: 5 seconds)
    pub liveness_interval: Duration,
    /// TCP connectivity probe interval (default: 30 seconds)
    pub connectivity_interval: Duration,
    /// RSS above this emits a warning (default: 1 GiB)
    pub soft_memory_limit_bytes: u64,
    /// RSS above this escalates and triggers a reclaim pass (default: 2 GiB)
    pub hard_memory_limit_bytes: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            liveness_interval: Duration::from_secs(5),
            connectivity_interval: Duration::from_secs(30),
            soft_memory_limit_bytes: GIB,
            hard_memory_limit_bytes: 2 * GIB,
        }
    }
}

/// Why the monitoring loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The child process is no longer alive
    ChildExited,
    /// An external shutdown was requested
    ShutdownRequested,
}

/// Periodic health monitor for the supervised process
pub struct HealthMonitor {
    config: MonitorConfig,
    host: String,
    port: u16,
    pid: u32,
    shutdown_requested: Arc<AtomicBool>,
    system: System,
}

impl HealthMonitor {
    pub fn new(
        config: MonitorConfig,
        host: impl Into<String>,
        port: u16,
        pid: u32,
        shutdown_requested: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            host: host.into(),
            port,
            pid,
            shutdown_requested,
            system: System::new(),
        }
    }

    /// Run until the child dies or shutdown is requested.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> MonitorExit {
        info!(
            pid = self.pid,
            liveness_secs = self.config.liveness_interval.as_secs(),
            connectivity_secs = self.config.connectivity_interval.as_secs(),
            "health monitor started"
        );

        let mut liveness = interval(self.config.liveness_interval);
        let mut connectivity = interval(self.config.connectivity_interval);
        // The first connectivity tick fires immediately; readiness was just
        // confirmed, so skip it.
        connectivity.reset();

        loop {
            tokio::select! {
                _ = liveness.tick() => {
                    // Covers a shutdown requested before this loop subscribed.
                    if self.shutdown_requested.load(Ordering::SeqCst) {
                        return MonitorExit::ShutdownRequested;
                    }
                    if !procs::process_exists(self.pid) {
                        warn!(pid = self.pid, "application process is gone");
                        return MonitorExit::ChildExited;
                    }
                    self.sample_resources();
                }
                _ = connectivity.tick() => {
                    self.probe_connectivity().await;
                }
                _ = shutdown.recv() => {
                    info!("health monitor received shutdown request");
                    return MonitorExit::ShutdownRequested;
                }
            }
        }
    }

    /// Sample child RSS and CPU, warning past the soft threshold and
    /// escalating (with a best-effort reclaim pass) past the hard one.
    /// Never kills the process.
    fn sample_resources(&mut self) {
        self.system.refresh_processes(
            ProcessesToUpdate::Some(&[SysPid::from_u32(self.pid)]),
            true,
        );

        let Some(process) = self.system.process(SysPid::from_u32(self.pid)) else {
            return;
        };

        let rss = process.memory();
        let cpu = process.cpu_usage();
        debug!(
            pid = self.pid,
            rss_mb = rss / (1024 * 1024),
            cpu_percent = cpu,
            "resource sample"
        );

        if rss > self.config.hard_memory_limit_bytes {
            warn!(
                pid = self.pid,
                rss_mb = rss / (1024 * 1024),
                "application memory usage critically high, running reclaim pass"
            );
            reclaim_memory();
        } else if rss > self.config.soft_memory_limit_bytes {
            warn!(
                pid = self.pid,
                rss_mb = rss / (1024 * 1024),
                "application memory usage high"
            );
        }
    }

    /// Connectivity probe failures warn but never shut down; only process
    /// death or an operator signal does.
    async fn probe_connectivity(&self) {
        if port::is_free(&self.host, self.port).await {
            warn!(
                host = %self.host,
                port = self.port,
                "application is not answering on its port"
            );
        } else {
            debug!(port = self.port, "connectivity probe ok");
        }
    }
}

/// Best-effort memory reclaim.
///
/// Releases freed allocator pages from the launcher itself back to the OS;
/// never touches the child.
pub fn reclaim_memory() {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    unsafe {
        nix::libc::malloc_trim(0);
    }
    debug!("memory reclaim pass complete");
}
