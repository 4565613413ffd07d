//! Host resource probing
//!
//! Reads memory, disk, and CPU figures through `sysinfo`, probes the
//! application runtime for its version, and records advisory port
//! availability. Every metric degrades independently: a failed read
//! produces a zeroed or absent value, never an aborted snapshot.

use super::SystemProbe;
use crate::errors::ProbeError;
use crate::models::{PortStatus, ResourceSnapshot, RuntimeVersion};
use crate::port;
use async_trait::async_trait;
use std::time::Duration;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::process::Command;
use tracing::debug;

/// Ports probed informationally during a full check
const DEFAULT_ADVISORY_PORTS: &[u16] = &[8000, 5000, 3000];

/// Timeout for the advisory connect probes; these are best-effort and must
/// not stall the snapshot.
const ADVISORY_PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// Snapshot provider backed by the local host
pub struct HostProbe {
    runtime: String,
    host: String,
    advisory_ports: Vec<u16>,
}

impl HostProbe {
    /// Create a probe for the given application runtime binary
    /// (e.g. `python3`).
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
            host: "127.0.0.1".to_string(),
            advisory_ports: DEFAULT_ADVISORY_PORTS.to_vec(),
        }
    }

    /// Override the ports reported informationally in the snapshot
    pub fn with_advisory_ports(mut self, ports: Vec<u16>) -> Self {
        self.advisory_ports = ports;
        self
    }

    /// Ask the runtime binary for its version.
    ///
    /// Interpreters print the banner to stdout or stderr depending on the
    /// major version, so both streams are tried.
    async fn runtime_version(&self) -> Option<RuntimeVersion> {
        let output = match Command::new(&self.runtime).arg("--version").output().await {
            Ok(output) => output,
            Err(e) => {
                debug!(runtime = %self.runtime, error = %e, "runtime version probe failed");
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        RuntimeVersion::parse(stdout.trim()).or_else(|| RuntimeVersion::parse(stderr.trim()))
    }

    /// Free space on the root filesystem, falling back to the largest
    /// mounted disk when no root mount is listed.
    fn disk_free_bytes() -> u64 {
        let disks = Disks::new_with_refreshed_list();

        let root = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .map(|d| d.available_space());

        root.unwrap_or_else(|| {
            disks
                .list()
                .iter()
                .map(|d| d.available_space())
                .max()
                .unwrap_or(0)
        })
    }
}

#[async_trait]
impl SystemProbe for HostProbe {
    async fn snapshot(&self) -> Result<ResourceSnapshot, ProbeError> {
        let mut sys = System::new_all();

        // CPU usage needs two refreshes separated by the minimum interval.
        sys.refresh_cpu_usage();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL + Duration::from_millis(50)).await;
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let runtime_version = self.runtime_version().await;

        let mut ports = Vec::with_capacity(self.advisory_ports.len());
        for &p in &self.advisory_ports {
            let free = port::is_free_with_timeout(&self.host, p, ADVISORY_PROBE_TIMEOUT).await;
            ports.push(PortStatus {
                port: p,
                in_use: !free,
            });
        }

        Ok(ResourceSnapshot {
            total_memory_bytes: sys.total_memory(),
            available_memory_bytes: sys.available_memory(),
            disk_free_bytes: Self::disk_free_bytes(),
            cpu_cores: sys.cpus().len(),
            cpu_usage_percent: sys.global_cpu_usage(),
            runtime_version,
            platform_name: System::long_os_version()
                .or_else(System::name)
                .unwrap_or_else(|| "unknown".to_string()),
            architecture: std::env::consts::ARCH.to_string(),
            ports,
            timestamp: chrono::Utc::now().timestamp(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_reports_live_host() {
        let probe = HostProbe::new("definitely-not-a-real-runtime").with_advisory_ports(vec![]);
        let snapshot = probe.snapshot().await.unwrap();

        assert!(snapshot.total_memory_bytes > 0);
        assert!(snapshot.cpu_cores >= 1);
        assert!(snapshot.timestamp > 0);
        // Missing runtime degrades to an absent version, not an error.
        assert!(snapshot.runtime_version.is_none());
    }

    #[tokio::test]
    async fn test_advisory_ports_are_recorded() {
        let probe = HostProbe::new("sh").with_advisory_ports(vec![18_999]);
        let snapshot = probe.snapshot().await.unwrap();

        assert_eq!(snapshot.ports.len(), 1);
        assert_eq!(snapshot.ports[0].port, 18_999);
    }
}
