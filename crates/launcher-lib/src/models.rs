//! Core data models for the safe launcher

use serde::{Deserialize, Serialize};

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Version of the application runtime the child process runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl RuntimeVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version out of tool output such as `Python 3.11.4` or `3.8`.
    ///
    /// Takes the last whitespace-separated token and splits on dots; a
    /// missing patch or minor component defaults to zero.
    pub fn parse(output: &str) -> Option<Self> {
        let token = output.split_whitespace().last()?;
        let mut parts = token.split('.');

        let major = parts.next()?.trim().parse().ok()?;
        let minor = parts
            .next()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(0);
        let patch = parts
            .next()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(0);

        Some(Self {
            major,
            minor,
            patch,
        })
    }

    /// Combined major/minor minimum check.
    ///
    /// A later major version passes regardless of minor, so 4.0 satisfies a
    /// 3.8 minimum while 3.7 does not.
    pub fn meets_minimum(&self, min_major: u32, min_minor: u32) -> bool {
        self.major > min_major || (self.major == min_major && self.minor >= min_minor)
    }
}

impl std::fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Advisory availability of a single TCP port at snapshot time
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PortStatus {
    pub port: u16,
    pub in_use: bool,
}

/// One-shot snapshot of host resources, captured once per check invocation
/// and never mutated afterwards.
///
/// Metrics that could not be read are degraded to zero (or `None` for the
/// runtime version) rather than failing the whole snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    pub disk_free_bytes: u64,
    pub cpu_cores: usize,
    pub cpu_usage_percent: f32,
    pub runtime_version: Option<RuntimeVersion>,
    pub platform_name: String,
    pub architecture: String,
    /// Advisory only; a bound port is informational, not a check failure.
    pub ports: Vec<PortStatus>,
    pub timestamp: i64,
}

impl ResourceSnapshot {
    pub fn available_memory_mb(&self) -> u64 {
        self.available_memory_bytes / BYTES_PER_MB
    }

    pub fn disk_free_mb(&self) -> u64 {
        self.disk_free_bytes / BYTES_PER_MB
    }
}

/// Minimum host requirements the application needs to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_memory_mb: u64,
    pub min_disk_mb: u64,
    pub min_cpu_cores: usize,
    pub min_runtime_major: u32,
    pub min_runtime_minor: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_memory_mb: 512,
            min_disk_mb: 100,
            min_cpu_cores: 1,
            min_runtime_major: 3,
            min_runtime_minor: 8,
        }
    }
}

/// Aggregated pass/fail outcome of a resource check against fixed thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceVerdict {
    pub overall_pass: bool,
    pub memory_ok: bool,
    pub disk_ok: bool,
    pub cpu_ok: bool,
    pub runtime_ok: bool,
    /// One entry per unmet requirement, in check order.
    pub recommendations: Vec<String>,
}

/// Ownership of a TCP port, looked up on demand and never cached because
/// process/port bindings can change between observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortOwnership {
    pub port: u16,
    pub pid: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interpreter_banner() {
        let version = RuntimeVersion::parse("Python 3.11.4").unwrap();
        assert_eq!(version, RuntimeVersion::new(3, 11, 4));
    }

    #[test]
    fn test_parse_bare_version() {
        assert_eq!(
            RuntimeVersion::parse("3.8"),
            Some(RuntimeVersion::new(3, 8, 0))
        );
        assert_eq!(RuntimeVersion::parse("4"), Some(RuntimeVersion::new(4, 0, 0)));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(RuntimeVersion::parse(""), None);
        assert_eq!(RuntimeVersion::parse("not a version"), None);
    }

    #[test]
    fn test_meets_minimum_combined_comparison() {
        // Regression matrix for the major/minor comparison: an older major
        // with a high minor must not pass, a newer major always passes.
        assert!(!RuntimeVersion::new(3, 7, 0).meets_minimum(3, 8));
        assert!(RuntimeVersion::new(3, 8, 0).meets_minimum(3, 8));
        assert!(RuntimeVersion::new(3, 9, 1).meets_minimum(3, 8));
        assert!(RuntimeVersion::new(4, 0, 0).meets_minimum(3, 8));
        assert!(!RuntimeVersion::new(2, 9, 0).meets_minimum(3, 8));
    }

    #[test]
    fn test_snapshot_unit_conversions() {
        let snapshot = ResourceSnapshot {
            total_memory_bytes: 4 * 1024 * BYTES_PER_MB,
            available_memory_bytes: 512 * BYTES_PER_MB,
            disk_free_bytes: 100 * BYTES_PER_MB,
            cpu_cores: 2,
            cpu_usage_percent: 10.0,
            runtime_version: Some(RuntimeVersion::new(3, 11, 0)),
            platform_name: "linux".to_string(),
            architecture: "x86_64".to_string(),
            ports: vec![],
            timestamp: 0,
        };

        assert_eq!(snapshot.available_memory_mb(), 512);
        assert_eq!(snapshot.disk_free_mb(), 100);
    }

    #[test]
    fn test_thresholds_defaults() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.min_memory_mb, 512);
        assert_eq!(thresholds.min_disk_mb, 100);
        assert_eq!(thresholds.min_cpu_cores, 1);
        assert_eq!(thresholds.min_runtime_major, 3);
        assert_eq!(thresholds.min_runtime_minor, 8);
    }
}
