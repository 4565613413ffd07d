//! Pre-flight host resource checks
//!
//! This module provides the one-shot resource snapshot taken before the
//! application is launched and the pure evaluation of that snapshot against
//! the minimum thresholds. Failing one check never short-circuits the
//! others, so the verdict lists every unmet requirement.

mod host;
mod report;

pub use host::HostProbe;
pub use report::{write_report, CheckReport};

use crate::errors::ProbeError;
use crate::models::{ResourceSnapshot, ResourceVerdict, Thresholds};

pub use async_trait::async_trait;

/// Trait for host resource snapshot implementations
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Capture a one-shot snapshot of host resources.
    ///
    /// Fails only if the underlying OS query machinery errors; individual
    /// metric failures degrade to zeroed or absent values.
    async fn snapshot(&self) -> Result<ResourceSnapshot, ProbeError>;
}

/// Evaluate a snapshot against fixed thresholds.
///
/// Pure and total: each check contributes independently and every failed
/// check appends exactly one recommendation.
pub fn evaluate(snapshot: &ResourceSnapshot, thresholds: &Thresholds) -> ResourceVerdict {
    let mut recommendations = Vec::new();

    let memory_ok = snapshot.available_memory_mb() >= thresholds.min_memory_mb;
    if !memory_ok {
        recommendations.push(format!(
            "Insufficient memory: {} MB available, {} MB required",
            snapshot.available_memory_mb(),
            thresholds.min_memory_mb
        ));
    }

    let disk_ok = snapshot.disk_free_mb() >= thresholds.min_disk_mb;
    if !disk_ok {
        recommendations.push(format!(
            "Insufficient disk space: {} MB free, {} MB required",
            snapshot.disk_free_mb(),
            thresholds.min_disk_mb
        ));
    }

    let cpu_ok = snapshot.cpu_cores >= thresholds.min_cpu_cores;
    if !cpu_ok {
        recommendations.push(format!(
            "Insufficient CPU: {} cores, {} required",
            snapshot.cpu_cores, thresholds.min_cpu_cores
        ));
    }

    let runtime_ok = match snapshot.runtime_version {
        Some(version) => {
            version.meets_minimum(thresholds.min_runtime_major, thresholds.min_runtime_minor)
        }
        None => false,
    };
    if !runtime_ok {
        let found = snapshot
            .runtime_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        recommendations.push(format!(
            "Runtime version too old: {} found, {}.{}+ required",
            found, thresholds.min_runtime_major, thresholds.min_runtime_minor
        ));
    }

    ResourceVerdict {
        overall_pass: memory_ok && disk_ok && cpu_ok && runtime_ok,
        memory_ok,
        disk_ok,
        cpu_ok,
        runtime_ok,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RuntimeVersion, BYTES_PER_MB};

    fn healthy_snapshot() -> ResourceSnapshot {
        ResourceSnapshot {
            total_memory_bytes: 8192 * BYTES_PER_MB,
            available_memory_bytes: 4096 * BYTES_PER_MB,
            disk_free_bytes: 10_240 * BYTES_PER_MB,
            cpu_cores: 4,
            cpu_usage_percent: 12.5,
            runtime_version: Some(RuntimeVersion::new(3, 11, 2)),
            platform_name: "linux".to_string(),
            architecture: "x86_64".to_string(),
            ports: vec![],
            timestamp: 0,
        }
    }

    #[test]
    fn test_all_metrics_above_threshold_pass() {
        let verdict = evaluate(&healthy_snapshot(), &Thresholds::default());

        assert!(verdict.overall_pass);
        assert!(verdict.memory_ok && verdict.disk_ok && verdict.cpu_ok && verdict.runtime_ok);
        assert!(verdict.recommendations.is_empty());
    }

    #[test]
    fn test_metrics_exactly_at_threshold_pass() {
        let mut snapshot = healthy_snapshot();
        snapshot.available_memory_bytes = 512 * BYTES_PER_MB;
        snapshot.disk_free_bytes = 100 * BYTES_PER_MB;
        snapshot.cpu_cores = 1;
        snapshot.runtime_version = Some(RuntimeVersion::new(3, 8, 0));

        let verdict = evaluate(&snapshot, &Thresholds::default());
        assert!(verdict.overall_pass);
        assert!(verdict.recommendations.is_empty());
    }

    #[test]
    fn test_low_memory_yields_single_recommendation() {
        let mut snapshot = healthy_snapshot();
        snapshot.available_memory_bytes = 200 * BYTES_PER_MB;

        let verdict = evaluate(&snapshot, &Thresholds::default());

        assert!(!verdict.overall_pass);
        assert!(!verdict.memory_ok);
        assert_eq!(verdict.recommendations.len(), 1);
        assert!(verdict.recommendations[0].contains("memory"));
        assert!(verdict.recommendations[0].contains("512"));
    }

    #[test]
    fn test_low_disk_yields_single_recommendation() {
        let mut snapshot = healthy_snapshot();
        snapshot.disk_free_bytes = 50 * BYTES_PER_MB;

        let verdict = evaluate(&snapshot, &Thresholds::default());

        assert!(!verdict.overall_pass);
        assert_eq!(verdict.recommendations.len(), 1);
        assert!(verdict.recommendations[0].contains("disk"));
    }

    #[test]
    fn test_zero_cores_yields_single_recommendation() {
        let mut snapshot = healthy_snapshot();
        snapshot.cpu_cores = 0;

        let verdict = evaluate(&snapshot, &Thresholds::default());

        assert!(!verdict.overall_pass);
        assert_eq!(verdict.recommendations.len(), 1);
        assert!(verdict.recommendations[0].contains("CPU"));
    }

    #[test]
    fn test_runtime_version_matrix() {
        let thresholds = Thresholds::default();

        for (version, expected) in [
            (RuntimeVersion::new(3, 7, 0), false),
            (RuntimeVersion::new(3, 8, 0), true),
            (RuntimeVersion::new(3, 9, 0), true),
            (RuntimeVersion::new(4, 0, 0), true),
        ] {
            let mut snapshot = healthy_snapshot();
            snapshot.runtime_version = Some(version);

            let verdict = evaluate(&snapshot, &thresholds);
            assert_eq!(
                verdict.runtime_ok, expected,
                "version {version} should be runtime_ok={expected}"
            );
            assert_eq!(verdict.overall_pass, expected);
        }
    }

    #[test]
    fn test_unknown_runtime_version_fails_check() {
        let mut snapshot = healthy_snapshot();
        snapshot.runtime_version = None;

        let verdict = evaluate(&snapshot, &Thresholds::default());

        assert!(!verdict.runtime_ok);
        assert_eq!(verdict.recommendations.len(), 1);
        assert!(verdict.recommendations[0].contains("unknown"));
    }

    #[test]
    fn test_multiple_failures_list_every_recommendation() {
        let mut snapshot = healthy_snapshot();
        snapshot.available_memory_bytes = 0;
        snapshot.disk_free_bytes = 0;
        snapshot.cpu_cores = 0;
        snapshot.runtime_version = Some(RuntimeVersion::new(2, 7, 18));

        let verdict = evaluate(&snapshot, &Thresholds::default());

        assert!(!verdict.overall_pass);
        assert_eq!(verdict.recommendations.len(), 4);
    }
}
