//! Error taxonomy for the launcher
//!
//! Every failure mode is handled inside the supervisor and converted into a
//! terminal [`FailureReason`]; none of these propagate as raw errors past
//! the top-level run loop.

use thiserror::Error;

/// An OS-level resource query failed outright.
///
/// Individual metric failures degrade to zeroed values inside the snapshot;
/// this error is reserved for the query machinery itself going wrong.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to query host resources: {0}")]
    Host(String),

    #[error("i/o error while probing: {0}")]
    Io(#[from] std::io::Error),
}

/// A TCP port could not be reclaimed from its owning process.
///
/// Raised only when the forced kill itself errors; a process that is
/// already gone counts as success.
#[derive(Debug, Error)]
pub enum ReclaimError {
    #[error("failed to force-kill pid {pid} holding port {port}: {message}")]
    Kill {
        port: u16,
        pid: u32,
        message: String,
    },
}

/// Spawning the child process failed; no partial state survives.
#[derive(Debug, Error)]
#[error("failed to spawn `{command}`: {source}")]
pub struct LaunchError {
    pub command: String,
    #[source]
    pub source: std::io::Error,
}

/// Terminal reason the supervisor ended in the `Failed` state.
///
/// Carries enough detail for the operator boundary: resource failures keep
/// the full recommendation list, not just the first unmet requirement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    #[error("insufficient resources")]
    InsufficientResources { recommendations: Vec<String> },

    #[error("port {0} could not be reclaimed")]
    PortUnreclaimable(u16),

    #[error("resource probe failed: {0}")]
    Probe(String),

    #[error("failed to launch application: {0}")]
    Launch(String),

    #[error("application did not become ready within {0}s")]
    StartupTimeout(u64),

    #[error("application process exited unexpectedly")]
    UnexpectedExit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_display() {
        let reason = FailureReason::StartupTimeout(60);
        assert_eq!(
            reason.to_string(),
            "application did not become ready within 60s"
        );
    }

    #[test]
    fn test_insufficient_resources_keeps_all_recommendations() {
        let reason = FailureReason::InsufficientResources {
            recommendations: vec!["more memory".to_string(), "more disk".to_string()],
        };

        match reason {
            FailureReason::InsufficientResources { recommendations } => {
                assert_eq!(recommendations.len(), 2);
            }
            _ => panic!("wrong variant"),
        }
    }
}
