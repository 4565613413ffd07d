//! Safe-launcher library for the Gestor desktop application
//!
//! This crate provides the core functionality for:
//! - Pre-flight host resource checks against minimum thresholds
//! - TCP port probing and reclamation from stale processes
//! - Supervised launch, readiness wait, and ordered shutdown of the
//!   application process
//! - Background liveness and resource monitoring

pub mod errors;
pub mod models;
pub mod port;
pub mod procs;
pub mod resources;
pub mod supervisor;

pub use errors::{FailureReason, LaunchError, ProbeError, ReclaimError};
pub use models::{
    PortOwnership, PortStatus, ResourceSnapshot, ResourceVerdict, RuntimeVersion, Thresholds,
};
pub use port::PortReclaimer;
pub use resources::{evaluate, CheckReport, HostProbe, SystemProbe};
pub use supervisor::{
    HealthMonitor, LaunchSpec, MonitorConfig, MonitorExit, ProcessSupervisor, ShutdownHandle,
    SupervisedProcess, SupervisorConfig, SupervisorState,
};
