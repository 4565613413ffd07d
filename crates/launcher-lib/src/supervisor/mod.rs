//! Process supervision state machine
//!
//! The supervisor owns the application lifecycle end to end: pre-flight
//! resource checks, port reclamation, spawn, readiness wait, steady-state
//! monitoring, and ordered shutdown. One supervising control path drives
//! the state machine; the health monitor and the startup progress indicator
//! run as background tasks that communicate only through shared flags and a
//! broadcast shutdown channel. Cleanup runs on every exit path, exactly
//! once.

mod child;
mod monitor;
mod progress;

pub use child::{LaunchSpec, SupervisedProcess};
pub use monitor::{reclaim_memory, HealthMonitor, MonitorConfig, MonitorExit};
pub use progress::show_startup_progress;

use crate::errors::FailureReason;
use crate::models::Thresholds;
use crate::port::{self, PortReclaimer};
use crate::resources::{self, SystemProbe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Interval between readiness connect attempts
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Connect timeout for a single readiness probe
const READY_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Settle time after reclaiming the port before re-checking it
const RECLAIM_SETTLE: Duration = Duration::from_secs(2);

/// Lifecycle of a supervised run.
///
/// Transitions are strictly forward, except that shutdown can be requested
/// from any point after launch and any state can fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorState {
    Idle,
    Checking,
    Launching,
    WaitingForReady,
    Running,
    ShuttingDown,
    Stopped,
    Failed(FailureReason),
}

/// Configuration for a supervised run
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub host: String,
    pub port: u16,
    /// Bound on the wait for the application to start answering
    pub startup_timeout: Duration,
    pub launch: LaunchSpec,
    pub thresholds: Thresholds,
    pub monitor: MonitorConfig,
    /// Graceful-terminate wait before force-killing, for both the child
    /// and stale port owners
    pub termination_grace: Duration,
    /// Render the startup spinner on stdout
    pub show_progress: bool,
}

impl SupervisorConfig {
    pub fn new(launch: LaunchSpec) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            startup_timeout: Duration::from_secs(60),
            launch,
            thresholds: Thresholds::default(),
            monitor: MonitorConfig::default(),
            termination_grace: Duration::from_secs(10),
            show_progress: true,
        }
    }
}

/// Cooperative cancellation handle.
///
/// Safe to trigger from a signal task: it only sets the flag and notifies,
/// all state mutation stays on the supervisor control path.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Request shutdown. Idempotent.
    pub fn request(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!("shutdown requested");
            let _ = self.tx.send(());
        }
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

enum ReadyOutcome {
    Ready,
    ShutdownRequested,
    ChildExited,
    TimedOut,
}

/// Owns the application process's full lifecycle
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    probe: Arc<dyn SystemProbe>,
    state: SupervisorState,
    shutdown_requested: Arc<AtomicBool>,
    server_ready: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    cleanup_done: AtomicBool,
    child: Option<SupervisedProcess>,
    last_child_pid: Option<u32>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig, probe: Arc<dyn SystemProbe>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            config,
            probe,
            state: SupervisorState::Idle,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            server_ready: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            cleanup_done: AtomicBool::new(false),
            child: None,
            last_child_pid: None,
        }
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Pid of the most recently spawned child, surviving cleanup for
    /// reporting.
    pub fn last_child_pid(&self) -> Option<u32> {
        self.last_child_pid
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: self.shutdown_requested.clone(),
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Drive the full lifecycle.
    ///
    /// Returns `Ok(())` for a graceful run-and-stop (including a user
    /// interrupt at any point) and the terminal failure reason otherwise.
    /// Cleanup runs on every exit path before this returns.
    pub async fn run(&mut self) -> Result<(), FailureReason> {
        let result = self.run_inner().await;

        if self.last_child_pid.is_some() {
            self.set_state(SupervisorState::ShuttingDown);
        }
        self.cleanup().await;

        match &result {
            Ok(()) => self.set_state(SupervisorState::Stopped),
            Err(reason) => {
                error!(reason = %reason, "supervisor run failed");
                if let FailureReason::InsufficientResources { recommendations } = reason {
                    for rec in recommendations {
                        error!("{rec}");
                    }
                }
                self.set_state(SupervisorState::Failed(reason.clone()));
            }
        }

        result
    }

    async fn run_inner(&mut self) -> Result<(), FailureReason> {
        self.set_state(SupervisorState::Checking);

        let snapshot = self
            .probe
            .snapshot()
            .await
            .map_err(|e| FailureReason::Probe(e.to_string()))?;
        info!(
            available_memory_mb = snapshot.available_memory_mb(),
            disk_free_mb = snapshot.disk_free_mb(),
            cpu_cores = snapshot.cpu_cores,
            platform = %snapshot.platform_name,
            "pre-flight resource snapshot"
        );

        let verdict = resources::evaluate(&snapshot, &self.config.thresholds);
        if !verdict.overall_pass {
            return Err(FailureReason::InsufficientResources {
                recommendations: verdict.recommendations,
            });
        }

        self.ensure_port_free().await?;

        self.set_state(SupervisorState::Launching);
        let child = SupervisedProcess::spawn(&self.config.launch)
            .map_err(|e| FailureReason::Launch(e.to_string()))?;
        self.last_child_pid = Some(child.pid());
        self.child = Some(child);

        self.set_state(SupervisorState::WaitingForReady);
        if self.config.show_progress {
            tokio::spawn(show_startup_progress(
                self.server_ready.clone(),
                self.shutdown_requested.clone(),
                self.config.startup_timeout,
            ));
        }

        match self.wait_for_ready().await {
            ReadyOutcome::Ready => {}
            ReadyOutcome::ShutdownRequested => return Ok(()),
            ReadyOutcome::ChildExited => return Err(FailureReason::UnexpectedExit),
            ReadyOutcome::TimedOut => {
                return Err(FailureReason::StartupTimeout(
                    self.config.startup_timeout.as_secs(),
                ))
            }
        }

        self.server_ready.store(true, Ordering::SeqCst);
        self.set_state(SupervisorState::Running);
        info!(
            host = %self.config.host,
            port = self.config.port,
            "application is ready"
        );

        // Signal may have arrived between readiness and the monitor
        // subscribing; the monitor also re-checks the flag on every tick.
        if self.shutdown_requested.load(Ordering::SeqCst) {
            return Ok(());
        }

        let pid = self.last_child_pid.unwrap_or_default();
        let monitor = HealthMonitor::new(
            self.config.monitor.clone(),
            self.config.host.clone(),
            self.config.port,
            pid,
            self.shutdown_requested.clone(),
        );
        let shutdown_rx = self.shutdown_tx.subscribe();

        // The child handle must be awaited directly: an exited child stays
        // visible to pid-liveness checks until it is reaped.
        let exit = match self.child.as_mut() {
            Some(child) => tokio::select! {
                _ = child.wait() => {
                    warn!(pid, "application process exited");
                    MonitorExit::ChildExited
                }
                exit = monitor.run(shutdown_rx) => exit,
            },
            None => monitor.run(shutdown_rx).await,
        };

        match exit {
            MonitorExit::ShutdownRequested => Ok(()),
            MonitorExit::ChildExited => {
                if self.shutdown_requested.load(Ordering::SeqCst) {
                    Ok(())
                } else {
                    Err(FailureReason::UnexpectedExit)
                }
            }
        }
    }

    /// Gate before launch: the target port must be free, reclaiming it from
    /// a stale owner if needed.
    async fn ensure_port_free(&self) -> Result<(), FailureReason> {
        let host = &self.config.host;
        let port = self.config.port;

        if port::is_free(host, port).await {
            return Ok(());
        }

        warn!(port, "target port in use, attempting to reclaim");
        let reclaimer = PortReclaimer::new(self.config.termination_grace);
        if let Err(e) = reclaimer.free(port).await {
            warn!(port, error = %e, "port reclaim failed");
        }
        sleep(RECLAIM_SETTLE).await;

        if port::is_free(host, port).await {
            Ok(())
        } else {
            Err(FailureReason::PortUnreclaimable(port))
        }
    }

    /// Poll TCP connectivity until the application answers, shutdown is
    /// requested, the child dies, or the startup timeout passes.
    async fn wait_for_ready(&mut self) -> ReadyOutcome {
        let deadline = Instant::now() + self.config.startup_timeout;
        let mut shutdown = self.shutdown_tx.subscribe();

        info!(
            host = %self.config.host,
            port = self.config.port,
            timeout_secs = self.config.startup_timeout.as_secs(),
            "waiting for application to answer"
        );

        loop {
            if self.shutdown_requested.load(Ordering::SeqCst) {
                return ReadyOutcome::ShutdownRequested;
            }
            if let Some(child) = self.child.as_mut() {
                if child.has_exited() {
                    warn!("application exited before becoming ready");
                    return ReadyOutcome::ChildExited;
                }
            }

            // A successful connect means the port is answering.
            let answering = !port::is_free_with_timeout(
                &self.config.host,
                self.config.port,
                READY_PROBE_TIMEOUT,
            )
            .await;
            if answering {
                return ReadyOutcome::Ready;
            }

            if Instant::now() >= deadline {
                return ReadyOutcome::TimedOut;
            }

            tokio::select! {
                _ = sleep(READY_POLL_INTERVAL) => {}
                _ = shutdown.recv() => return ReadyOutcome::ShutdownRequested,
            }
        }
    }

    /// Ordered shutdown: terminate the child, release the port, run a
    /// memory-reclaim pass. Guarded so concurrent triggers (signal plus
    /// monitor-detected death) execute it at most once.
    ///
    /// Returns whether this call performed the cleanup.
    pub async fn cleanup(&mut self) -> bool {
        if self.cleanup_done.swap(true, Ordering::SeqCst) {
            return false;
        }

        info!("running shutdown cleanup");
        // Stops the progress task if it is still spinning.
        self.shutdown_requested.store(true, Ordering::SeqCst);

        if let Some(child) = self.child.take() {
            child.terminate(self.config.termination_grace).await;

            // The child is gone; anything still holding the port is stale.
            let reclaimer = PortReclaimer::new(self.config.termination_grace);
            if let Err(e) = reclaimer.free(self.config.port).await {
                warn!(port = self.config.port, error = %e, "port release failed");
            }
        }

        reclaim_memory();
        info!("shutdown cleanup complete");
        true
    }

    fn set_state(&mut self, next: SupervisorState) {
        if self.state != next {
            info!(from = ?self.state, to = ?next, "state transition");
            self.state = next;
        }
    }
}
