//! The supervised child process
//!
//! Exclusively owned by the supervisor: created on spawn, destroyed on
//! confirmed exit. At most one is live per supervisor instance.

use crate::errors::LaunchError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{info, warn};

/// Everything needed to launch the application process
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Program to execute (e.g. the application runtime)
    pub program: String,
    pub args: Vec<String>,
    /// Environment overrides passed on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
    /// Child stdout and stderr are appended here when set
    pub log_path: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Handle to the single owned child process
#[derive(Debug)]
pub struct SupervisedProcess {
    child: Child,
    pid: u32,
    command_line: String,
}

impl SupervisedProcess {
    /// Spawn the application process.
    ///
    /// No partial state survives a failed spawn; the error carries the
    /// attempted command line.
    pub fn spawn(spec: &LaunchSpec) -> Result<Self, LaunchError> {
        let command_line = spec.command_line();

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            // Last-resort guarantee that the child never outlives us.
            .kill_on_drop(true);

        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        match open_log_file(spec)? {
            Some((out, err)) => {
                command.stdout(Stdio::from(out)).stderr(Stdio::from(err));
            }
            None => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let child = command.spawn().map_err(|source| LaunchError {
            command: command_line.clone(),
            source,
        })?;

        let pid = child.id().ok_or_else(|| LaunchError {
            command: command_line.clone(),
            source: std::io::Error::other("child exited before its pid could be read"),
        })?;

        info!(pid, command = %command_line, "application process spawned");

        Ok(Self {
            child,
            pid,
            command_line,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Non-blocking check for an already-exited child.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Wait for the child to exit, reaping it.
    ///
    /// An exited-but-unreaped child still looks alive to pid-based
    /// liveness checks, so the supervisor awaits this directly while the
    /// application runs.
    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }

    /// Terminate the child: graceful signal, bounded wait, then force-kill.
    ///
    /// Consumes the handle; the process is confirmed gone when this
    /// returns. Mirrors the reclaim policy used for stale port owners.
    pub async fn terminate(mut self, grace: Duration) {
        if let Ok(Some(status)) = self.child.try_wait() {
            info!(pid = self.pid, %status, "application already exited");
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM);
        }

        match timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid = self.pid, %status, "application terminated gracefully");
            }
            Ok(Err(e)) => {
                warn!(pid = self.pid, error = %e, "error waiting for application exit");
            }
            Err(_elapsed) => {
                warn!(pid = self.pid, "application ignored terminate, force-killing");
                if let Err(e) = self.child.kill().await {
                    warn!(pid = self.pid, error = %e, "force-kill failed");
                }
            }
        }
    }
}

fn open_log_file(
    spec: &LaunchSpec,
) -> Result<Option<(std::fs::File, std::fs::File)>, LaunchError> {
    let Some(path) = &spec.log_path else {
        return Ok(None);
    };

    let wrap = |source: std::io::Error| LaunchError {
        command: spec.command_line(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(wrap)?;
        }
    }

    let out = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(wrap)?;
    let err = out.try_clone().map_err(wrap)?;

    Ok(Some((out, err)))
}
