//! Process liveness and two-phase termination
//!
//! Shared by the port reclaimer and the supervisor cleanup path: both use
//! the same graceful-terminate, bounded-wait, force-kill policy.

use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Poll interval while waiting for a terminated process to exit
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Check whether a process with the given pid is alive.
#[cfg(unix)]
pub fn process_exists(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None::<Signal>) {
        Ok(()) => true,
        // Lacking permission to signal still proves the process exists.
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn process_exists(pid: u32) -> bool {
    use sysinfo::{Pid as SysPid, ProcessesToUpdate, System};

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[SysPid::from_u32(pid)]), true);
    system.process(SysPid::from_u32(pid)).is_some()
}

/// Terminate a process gracefully, then force-kill if it outlives `grace`.
///
/// A process that is already gone (at any step) is success. The only error
/// path is the forced kill itself failing, e.g. on permissions.
#[cfg(unix)]
pub async fn terminate_pid(pid: u32, grace: Duration) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let os_pid = Pid::from_raw(pid as i32);

    match kill(os_pid, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(()),
        Err(err) => {
            // Graceful delivery failed; fall through to the forced kill.
            warn!(pid, error = %err, "failed to deliver SIGTERM");
        }
    }

    if wait_for_exit(pid, grace).await {
        return Ok(());
    }

    warn!(pid, "process survived SIGTERM, force-killing");
    match kill(os_pid, Signal::SIGKILL) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(()),
        Err(err) => {
            return Err(anyhow::anyhow!("failed to send SIGKILL to {pid}: {err}"));
        }
    }

    // SIGKILL cannot be ignored; give the kernel a moment to reap.
    wait_for_exit(pid, Duration::from_secs(2)).await;
    Ok(())
}

#[cfg(not(unix))]
pub async fn terminate_pid(pid: u32, grace: Duration) -> Result<()> {
    use sysinfo::{Pid as SysPid, ProcessesToUpdate, System};

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[SysPid::from_u32(pid)]), true);

    let Some(process) = system.process(SysPid::from_u32(pid)) else {
        return Ok(());
    };

    if !process.kill() {
        return Err(anyhow::anyhow!("failed to kill pid {pid}"));
    }
    wait_for_exit(pid, grace).await;
    Ok(())
}

/// Poll until the process exits or the deadline passes.
/// Returns true if the process is gone.
async fn wait_for_exit(pid: u32, deadline: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < deadline {
        if !process_exists(pid) {
            return true;
        }
        sleep(EXIT_POLL_INTERVAL).await;
    }
    !process_exists(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_process_exists() {
        assert!(process_exists(std::process::id()));
    }

    #[tokio::test]
    async fn test_terminate_missing_pid_is_success() {
        // Near the pid_max ceiling, extremely unlikely to be live.
        let result = terminate_pid(u32::MAX / 2, Duration::from_millis(100)).await;
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_kills_spawned_child() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");
        let pid = child.id();
        assert!(process_exists(pid));

        // Reap concurrently so the pid does not linger as a zombie.
        let reaper = std::thread::spawn(move || {
            let _ = child.wait();
        });

        terminate_pid(pid, Duration::from_secs(5)).await.unwrap();
        reaper.join().unwrap();
        assert!(!process_exists(pid));
    }
}
