use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::info;

use crate::error::{HandoffError, HandoffResult};
use crate::paths::RunPaths;

pub const DEFAULT_RESTART_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded poll for a child's readiness marker.
///
/// Handoffs are rare and a few seconds of latency is acceptable, so this
/// is a plain once-per-second poll rather than anything event-driven; the
/// marker file is the only channel that works across the process boundary
/// without shared memory. Runs on `tokio::time`, so tests drive it on a
/// paused clock.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessWatch {
    pub timeout: Duration,
}

impl Default for ReadinessWatch {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RESTART_TIMEOUT,
        }
    }
}

impl ReadinessWatch {
    /// Wait for `child_pid` to announce readiness, consuming the marker on
    /// first observation.
    ///
    /// On timeout the child is probed with a zero signal: still alive
    /// means [`HandoffError::ChildNotReady`] (it may yet become ready, but
    /// this attempt gives up waiting), gone means
    /// [`HandoffError::RestartFailed`].
    pub async fn wait(&self, paths: &RunPaths, child_pid: i32) -> HandoffResult<()> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            if paths.marker(child_pid).exists() {
                paths.consume_marker(child_pid)?;
                info!(child = child_pid, "child ready");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        // Zero-signal probe: checks existence without delivering anything.
        // kill() succeeding (or failing with EPERM) proves the process is
        // still there; only ESRCH means it is gone.
        match kill(Pid::from_raw(child_pid), None) {
            Err(Errno::ESRCH) => Err(HandoffError::RestartFailed),
            _ => Err(HandoffError::ChildNotReady),
        }
    }
}
