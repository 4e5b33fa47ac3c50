use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use fuse_session::{
    Device, MountConfig, Mounter, ProtocolVersion, Session, SessionFactory, check_mount_dir,
};
use tokio::sync::oneshot;
use tracing::info;

use crate::error::{HandoffError, HandoffResult};
use crate::launch::{ChildLauncher, ExecLauncher};
use crate::paths::RunPaths;
use crate::record::{self, HANDOFF_ENV, HandoffRecord};
use crate::signals::{SignalGate, spawn_restart_watch};
use crate::watch::ReadinessWatch;

/// Orchestrates one parent-to-child handoff of a live kernel session.
///
/// Constructed once at process start, where the inherited handoff record
/// decides whether this is a fresh process or a recovered child. The host
/// process then calls, in order: [`acquire_device`], [`acquire_session`],
/// [`become_ready`] — and, if recovered, gates its serving loop on
/// [`wait_for_parent_go`].
///
/// [`acquire_device`]: RestartController::acquire_device
/// [`acquire_session`]: RestartController::acquire_session
/// [`become_ready`]: RestartController::become_ready
/// [`wait_for_parent_go`]: RestartController::wait_for_parent_go
pub struct RestartController {
    paths: RunPaths,
    // `Some` iff this process was started with an inherited handoff
    // record; doubles as the recovered/fresh state.
    recovered_proto: Option<ProtocolVersion>,
    device: Option<Device>,
    proto: Option<ProtocolVersion>,
    restarting: Arc<AtomicBool>,
    watch: ReadinessWatch,
    launcher: Box<dyn ChildLauncher>,
}

impl RestartController {
    /// Build a controller from an explicitly supplied inherited record
    /// (`None` means fresh start).
    ///
    /// A present but malformed record is an unrecoverable startup error:
    /// without the version there is no safe way to serve from the
    /// inherited descriptor.
    pub fn new(paths: RunPaths, inherited: Option<&str>) -> HandoffResult<Self> {
        let recovered_proto = match inherited {
            Some(raw) => {
                let record = HandoffRecord::decode(raw)?;
                info!(
                    pid = std::process::id(),
                    version = %record.proto,
                    "recovering from handoff"
                );
                Some(record.proto)
            }
            None => None,
        };
        Ok(Self {
            paths,
            recovered_proto,
            device: None,
            proto: None,
            restarting: Arc::new(AtomicBool::new(false)),
            watch: ReadinessWatch::default(),
            launcher: Box::new(ExecLauncher::current_exe()?),
        })
    }

    /// Build a controller from the process environment, reading
    /// [`HANDOFF_ENV`] exactly once.
    pub fn from_env(paths: RunPaths) -> HandoffResult<Self> {
        let inherited = std::env::var(HANDOFF_ENV).ok();
        Self::new(paths, inherited.as_deref())
    }

    /// Replace the launcher (tests, or a supervisor with its own spawn
    /// conventions).
    pub fn with_launcher(mut self, launcher: Box<dyn ChildLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Override the readiness timeout (default 60 s).
    pub fn with_restart_timeout(mut self, timeout: Duration) -> Self {
        self.watch = ReadinessWatch { timeout };
        self
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered_proto.is_some()
    }

    /// Version parsed from the inherited record, for inspection.
    pub fn recovered_version(&self) -> Option<ProtocolVersion> {
        self.recovered_proto
    }

    /// Obtain the device handle.
    ///
    /// Recovered: reclaim the descriptor inherited at the fixed slot and
    /// report readiness immediately — a re-attached mount never waits on
    /// the kernel. Fresh: validate the mount target and delegate to the
    /// mount collaborator, which signals `ready` itself.
    pub async fn acquire_device(
        &mut self,
        mounter: &dyn Mounter,
        dir: &Path,
        config: &MountConfig,
        ready: oneshot::Sender<fuse_session::Result<()>>,
    ) -> HandoffResult<Device> {
        let dev = if self.is_recovered() {
            let dev = record::inherited_device()?;
            let _ = ready.send(Ok(()));
            dev
        } else {
            check_mount_dir(dir)?;
            mounter.mount(dir, config, ready).await?
        };
        self.device = Some(dev.clone());
        Ok(dev)
    }

    /// Build the session over `dev`.
    ///
    /// Recovered: resume with the inherited version, no handshake. Fresh:
    /// let the factory negotiate. Either way the negotiated version is
    /// captured here for later restarts.
    pub async fn acquire_session(
        &mut self,
        factory: &dyn SessionFactory,
        config: &MountConfig,
        dev: &Device,
    ) -> HandoffResult<Box<dyn Session>> {
        let session = match self.recovered_proto {
            Some(proto) => factory.resume(config, dev, proto),
            None => factory.handshake(config, dev).await?,
        };
        self.proto = Some(session.protocol());
        if self.device.is_none() {
            self.device = Some(dev.clone());
        }
        Ok(session)
    }

    /// Announce this process as ready to serve and arm the restart watch.
    ///
    /// Writes the pidfile, creates this process's readiness marker if it
    /// is a recovered child (so the parent observes it), and spawns the
    /// background watch on `gate`. Returns once registration is complete.
    ///
    /// The callback runs one full restart attempt; its contract is the
    /// rollback rule: on any error it must leave the serving loop running
    /// as if no restart had been requested, and only on success stop
    /// serving and send the child its go signal.
    pub fn become_ready<F, Fut>(&self, gate: SignalGate, callback: F) -> HandoffResult<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = HandoffResult<()>> + Send,
    {
        self.paths.write_pid_file()?;
        if self.is_recovered() {
            self.paths.create_marker(std::process::id() as i32)?;
        }
        spawn_restart_watch(gate, Arc::clone(&self.restarting), callback);
        info!(pid = std::process::id(), recovered = self.is_recovered(), "process ready");
        Ok(())
    }

    /// Run one handoff: spawn the replacement and wait for its readiness
    /// marker.
    ///
    /// `Ok(child_pid)` means the marker was observed and consumed; only
    /// then may the caller stop serving and send the go signal. On any
    /// error the session handle is untouched and serving must continue.
    pub async fn restart(&self) -> HandoffResult<i32> {
        let proto = self
            .proto
            .ok_or_else(|| HandoffError::Internal("restart before session acquired".into()))?;
        let dev = self
            .device
            .as_ref()
            .ok_or_else(|| HandoffError::Internal("restart before device acquired".into()))?;

        let record = HandoffRecord { proto };
        let child = self.launcher.launch(&record, dev)?;
        self.watch.wait(&self.paths, child).await?;
        Ok(child)
    }

    /// Recovered-child gate: block until the parent's go signal arrives.
    /// The child must not read from the device before this returns.
    pub async fn wait_for_parent_go(&self, gate: &mut SignalGate) {
        gate.wait().await;
        info!(pid = std::process::id(), "go signal received, serving");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_start_without_record() {
        let paths = RunPaths::new("/run/fused", "fused");
        let ctrl = RestartController::new(paths, None).unwrap();
        assert!(!ctrl.is_recovered());
        assert!(ctrl.recovered_version().is_none());
    }

    #[test]
    fn recovered_start_parses_version() {
        let paths = RunPaths::new("/run/fused", "fused");
        let ctrl = RestartController::new(paths, Some("7,31")).unwrap();
        assert!(ctrl.is_recovered());
        assert_eq!(
            ctrl.recovered_version(),
            Some(ProtocolVersion { major: 7, minor: 31 })
        );
    }

    #[test]
    fn malformed_record_is_fatal() {
        for bad in ["7", "7,31,0", "x,y"] {
            let paths = RunPaths::new("/run/fused", "fused");
            let result = RestartController::new(paths, Some(bad));
            assert!(
                matches!(result, Err(HandoffError::Decode { .. })),
                "input {bad:?} was not rejected as malformed"
            );
        }
    }

    #[tokio::test]
    async fn restart_before_setup_is_an_internal_error() {
        let paths = RunPaths::new("/run/fused", "fused");
        let ctrl = RestartController::new(paths, None).unwrap();
        let err = ctrl.restart().await.unwrap_err();
        assert!(matches!(err, HandoffError::Internal(_)), "got: {err}");
    }
}
