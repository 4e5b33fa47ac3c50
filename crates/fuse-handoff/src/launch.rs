use std::ffi::OsString;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use fuse_session::Device;
use tracing::{error, info};

use crate::error::{HandoffError, HandoffResult};
use crate::record::{DEVICE_FD_SLOT, HANDOFF_ENV, HandoffRecord};

/// Spawns the replacement process during a restart.
///
/// Trait seam so the controller can be exercised without real processes.
pub trait ChildLauncher: Send + Sync {
    /// Start the replacement, handing it `record` through its inherited
    /// environment and `dev` at the fixed descriptor slot. Returns the
    /// child pid.
    fn launch(&self, record: &HandoffRecord, dev: &Device) -> HandoffResult<i32>;
}

/// Launches a copy of the current executable: same path and argument
/// vector, inherited stdio, the handoff record at [`HANDOFF_ENV`] and the
/// device descriptor dup2'ed onto [`DEVICE_FD_SLOT`].
pub struct ExecLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ExecLauncher {
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: std::env::args_os().skip(1).collect(),
        })
    }

    pub fn new(program: PathBuf, args: Vec<OsString>) -> Self {
        Self { program, args }
    }
}

impl ChildLauncher for ExecLauncher {
    fn launch(&self, record: &HandoffRecord, dev: &Device) -> HandoffResult<i32> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(HANDOFF_ENV, record.encode())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let dev_fd = dev.as_raw_fd();
        // dup2 clears CLOEXEC on the slot, except when source and target
        // are equal (a no-op per POSIX). A fresh mount's descriptor often
        // sits at the slot already, with CLOEXEC set by the open, so that
        // case clears the flag explicitly instead.
        //
        // SAFETY: fcntl and dup2 are async-signal-safe and the closure
        // neither allocates nor touches locks between fork and exec.
        unsafe {
            cmd.pre_exec(move || {
                if dev_fd == DEVICE_FD_SLOT {
                    if libc::fcntl(dev_fd, libc::F_SETFD, 0) < 0 {
                        return Err(io::Error::last_os_error());
                    }
                } else if libc::dup2(dev_fd, DEVICE_FD_SLOT) < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        match cmd.spawn() {
            Ok(child) => {
                let pid = child.id() as i32;
                info!(child = pid, version = %record.encode(), "spawned replacement");
                Ok(pid)
            }
            Err(e) => {
                error!(error = %e, program = %self.program.display(), "spawn failed");
                Err(HandoffError::RestartFailed)
            }
        }
    }
}
