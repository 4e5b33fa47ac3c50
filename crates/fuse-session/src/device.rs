use std::fs::File;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;

/// Handle to the open kernel mount device.
///
/// Exactly one process may actively read from the underlying descriptor at
/// any instant; the handle itself is cheaply cloneable so the session and
/// the restart machinery can both refer to it. The descriptor closes when
/// the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Device {
    fd: Arc<OwnedFd>,
}

impl Device {
    pub fn from_fd(fd: OwnedFd) -> Self {
        Self { fd: Arc::new(fd) }
    }

    pub fn from_file(file: File) -> Self {
        Self::from_fd(file.into())
    }
}

impl AsRawFd for Device {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
