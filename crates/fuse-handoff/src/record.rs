use std::os::fd::{BorrowedFd, FromRawFd, OwnedFd, RawFd};

use fuse_session::{Device, ProtocolVersion};
use tracing::info;

use crate::error::{HandoffError, HandoffResult};

/// Environment key carrying the handoff record into a replacement process.
///
/// Absence means a fresh start. Set only through the launch API's
/// environment parameter, never via ambient `set_var`.
pub const HANDOFF_ENV: &str = "_FUSE_HANDOFF";

/// Descriptor slot at which the device handle lands in the child.
///
/// First slot after stdio; the launcher dup2s onto it and a recovered
/// process reclaims from it, so both ends must agree exactly.
pub const DEVICE_FD_SLOT: RawFd = 3;

/// Session state carried across an exec: the negotiated protocol version.
///
/// Exists only during the fork/exec transition, encoded as
/// `"<major>,<minor>"` in the child's inherited environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffRecord {
    pub proto: ProtocolVersion,
}

impl HandoffRecord {
    pub fn encode(&self) -> String {
        format!("{},{}", self.proto.major, self.proto.minor)
    }

    /// Parse an inherited record. Anything other than exactly two
    /// comma-separated non-negative integers is rejected.
    pub fn decode(input: &str) -> HandoffResult<Self> {
        let mut fields = input.split(',');
        let (Some(major), Some(minor), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(HandoffError::Decode { input: input.to_string() });
        };
        let major: u32 = major.parse().map_err(|_| HandoffError::Decode {
            input: input.to_string(),
        })?;
        let minor: u32 = minor.parse().map_err(|_| HandoffError::Decode {
            input: input.to_string(),
        })?;
        Ok(Self {
            proto: ProtocolVersion { major, minor },
        })
    }
}

/// Take ownership of the device descriptor inherited at [`DEVICE_FD_SLOT`].
///
/// Call at most once per process, before anything else could occupy the
/// slot.
pub fn inherited_device() -> HandoffResult<Device> {
    verify_inherited_fd(DEVICE_FD_SLOT)?;
    // SAFETY: the check above confirmed the slot holds an open character
    // device, and nothing else in this process owns it yet.
    let fd = unsafe { OwnedFd::from_raw_fd(DEVICE_FD_SLOT) };
    info!(pid = std::process::id(), fd = DEVICE_FD_SLOT, "reclaimed inherited device");
    Ok(Device::from_fd(fd))
}

/// Assert that `fd` is open and refers to a character device.
///
/// The slot convention is implicit between launcher and child, so a
/// recovered process checks it before serving rather than reading from an
/// arbitrary descriptor.
fn verify_inherited_fd(fd: RawFd) -> HandoffResult<()> {
    // SAFETY: the descriptor is only borrowed for the duration of fstat.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let st = nix::sys::stat::fstat(borrowed).map_err(|e| {
        HandoffError::InheritedFd(format!("fd {fd} is not open: {e}"))
    })?;
    if st.st_mode & libc::S_IFMT != libc::S_IFCHR {
        return Err(HandoffError::InheritedFd(format!(
            "fd {fd} is not a character device (mode {:o})",
            st.st_mode
        )));
    }
    Ok(())
}
