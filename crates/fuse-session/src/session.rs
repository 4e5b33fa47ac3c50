use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::config::MountConfig;
use crate::device::Device;
use crate::error::Result;

/// Protocol version negotiated with the kernel at mount time.
///
/// Agreed once per session and immutable afterwards. The kernel will not
/// repeat the handshake for an inherited descriptor, so a recovered process
/// must reproduce this value rather than renegotiate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// An established kernel session.
///
/// The handoff core only reads the negotiated version and closes the
/// session; request dispatch and cancellation bookkeeping live behind
/// this trait.
#[async_trait]
pub trait Session: Send + Sync {
    fn protocol(&self) -> ProtocolVersion;

    /// Release the session. Must not be called while requests are being
    /// served.
    async fn close(&mut self) -> Result<()>;
}

/// Builds sessions over an open device.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Perform the kernel handshake on a freshly mounted device and
    /// determine the protocol version.
    async fn handshake(&self, config: &MountConfig, dev: &Device) -> Result<Box<dyn Session>>;

    /// Rebuild a session over an inherited device with a known version,
    /// bypassing the handshake. Starts with empty cancellation state.
    fn resume(&self, config: &MountConfig, dev: &Device, proto: ProtocolVersion)
    -> Box<dyn Session>;
}

/// Mounts the filesystem and produces the raw device handle.
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Mount on `dir`. Readiness is signalled asynchronously on `ready`
    /// once the kernel accepts the mount, which may lag the return of the
    /// device handle.
    async fn mount(
        &self,
        dir: &Path,
        config: &MountConfig,
        ready: oneshot::Sender<Result<()>>,
    ) -> Result<Device>;
}

/// Serves requests read from a session.
#[async_trait]
pub trait Server: Send + Sync {
    /// Read and serve requests until EOF. Does not return until every
    /// outstanding request has been responded to. Must not be called more
    /// than once.
    async fn serve(&self, session: &mut (dyn Session + 'static));

    /// Ask the serving loop to stop reading.
    fn stop(&self);

    /// Whether a requested stop has completed.
    fn stopped(&self) -> bool;
}
