mod config;
mod device;
mod error;
mod mount;
mod session;

pub use config::MountConfig;
pub use device::Device;
pub use error::{Result, SessionError};
pub use mount::check_mount_dir;
pub use session::{Mounter, ProtocolVersion, Server, Session, SessionFactory};
