use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("mount point not found: {0}")]
    MountPointMissing(PathBuf),

    #[error("mount point {0} is not a directory")]
    MountPointNotDir(PathBuf),

    #[error("mount failed: {0}")]
    Mount(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("session close failed: {0}")]
    Close(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
