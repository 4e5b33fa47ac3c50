use std::io;
use std::path::Path;

use crate::error::{Result, SessionError};

/// Validate a mount target before any mount attempt.
///
/// A missing target and a non-directory target fail with distinct errors,
/// which saves callers from confusing kernel errors later on.
pub fn check_mount_dir(dir: &Path) -> Result<()> {
    let meta = match std::fs::metadata(dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(SessionError::MountPointMissing(dir.to_path_buf()));
        }
        Err(e) => return Err(SessionError::Io(e)),
    };
    if !meta.is_dir() {
        return Err(SessionError::MountPointNotDir(dir.to_path_buf()));
    }
    Ok(())
}
