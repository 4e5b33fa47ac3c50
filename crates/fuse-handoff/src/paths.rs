use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

/// Run-directory paths keyed by program name (pidfile and readiness
/// markers), plus the conventions for writing them.
#[derive(Debug, Clone)]
pub struct RunPaths {
    run_dir: PathBuf,
    prog_name: String,
}

impl RunPaths {
    pub fn new(run_dir: impl Into<PathBuf>, prog_name: impl Into<String>) -> Self {
        Self {
            run_dir: run_dir.into(),
            prog_name: prog_name.into(),
        }
    }

    pub fn pid_file(&self) -> PathBuf {
        self.run_dir.join(format!("{}.pid", self.prog_name))
    }

    /// Readiness marker for the process with the given pid.
    pub fn marker(&self, pid: i32) -> PathBuf {
        self.run_dir.join(format!("{}_{pid}", self.prog_name))
    }

    /// Record the current process's pid for external tracking.
    ///
    /// Overwrites in place and truncates to the exact length, so a shorter
    /// pid never leaves stale trailing digits from a longer predecessor.
    pub fn write_pid_file(&self) -> std::io::Result<()> {
        self.write_pid(std::process::id())
    }

    fn write_pid(&self, pid: u32) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .mode(0o644)
            .open(self.pid_file())?;
        file.seek(SeekFrom::Start(0))?;
        let text = pid.to_string();
        file.write_all(text.as_bytes())?;
        file.set_len(text.len() as u64)?;
        file.sync_all()?;
        Ok(())
    }

    /// Announce readiness to the parent: create this process's zero-byte
    /// marker. Created at most once per pid; the parent deletes it once
    /// observed.
    pub fn create_marker(&self, pid: i32) -> std::io::Result<()> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .mode(0o700)
            .open(self.marker(pid))?;
        Ok(())
    }

    /// Remove an observed marker.
    pub fn consume_marker(&self, pid: i32) -> std::io::Result<()> {
        std::fs::remove_file(self.marker(pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_shapes() {
        let paths = RunPaths::new("/run/fused", "fused");
        assert_eq!(paths.pid_file(), PathBuf::from("/run/fused/fused.pid"));
        assert_eq!(paths.marker(42), PathBuf::from("/run/fused/fused_42"));
    }

    #[test]
    fn pid_file_truncates_to_exact_length() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), "fused");

        paths.write_pid(123_456).unwrap();
        assert_eq!(std::fs::read_to_string(paths.pid_file()).unwrap(), "123456");

        paths.write_pid(7).unwrap();
        assert_eq!(std::fs::read_to_string(paths.pid_file()).unwrap(), "7");
    }

    #[test]
    fn write_pid_file_records_own_pid() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), "fused");

        paths.write_pid_file().unwrap();
        let content = std::fs::read_to_string(paths.pid_file()).unwrap();
        assert_eq!(content, std::process::id().to_string());
    }

    #[test]
    fn marker_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), "fused");

        paths.create_marker(42).unwrap();
        let marker = paths.marker(42);
        assert!(marker.exists());
        assert_eq!(std::fs::metadata(&marker).unwrap().len(), 0);

        paths.consume_marker(42).unwrap();
        assert!(!marker.exists());
        assert!(paths.consume_marker(42).is_err());
    }

    #[test]
    fn pid_file_fails_in_missing_dir() {
        let paths = RunPaths::new("/nonexistent/run", "fused");
        assert!(paths.write_pid_file().is_err());
    }
}
