#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    /// The replacement process could not be spawned, or it exited before
    /// becoming ready. The current process keeps serving.
    #[error("restart failed, child exited")]
    RestartFailed,

    /// The replacement is still running but did not announce readiness
    /// within the timeout. The current process keeps serving; the stray
    /// child is the caller's to reconcile.
    #[error("restart triggered but child is not ready")]
    ChildNotReady,

    #[error("invalid handoff record {input:?}: expected \"<major>,<minor>\"")]
    Decode { input: String },

    #[error("inherited device descriptor: {0}")]
    InheritedFd(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("session error: {0}")]
    Session(#[from] fuse_session::SessionError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HandoffResult<T> = Result<T, HandoffError>;
