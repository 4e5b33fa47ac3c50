//! In-place upgrade for a kernel-serving daemon.
//!
//! Hands a live mount session from the running process to a freshly
//! exec'd replacement without unmounting and without dropping in-flight
//! requests. The two participants are separate processes, so the whole
//! protocol runs over OS primitives: an inherited environment record, an
//! inherited descriptor at a fixed slot, a readiness marker file, and a
//! pair of Unix signals.

mod controller;
mod error;
mod launch;
mod paths;
mod record;
mod signals;
mod watch;

pub use controller::RestartController;
pub use error::{HandoffError, HandoffResult};
pub use launch::{ChildLauncher, ExecLauncher};
pub use paths::RunPaths;
pub use record::{DEVICE_FD_SLOT, HANDOFF_ENV, HandoffRecord, inherited_device};
pub use signals::{SignalGate, notify_process, spawn_restart_watch};
pub use watch::ReadinessWatch;
