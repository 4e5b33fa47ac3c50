use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::HandoffResult;

/// Single-slot event channel fed by an OS signal.
///
/// Deliveries that arrive while one is already pending collapse into it.
/// Tests feed the slot directly through [`SignalGate::pair`] instead of
/// raising real signals.
pub struct SignalGate {
    rx: mpsc::Receiver<()>,
}

impl SignalGate {
    /// Forward deliveries of a Unix signal into the gate.
    pub fn unix(kind: SignalKind) -> io::Result<Self> {
        let mut sig = signal(kind)?;
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            while sig.recv().await.is_some() {
                // A full slot means an event is already pending; drop the
                // delivery. A closed slot means the gate is gone.
                if tx.try_send(()).is_err() && tx.is_closed() {
                    return;
                }
            }
        });
        Ok(Self { rx })
    }

    /// A gate plus a sender standing in for the OS signal.
    pub fn pair() -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(1);
        (tx, Self { rx })
    }

    /// Wait for one delivery. Returns `false` if the feeding side is gone.
    pub async fn wait(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

/// Send a signal to another process (e.g. the "go" signal to a ready
/// child).
pub fn notify_process(pid: i32, sig: Signal) -> io::Result<()> {
    kill(Pid::from_raw(pid), sig).map_err(io::Error::from)
}

/// Run the restart watch until a restart succeeds.
///
/// Each delivery on `gate` invokes `callback`, except while a restart is
/// already in flight: the guard is a single compare-and-set on
/// `restarting`, never held across the (multi-second) callback, so a burst
/// of the same signal triggers exactly one attempt. A successful callback
/// ends the watch permanently (the process is being replaced); a failed
/// one clears the flag and keeps waiting for the next signal.
pub fn spawn_restart_watch<F, Fut>(
    mut gate: SignalGate,
    restarting: Arc<AtomicBool>,
    callback: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = HandoffResult<()>> + Send,
{
    tokio::spawn(async move {
        loop {
            if !gate.wait().await {
                return;
            }
            if restarting
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                continue;
            }
            info!(pid = std::process::id(), "restart triggered");
            match callback().await {
                Ok(()) => return,
                Err(e) => {
                    warn!(error = %e, "restart attempt failed, still serving");
                    restarting.store(false, Ordering::SeqCst);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::error::HandoffError;

    #[tokio::test(start_paused = true)]
    async fn burst_triggers_callback_once() {
        let (tx, gate) = SignalGate::pair();
        let restarting = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&calls);
        let handle = spawn_restart_watch(gate, Arc::clone(&restarting), move || {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        });

        // A signal burst: extra deliveries collapse into the full slot.
        for _ in 0..3 {
            let _ = tx.try_send(());
        }
        handle.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_restart_rearms_the_watch() {
        let (tx, gate) = SignalGate::pair();
        let restarting = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&calls);
        let flag = Arc::clone(&restarting);
        spawn_restart_watch(gate, Arc::clone(&restarting), move || {
            let counted = Arc::clone(&counted);
            async move {
                let n = counted.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(HandoffError::RestartFailed)
                } else {
                    Ok(())
                }
            }
        });

        tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!flag.load(Ordering::SeqCst));

        tx.send(()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_restart_stops_accepting_signals() {
        let (tx, gate) = SignalGate::pair();
        let restarting = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&calls);
        let handle = spawn_restart_watch(gate, restarting, move || {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tx.send(()).await.unwrap();
        handle.await.unwrap();

        // The watch is gone; further deliveries reach nobody.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let _ = tx.send(()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unix_gate_receives_a_real_signal() {
        let mut gate = SignalGate::unix(SignalKind::user_defined2()).unwrap();
        nix::sys::signal::raise(Signal::SIGUSR2).unwrap();
        let arrived = tokio::time::timeout(Duration::from_secs(5), gate.wait())
            .await
            .unwrap();
        assert!(arrived);
    }

    #[tokio::test]
    async fn notify_process_to_missing_pid_fails() {
        assert!(notify_process(99_999_999, Signal::SIGUSR1).is_err());
    }
}
