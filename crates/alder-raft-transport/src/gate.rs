//! Shutdown gate for detached best-effort sends.

use std::future::Future;

use tokio_util::task::TaskTracker;

/// Tracks detached sends so shutdown can drain them.
///
/// The gate has two phases. While open, [`try_spawn`](Self::try_spawn)
/// registers and launches new work. Once [`close`](Self::close) has been
/// called the gate is closing: new work is rejected, and `close` returns
/// only after every previously registered task has finished. A gate
/// never reopens.
///
/// Registration and deregistration are handled by the underlying task
/// tracker: a task stops being tracked when it finishes, whether it
/// completed, panicked or was cancelled.
#[derive(Debug, Default)]
pub struct DispatchGate {
    tracker: TaskTracker,
}

impl DispatchGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Register `work` and spawn it as a detached task.
    ///
    /// Returns `false` without spawning when the gate is closing or
    /// closed. Must be called from within a Tokio runtime.
    pub fn try_spawn<F>(&self, work: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tracker.is_closed() {
            return false;
        }
        self.tracker.spawn(work);
        true
    }

    /// Close the gate and wait for all registered tasks to finish.
    ///
    /// Closing an already-closed gate is a no-op; if the tracked work
    /// has drained, the call completes immediately.
    pub async fn close(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Whether the gate has started closing.
    pub fn is_closed(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Number of registered tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;

    #[tokio::test]
    async fn open_gate_spawns_and_tracks_work() {
        let gate = DispatchGate::new();
        let release = Arc::new(Notify::new());

        let held = Arc::clone(&release);
        assert!(gate.try_spawn(async move {
            held.notified().await;
        }));
        assert_eq!(gate.in_flight(), 1);

        release.notify_one();
        gate.close().await;
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn closing_gate_rejects_new_work() {
        let gate = DispatchGate::new();
        gate.close().await;

        assert!(!gate.try_spawn(async {}));
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn close_waits_for_in_flight_work() {
        let gate = Arc::new(DispatchGate::new());
        let release = Arc::new(Notify::new());

        let held = Arc::clone(&release);
        gate.try_spawn(async move {
            held.notified().await;
        });

        let closing = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.close().await })
        };

        // The close cannot finish while the task is parked on the notify.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!closing.is_finished());
        assert_eq!(gate.in_flight(), 1);

        release.notify_one();
        closing.await.unwrap();
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn double_close_completes_immediately() {
        let gate = DispatchGate::new();
        gate.close().await;
        gate.close().await;
        assert!(gate.is_closed());
    }
}
