/// The worker-side capability consumed by the kill protocol.
///
/// A worker is any schedulable unit of execution (tokio task, child
/// process) that can receive an opaque message, report an integer exit
/// code exactly once, and be force-terminated. Notifications are exposed
/// as `tokio::sync::watch` channels holding `None` until the event fires:
/// late subscribers see an already-fired event immediately, and dropping a
/// receiver is an idempotent unsubscribe.
use async_trait::async_trait;
use tokio::sync::watch;

use crate::outcome::WorkerFault;

/// A worker that can be messaged, asked to exit, and forcibly killed.
#[async_trait]
pub trait WorkerHandle: Send + Sync {
    /// Opaque message type understood by the worker. The kill protocol
    /// does not interpret it.
    type Message: Send + 'static;

    /// Best-effort delivery. A delivery failure surfaces on the fault
    /// channel, not as a return value.
    fn send(&self, message: Self::Message);

    /// Exit notification: set exactly once per worker lifetime with the
    /// worker's exit code, regardless of cause (voluntary, errored, or
    /// forced).
    fn watch_exit(&self) -> watch::Receiver<Option<i32>>;

    /// Fault notification: out-of-band failure. May fire instead of or in
    /// addition to the exit notification; whichever a consumer observes
    /// first is authoritative.
    fn watch_fault(&self) -> watch::Receiver<Option<WorkerFault>>;

    /// Forcibly end the worker. The resulting exit code is published on
    /// the exit channel before this call completes, and the same code is
    /// returned here. May itself fault.
    async fn force_terminate(&self) -> Result<i32, WorkerFault>;
}

/// Await the worker's exit notification without initiating a kill.
pub async fn wait_for_exit<H: WorkerHandle + ?Sized>(handle: &H) -> Result<i32, WorkerFault> {
    let mut rx = handle.watch_exit();
    next_event(&mut rx, "exit").await
}

/// Await the first published value on a notification channel.
///
/// A closed channel (every sender dropped without publishing) means the
/// worker vanished without reporting, which is itself a fault.
pub(crate) async fn next_event<T: Clone>(
    rx: &mut watch::Receiver<Option<T>>,
    channel: &str,
) -> Result<T, WorkerFault> {
    loop {
        if let Some(value) = rx.borrow_and_update().clone() {
            return Ok(value);
        }
        if rx.changed().await.is_err() {
            return Err(WorkerFault::new(format!(
                "worker {} channel closed before any notification",
                channel
            )));
        }
    }
}

/// Notification publisher shared between a worker's background tasks and
/// its handle. Both channels are write-once: the first publisher wins and
/// later publishes are no-ops, which keeps the two exit-reporting paths
/// (voluntary exit vs. forced termination) from ever disagreeing.
pub(crate) struct Events {
    exit: watch::Sender<Option<i32>>,
    fault: watch::Sender<Option<WorkerFault>>,
}

impl Events {
    pub(crate) fn new() -> Self {
        Self {
            exit: watch::channel(None).0,
            fault: watch::channel(None).0,
        }
    }

    pub(crate) fn subscribe_exit(&self) -> watch::Receiver<Option<i32>> {
        self.exit.subscribe()
    }

    pub(crate) fn subscribe_fault(&self) -> watch::Receiver<Option<WorkerFault>> {
        self.fault.subscribe()
    }

    /// Record the worker's exit code. First writer wins; returns the code
    /// that is actually recorded.
    pub(crate) fn publish_exit(&self, code: i32) -> i32 {
        let mut recorded = code;
        self.exit.send_if_modified(|slot| match *slot {
            Some(existing) => {
                recorded = existing;
                false
            }
            None => {
                *slot = Some(code);
                true
            }
        });
        recorded
    }

    /// Record an out-of-band fault. First writer wins.
    pub(crate) fn publish_fault(&self, fault: WorkerFault) {
        self.fault.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(fault);
            true
        });
    }
}
