/// In-process worker backed by a tokio task.
///
/// The task drains a mailbox of opaque messages through a caller-supplied
/// handler; the handler decides per message whether to keep going, exit
/// with a code, or report a fault. Forced termination aborts the task.
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::handle::{Events, WorkerHandle};
use crate::outcome::WorkerFault;

/// Exit code recorded when the worker is aborted by forced termination.
pub const FORCED_EXIT_CODE: i32 = 1;

/// Directive returned by a worker's message handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Keep processing messages.
    Continue,
    /// Exit voluntarily with this code.
    Exit(i32),
    /// Report an out-of-band failure and stop.
    Fault(WorkerFault),
}

/// A tokio-task worker that can be messaged, asked to exit, and aborted.
pub struct TaskWorker<M> {
    msg_tx: mpsc::UnboundedSender<M>,
    events: Arc<Events>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl<M: Send + 'static> TaskWorker<M> {
    /// Spawn a worker task that feeds every received message through
    /// `handler` until the handler exits, faults, or the handle is
    /// dropped.
    pub fn spawn<F>(mut handler: F) -> Self
    where
        F: FnMut(M) -> Flow + Send + 'static,
    {
        let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();
        let events = Arc::new(Events::new());

        let task_events = Arc::clone(&events);
        let join = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                match handler(msg) {
                    Flow::Continue => {}
                    Flow::Exit(code) => {
                        debug!(code, "worker exiting voluntarily");
                        task_events.publish_exit(code);
                        return;
                    }
                    Flow::Fault(fault) => {
                        debug!(%fault, "worker reporting fault");
                        task_events.publish_fault(fault);
                        return;
                    }
                }
            }
            // Mailbox closed: the handle was dropped, nothing to report.
        });

        Self {
            msg_tx,
            events,
            join: Mutex::new(Some(join)),
        }
    }

    /// The recorded exit code, if the worker has ended.
    pub fn exit_code(&self) -> Option<i32> {
        *self.events.subscribe_exit().borrow()
    }
}

#[async_trait]
impl<M: Send + 'static> WorkerHandle for TaskWorker<M> {
    type Message = M;

    fn send(&self, message: M) {
        if self.msg_tx.send(message).is_err() {
            // Worker task is gone; the exit or fault channel already
            // carries the reason, but a silent drop would hide a delivery
            // failure to a vanished worker.
            self.events
                .publish_fault(WorkerFault::new("worker mailbox closed, message not delivered"));
        }
    }

    fn watch_exit(&self) -> watch::Receiver<Option<i32>> {
        self.events.subscribe_exit()
    }

    fn watch_fault(&self) -> watch::Receiver<Option<WorkerFault>> {
        self.events.subscribe_fault()
    }

    /// Abort the worker task and record [`FORCED_EXIT_CODE`]. If the
    /// worker already exited, the prior code stands and is returned. The
    /// exit notification is published before this call completes.
    async fn force_terminate(&self) -> Result<i32, WorkerFault> {
        let join = self.join.lock().await.take();
        if let Some(join) = join {
            join.abort();
            if let Err(err) = join.await {
                if !err.is_cancelled() {
                    // The handler panicked before the abort landed.
                    let fault = WorkerFault::new(format!("worker task failed: {}", err));
                    self.events.publish_fault(fault.clone());
                    return Err(fault);
                }
            }
        }
        Ok(self.events.publish_exit(FORCED_EXIT_CODE))
    }
}
