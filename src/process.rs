/// Child-process worker messaged over stdin.
///
/// The worker is spawned with a piped stdin; each message is one JSON
/// value written as a single line. A monitor task waits on the child and
/// publishes its exit code; forced termination is SIGKILL followed by the
/// monitor's report, so the exit notification always precedes the forced
/// call's own completion.
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::handle::{next_event, Events, WorkerHandle};
use crate::outcome::WorkerFault;

/// A worker running as a child process.
pub struct ProcessWorker {
    pid: u32,
    msg_tx: mpsc::UnboundedSender<serde_json::Value>,
    events: Arc<Events>,
}

impl ProcessWorker {
    /// Spawn `command` as a worker. Stdin is re-piped for message
    /// delivery; stdout/stderr keep whatever the caller configured.
    pub fn spawn(mut command: Command) -> io::Result<ProcessWorker> {
        command.stdin(std::process::Stdio::piped());
        let mut child = command.spawn()?;

        let pid = child.id().ok_or_else(|| {
            io::Error::other("child exited before its PID could be read")
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("child stdin was not captured"))?;

        let events = Arc::new(Events::new());
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();

        tokio::spawn(write_messages(stdin, msg_rx, Arc::clone(&events)));
        tokio::spawn(monitor_exit(child, Arc::clone(&events)));

        info!(pid, "worker subprocess started");
        Ok(ProcessWorker {
            pid,
            msg_tx,
            events,
        })
    }

    /// Child PID (for logging/diagnostics).
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

#[async_trait]
impl WorkerHandle for ProcessWorker {
    type Message = serde_json::Value;

    fn send(&self, message: serde_json::Value) {
        if self.msg_tx.send(message).is_err() {
            self.events.publish_fault(WorkerFault::new(
                "worker stdin writer stopped, message not delivered",
            ));
        }
    }

    fn watch_exit(&self) -> watch::Receiver<Option<i32>> {
        self.events.subscribe_exit()
    }

    fn watch_fault(&self) -> watch::Receiver<Option<WorkerFault>> {
        self.events.subscribe_fault()
    }

    /// SIGKILL the child, then await the monitor's exit report so the
    /// returned code matches the notification channel.
    async fn force_terminate(&self) -> Result<i32, WorkerFault> {
        force_kill(self.pid)?;
        debug!(pid = self.pid, "SIGKILL delivered, awaiting exit report");
        let mut exit_rx = self.events.subscribe_exit();
        next_event(&mut exit_rx, "exit").await
    }
}

/// Drain queued messages onto the child's stdin, one JSON line each.
/// A failed write means the channel to the worker is broken.
async fn write_messages(
    mut stdin: ChildStdin,
    mut msg_rx: mpsc::UnboundedReceiver<serde_json::Value>,
    events: Arc<Events>,
) {
    while let Some(msg) = msg_rx.recv().await {
        let mut line = msg.to_string();
        line.push('\n');
        if let Err(err) = stdin.write_all(line.as_bytes()).await {
            warn!(error = %err, "failed to write message to worker stdin");
            events.publish_fault(WorkerFault::new(format!(
                "failed to deliver message to worker stdin: {}",
                err
            )));
            return;
        }
        if let Err(err) = stdin.flush().await {
            events.publish_fault(WorkerFault::new(format!(
                "failed to flush worker stdin: {}",
                err
            )));
            return;
        }
    }
}

/// Reap the child and publish its exit code exactly once.
async fn monitor_exit(mut child: Child, events: Arc<Events>) {
    match child.wait().await {
        Ok(status) => {
            let code = exit_code(status);
            debug!(code, "worker subprocess exited");
            events.publish_exit(code);
        }
        Err(err) => {
            events.publish_fault(WorkerFault::new(format!(
                "failed to reap worker process: {}",
                err
            )));
        }
    }
}

/// Map an `ExitStatus` to a single integer: the exit code, or 128+signo
/// for signal deaths (shell convention), so a SIGKILLed worker reports
/// 137 rather than nothing.
fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(-1)
}

#[cfg(unix)]
fn force_kill(pid: u32) -> Result<(), WorkerFault> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    match signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => Ok(()),
        // Already gone; the monitor publishes (or published) the code.
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(err) => Err(WorkerFault::new(format!(
            "SIGKILL failed for pid {}: {}",
            pid, err
        ))),
    }
}

#[cfg(not(unix))]
fn force_kill(_pid: u32) -> Result<(), WorkerFault> {
    Err(WorkerFault::new(
        "forced termination is only supported on Unix",
    ))
}
