/// The kill protocol: ask a worker to exit itself via a cooperative
/// message, wait out a bounded grace period, then escalate to forced
/// termination. Resolves exactly once with the worker's final status.
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::handle::{next_event, WorkerHandle};
use crate::outcome::{KillError, WorkerFault};

/// Grace period used when the caller has no opinion.
pub const DEFAULT_GRACE: Duration = Duration::from_millis(1000);

/// Ask the worker behind `handle` to exit by sending it `kill_msg`, wait
/// up to `grace` for a voluntary exit, then force-terminate it.
///
/// Resolves exactly once, under every interleaving of exit, fault, and
/// timer events:
/// - `Ok(0)` — the worker exited with code 0, whether voluntarily or
///   after forced termination.
/// - `Err(KillError::NonZeroExit)` — voluntary exit with a non-zero code.
/// - `Err(KillError::Forced)` — the grace period elapsed and forced
///   termination produced a non-zero code.
/// - `Err(KillError::Fault)` — out-of-band failure; no exit code can be
///   trusted, so the fault itself is reported.
///
/// Race policy: the exit notification is polled at the highest priority,
/// so a voluntary exit that becomes ready together with the expired timer
/// still wins. During the forced phase the exit notification is likewise
/// preferred over `force_terminate`'s own return value — first to arrive
/// decides, and the notification channel stays the source of truth for
/// the code when both are available.
///
/// The grace timer and both subscriptions are owned by this invocation
/// and dropped on every return path; events arriving after resolution are
/// unobservable no-ops.
pub async fn kill_worker<H: WorkerHandle>(
    handle: &H,
    kill_msg: H::Message,
    grace: Duration,
) -> Result<i32, KillError> {
    // Armed: subscribe before sending so a fast exit cannot be missed,
    // then start the grace timer and deliver the kill message.
    let mut exit_rx = handle.watch_exit();
    let mut fault_rx = handle.watch_fault();
    let deadline = tokio::time::sleep(grace);
    tokio::pin!(deadline);

    handle.send(kill_msg);
    debug!(grace_ms = grace.as_millis() as u64, "kill message sent, awaiting worker exit");

    // Deciding: first of {exit, fault, deadline} wins.
    tokio::select! {
        biased;
        exit = next_event(&mut exit_rx, "exit") => classify_voluntary(exit),
        fault = next_event(&mut fault_rx, "fault") => resolve_fault(fault),
        _ = &mut deadline => {
            info!(grace_ms = grace.as_millis() as u64, "grace period elapsed, forcing termination");
            force(handle, &mut exit_rx, &mut fault_rx).await
        }
    }
}

/// [`kill_worker`] with [`DEFAULT_GRACE`].
pub async fn kill_worker_default<H: WorkerHandle>(
    handle: &H,
    kill_msg: H::Message,
) -> Result<i32, KillError> {
    kill_worker(handle, kill_msg, DEFAULT_GRACE).await
}

/// Escalation after the grace period: invoke forced termination and let
/// the exit notification, a fault, and the forced call's own completion
/// race. A fault raised by `force_terminate` itself is never dropped.
async fn force<H: WorkerHandle>(
    handle: &H,
    exit_rx: &mut watch::Receiver<Option<i32>>,
    fault_rx: &mut watch::Receiver<Option<WorkerFault>>,
) -> Result<i32, KillError> {
    let forced = handle.force_terminate();
    tokio::pin!(forced);

    tokio::select! {
        biased;
        exit = next_event(exit_rx, "exit") => classify_forced(exit),
        fault = next_event(fault_rx, "fault") => resolve_fault(fault),
        result = &mut forced => match result {
            Ok(code) => classify_forced(Ok(code)),
            Err(fault) => {
                warn!(%fault, "forced termination faulted");
                Err(KillError::Fault { source: fault })
            }
        }
    }
}

fn classify_voluntary(exit: Result<i32, WorkerFault>) -> Result<i32, KillError> {
    match exit {
        Ok(0) => {
            debug!("worker exited cleanly");
            Ok(0)
        }
        Ok(code) => {
            warn!(code, "worker exited with non-zero code");
            Err(KillError::NonZeroExit { code })
        }
        Err(source) => {
            warn!(%source, "worker exit channel broke");
            Err(KillError::Fault { source })
        }
    }
}

fn classify_forced(exit: Result<i32, WorkerFault>) -> Result<i32, KillError> {
    match exit {
        Ok(0) => {
            debug!("forced termination reported exit code 0");
            Ok(0)
        }
        Ok(code) => {
            warn!(code, "worker was forcibly terminated");
            Err(KillError::Forced { code })
        }
        Err(source) => Err(KillError::Fault { source }),
    }
}

fn resolve_fault(fault: Result<WorkerFault, WorkerFault>) -> Result<i32, KillError> {
    // Either the published fault or a broken fault channel; both mean the
    // exit code can no longer be trusted.
    let source = fault.unwrap_or_else(|closed| closed);
    warn!(%source, "worker faulted");
    Err(KillError::Fault { source })
}
