//! Gracefully terminate a worker: ask it to exit itself via an opaque
//! message, wait a bounded grace period for voluntary exit, then escalate
//! to forced termination. Every kill attempt resolves exactly once with
//! the worker's final status, distinguishing clean exit, non-zero exit,
//! forced kill, and out-of-band fault.
//!
//! The core primitive is [`kill::kill_worker`], generic over the
//! [`handle::WorkerHandle`] capability. Two handle implementations ship
//! with the crate: [`task::TaskWorker`] (an in-process tokio task) and
//! [`process::ProcessWorker`] (a child process messaged over stdin).

pub mod config;
pub mod handle;
pub mod kill;
pub mod outcome;
pub mod process;
pub mod task;

pub use handle::{wait_for_exit, WorkerHandle};
pub use kill::{kill_worker, kill_worker_default, DEFAULT_GRACE};
pub use outcome::{KillError, WorkerFault};
pub use process::ProcessWorker;
pub use task::{Flow, TaskWorker};
