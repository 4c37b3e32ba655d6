/// Result taxonomy for one kill attempt: the single, final, typed outcome
/// distinguishing clean exit, error exit, forced kill, and out-of-band fault.
use std::fmt;

/// Out-of-band worker failure: a broken notification channel, a failed
/// message delivery, or an error raised by forced termination itself.
///
/// When a fault is reported, no exit code can be trusted, so the fault
/// replaces the code entirely. Cloneable so it can travel through
/// `tokio::sync::watch` notification channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFault {
    message: String,
}

impl WorkerFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for WorkerFault {}

/// Failure modes of a kill attempt. A successful attempt resolves to the
/// worker's exit code 0 instead; exit code 0 is the sole success signal,
/// even when it was produced by forced termination.
///
/// None of these are retried — a single kill attempt either succeeds or
/// reports a definitive failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillError {
    /// Worker exited on its own with a non-zero code after receiving the
    /// kill message.
    NonZeroExit { code: i32 },
    /// Worker did not exit within the grace period and was forcibly
    /// terminated; `code` is the exit code the forced kill produced.
    Forced { code: i32 },
    /// The worker or its communication channel failed out-of-band.
    Fault { source: WorkerFault },
}

impl KillError {
    /// Exit code carried by this failure, if the worker produced one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            KillError::NonZeroExit { code } | KillError::Forced { code } => Some(*code),
            KillError::Fault { .. } => None,
        }
    }

    /// Whether the worker had to be forcibly terminated.
    pub fn was_forced(&self) -> bool {
        matches!(self, KillError::Forced { .. })
    }
}

impl fmt::Display for KillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillError::NonZeroExit { code } => {
                write!(f, "worker exited with non-zero exit code {}", code)
            }
            KillError::Forced { code } => {
                write!(
                    f,
                    "worker ignored the grace period and was forcibly terminated (exit code {})",
                    code
                )
            }
            KillError::Fault { source } => {
                write!(f, "worker fault: {}", source)
            }
        }
    }
}

impl std::error::Error for KillError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KillError::Fault { source } => Some(source),
            _ => None,
        }
    }
}
