// ─── Task Contract ───
// Progress reporting and cancellation for every long-running operation.

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// A progress snapshot published by a running task.
///
/// `total: None` marks an indeterminate phase; consumers should then show the
/// `step` text instead of a percentage so the aggregate never stalls at a
/// misleading number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub current: u64,
    pub total: Option<u64>,
    pub step: String,
}

/// Handed by reference into every cancellable operation.
///
/// Cancellation uses child tokens: cancelling a parent context reaches every
/// live sub-task (each download inside a job, each job inside a launch step)
/// before the parent itself reports aborted. Cancelling is idempotent and
/// safe from any state.
#[derive(Debug, Clone)]
pub struct TaskContext {
    cancel: CancellationToken,
    progress: watch::Sender<Progress>,
}

impl TaskContext {
    /// Create a root context plus the receiver end of its progress channel.
    pub fn new() -> (Self, watch::Receiver<Progress>) {
        let (tx, rx) = watch::channel(Progress::default());
        (
            Self {
                cancel: CancellationToken::new(),
                progress: tx,
            },
            rx,
        )
    }

    /// A context whose progress nobody listens to. Used by fire-and-forget
    /// work and tests.
    pub fn detached() -> Self {
        Self::new().0
    }

    /// Derive a child context: shares the progress channel, and its token is
    /// cancelled whenever this one is.
    pub fn child(&self) -> TaskContext {
        Self {
            cancel: self.cancel.child_token(),
            progress: self.progress.clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Future resolving when this context is cancelled; for `select!`.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Clone of the raw token, for handing to detached supervisors.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn set_progress(&self, current: u64, total: Option<u64>) {
        self.progress.send_modify(|p| {
            p.current = current;
            p.total = total;
        });
    }

    pub fn set_step(&self, step: impl Into<String>) {
        let step = step.into();
        tracing::debug!("task step: {}", step);
        self.progress.send_modify(|p| p.step = step);
    }
}
