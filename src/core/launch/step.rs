use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::error::LauncherResult;
use crate::core::task::TaskContext;

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Aborted,
}

/// Severity tag on a launch log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Fatal,
    /// Emitted by the launcher itself rather than the game process.
    Launcher,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub level: MessageLevel,
    pub line: String,
}

/// Fan-in for launch log lines, with private-info censoring applied before
/// anything leaves the pipeline.
#[derive(Clone)]
pub struct LogSink {
    tx: mpsc::UnboundedSender<LogLine>,
    censor: Vec<(String, String)>,
}

impl LogSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                censor: Vec::new(),
            },
            rx,
        )
    }

    /// Register a secret to be replaced in every line.
    pub fn add_censor(&mut self, secret: impl Into<String>, replacement: impl Into<String>) {
        let secret = secret.into();
        if !secret.is_empty() {
            self.censor.push((secret, replacement.into()));
        }
    }

    pub fn push(&self, level: MessageLevel, line: impl Into<String>) {
        let mut line = line.into();
        for (secret, replacement) in &self.censor {
            line = line.replace(secret, replacement);
        }
        // Receiver may be gone (headless launch); lines still reach the log.
        tracing::debug!("launch[{:?}]: {}", level, line);
        let _ = self.tx.send(LogLine { level, line });
    }
}

/// One unit of the launch pipeline.
///
/// The step set is closed and known at compile time; this trait is the small
/// capability surface the task drives them through. Cancellation arrives via
/// the context's token, which `execute` must observe at its suspension
/// points.
#[async_trait]
pub trait LaunchStep: Send {
    fn name(&self) -> &str;

    /// Teardown steps run exactly once even when an earlier step failed or
    /// the task was aborted (e.g. a post-exit hook restoring environment
    /// state after a crash).
    fn is_teardown(&self) -> bool {
        false
    }

    async fn execute(&mut self, ctx: &TaskContext, log: &LogSink) -> LauncherResult<()>;
}
