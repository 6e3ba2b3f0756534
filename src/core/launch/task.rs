// ─── LaunchTask ───
// Drives the ordered step list of one launch attempt. One task per attempt;
// a finished task is not reusable.

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::step::{LaunchStep, LogLine, LogSink, MessageLevel, StepState};
use crate::core::task::{Progress, TaskContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchState {
    Created,
    Running { step: usize },
    Succeeded,
    Failed,
    Aborted,
}

impl LaunchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LaunchState::Succeeded | LaunchState::Failed | LaunchState::Aborted
        )
    }
}

/// Cancels a running launch from outside. Cheap to clone; aborting an
/// already-terminal task is a no-op success.
#[derive(Clone)]
pub struct LaunchAbortHandle {
    token: CancellationToken,
}

impl LaunchAbortHandle {
    pub fn abort(&self) -> bool {
        self.token.cancel();
        true
    }
}

struct StepEntry {
    step: Box<dyn LaunchStep>,
    state: StepState,
}

pub struct LaunchTask {
    steps: Vec<StepEntry>,
    state: LaunchState,
    ctx: TaskContext,
    progress_rx: watch::Receiver<Progress>,
    log: LogSink,
    log_rx: Option<mpsc::UnboundedReceiver<LogLine>>,
}

impl LaunchTask {
    pub fn new() -> Self {
        let (ctx, progress_rx) = TaskContext::new();
        let (log, log_rx) = LogSink::new();
        Self {
            steps: Vec::new(),
            state: LaunchState::Created,
            ctx,
            progress_rx,
            log,
            log_rx: Some(log_rx),
        }
    }

    pub fn append_step(&mut self, step: Box<dyn LaunchStep>) {
        self.steps.push(StepEntry {
            step,
            state: StepState::NotStarted,
        });
    }

    pub fn prepend_step(&mut self, step: Box<dyn LaunchStep>) {
        self.steps.insert(
            0,
            StepEntry {
                step,
                state: StepState::NotStarted,
            },
        );
    }

    /// Register a secret to censor out of every log line.
    pub fn censor(&mut self, secret: impl Into<String>, replacement: impl Into<String>) {
        self.log.add_censor(secret, replacement);
    }

    pub fn state(&self) -> &LaunchState {
        &self.state
    }

    pub fn step_states(&self) -> Vec<(String, StepState)> {
        self.steps
            .iter()
            .map(|entry| (entry.step.name().to_string(), entry.state))
            .collect()
    }

    /// The launch log stream; can be taken once.
    pub fn take_log_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<LogLine>> {
        self.log_rx.take()
    }

    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress_rx.clone()
    }

    pub fn abort_handle(&self) -> LaunchAbortHandle {
        LaunchAbortHandle {
            token: self.ctx.token(),
        }
    }

    /// Request cancellation. Safe from any state and idempotent; on an
    /// already-terminal task this is a no-op success.
    pub fn abort(&self) -> bool {
        if self.state.is_terminal() {
            return true;
        }
        self.ctx.cancel();
        true
    }

    /// Execute the steps strictly in order. A step starts only after its
    /// predecessor succeeded; the first failure skips everything that
    /// remains except teardown steps, which run exactly once before the
    /// task reaches its terminal state.
    pub async fn run(&mut self) -> LauncherResult<()> {
        if self.state != LaunchState::Created {
            return Err(LauncherError::Other(
                "launch task already ran; create a fresh one per attempt".into(),
            ));
        }

        let mut failure: Option<LauncherError> = None;

        for index in 0..self.steps.len() {
            if self.ctx.is_cancelled() {
                break;
            }
            self.state = LaunchState::Running { step: index };
            self.steps[index].state = StepState::Running;
            let name = self.steps[index].step.name().to_string();
            self.log
                .push(MessageLevel::Launcher, format!("Step started: {name}"));
            self.ctx.set_step(name.clone());

            let step_ctx = self.ctx.child();
            let result = self.steps[index].step.execute(&step_ctx, &self.log).await;

            match result {
                Ok(()) => {
                    self.steps[index].state = StepState::Succeeded;
                }
                Err(err) if err.is_abort() || self.ctx.is_cancelled() => {
                    self.steps[index].state = StepState::Aborted;
                    self.log
                        .push(MessageLevel::Launcher, format!("Step aborted: {name}"));
                    break;
                }
                Err(err) => {
                    self.steps[index].state = StepState::Failed;
                    self.log
                        .push(MessageLevel::Fatal, format!("Step failed: {name}: {err}"));
                    failure = Some(err);
                    break;
                }
            }
        }

        if failure.is_none() && self.ctx.is_cancelled() {
            failure = Some(LauncherError::Aborted);
        }

        self.run_teardown_steps().await;

        match failure {
            None => {
                self.state = LaunchState::Succeeded;
                info!("launch finished");
                Ok(())
            }
            Some(LauncherError::Aborted) => {
                self.state = LaunchState::Aborted;
                info!("launch aborted");
                Err(LauncherError::Aborted)
            }
            Some(err) => {
                self.state = LaunchState::Failed;
                warn!("launch failed: {}", err);
                Err(err)
            }
        }
    }

    /// Run every teardown step that has not run yet, in reverse declared
    /// order, on a fresh context so an abort cannot cancel them. A teardown
    /// failure is logged but never changes the task outcome.
    async fn run_teardown_steps(&mut self) {
        for index in (0..self.steps.len()).rev() {
            let entry = &self.steps[index];
            if !entry.step.is_teardown() || entry.state != StepState::NotStarted {
                continue;
            }
            let name = entry.step.name().to_string();
            self.steps[index].state = StepState::Running;
            self.log
                .push(MessageLevel::Launcher, format!("Teardown step: {name}"));

            let teardown_ctx = TaskContext::detached();
            match self.steps[index].step.execute(&teardown_ctx, &self.log).await {
                Ok(()) => self.steps[index].state = StepState::Succeeded,
                Err(err) => {
                    self.steps[index].state = StepState::Failed;
                    self.log.push(
                        MessageLevel::Warning,
                        format!("Teardown step failed: {name}: {err}"),
                    );
                }
            }
        }
    }
}

impl Default for LaunchTask {
    fn default() -> Self {
        Self::new()
    }
}
