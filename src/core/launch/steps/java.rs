// ─── AutoInstallJava Step ───
// Resolves a runtime before the process step runs. Java trouble is always
// recoverable: the step warns and lets the launch continue on the system
// runtime; only cancellation stops the pipeline here.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::core::error::LauncherResult;
use crate::core::java::AutoInstallJava;
use crate::core::launch::step::{LaunchStep, LogSink, MessageLevel};
use crate::core::task::TaskContext;

/// Where the resolved runtime path is published for the process step.
#[derive(Clone, Default)]
pub struct JavaSlot(Arc<Mutex<Option<PathBuf>>>);

impl JavaSlot {
    pub fn set(&self, path: PathBuf) {
        *self.0.lock().expect("java slot lock poisoned") = Some(path);
    }

    pub fn get(&self) -> Option<PathBuf> {
        self.0.lock().expect("java slot lock poisoned").clone()
    }
}

pub struct AutoInstallJavaStep {
    resolver: AutoInstallJava,
    majors: Vec<u32>,
    slot: JavaSlot,
}

impl AutoInstallJavaStep {
    pub fn new(resolver: AutoInstallJava, majors: Vec<u32>, slot: JavaSlot) -> Self {
        Self {
            resolver,
            majors,
            slot,
        }
    }
}

#[async_trait]
impl LaunchStep for AutoInstallJavaStep {
    fn name(&self) -> &str {
        "prepare java runtime"
    }

    async fn execute(&mut self, ctx: &TaskContext, log: &LogSink) -> LauncherResult<()> {
        if self.majors.is_empty() {
            log.push(
                MessageLevel::Launcher,
                "Profile declares no compatible java majors; using the default runtime",
            );
            return Ok(());
        }

        match self.resolver.ensure_runtime(&self.majors, ctx).await {
            Ok(Some(path)) => {
                log.push(
                    MessageLevel::Launcher,
                    format!("Java runtime ready at {}", path.display()),
                );
                self.slot.set(path);
                Ok(())
            }
            Ok(None) => {
                log.push(
                    MessageLevel::Warning,
                    "No matching java runtime could be resolved; continuing with the system runtime",
                );
                Ok(())
            }
            Err(err) if err.is_abort() => Err(err),
            Err(err) => {
                log.push(
                    MessageLevel::Warning,
                    format!("Java resolution failed ({err}); continuing with the system runtime"),
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::java::JavaSettings;
    use crate::core::launch::step::LogSink;

    #[tokio::test]
    async fn unresolvable_java_is_a_warning_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = AutoInstallJava::new(
            reqwest::Client::new(),
            dir.path().to_path_buf(),
            JavaSettings {
                pinned_path: None,
                auto_download: false,
            },
        );
        let slot = JavaSlot::default();
        let mut step = AutoInstallJavaStep::new(resolver, vec![99], slot.clone());

        let (log, mut rx) = LogSink::new();
        let ctx = TaskContext::detached();
        step.execute(&ctx, &log).await.unwrap();
        assert!(slot.get().is_none());

        let mut saw_warning = false;
        while let Ok(line) = rx.try_recv() {
            if line.level == MessageLevel::Warning {
                saw_warning = true;
            }
        }
        assert!(saw_warning);
    }

    #[tokio::test]
    async fn pinned_runtime_lands_in_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let pinned = dir.path().join("java");
        std::fs::write(&pinned, b"").unwrap();

        let resolver = AutoInstallJava::new(
            reqwest::Client::new(),
            dir.path().to_path_buf(),
            JavaSettings {
                pinned_path: Some(pinned.clone()),
                auto_download: true,
            },
        );
        let slot = JavaSlot::default();
        let mut step = AutoInstallJavaStep::new(resolver, vec![17], slot.clone());

        let (log, _rx) = LogSink::new();
        let ctx = TaskContext::detached();
        step.execute(&ctx, &log).await.unwrap();
        assert_eq!(slot.get(), Some(pinned));
    }
}
