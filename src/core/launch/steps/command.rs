// ─── Hook Command Step ───
// Runs a user-configured pre-launch / post-exit command with `$INST_*`
// variable expansion. Post-exit hooks are teardown steps so they still run
// after a crash, restoring whatever the pre-launch hook changed.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::step::{LaunchStep, LogSink, MessageLevel};
use crate::core::task::TaskContext;

pub struct CommandStep {
    name: String,
    command: String,
    variables: Vec<(String, String)>,
    workdir: Option<PathBuf>,
    teardown: bool,
}

impl CommandStep {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            variables: Vec::new(),
            workdir: None,
            teardown: false,
        }
    }

    /// Variables available both as `$NAME` substitutions in the command
    /// line and as environment variables of the spawned process.
    pub fn with_variables(mut self, variables: Vec<(String, String)>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_workdir(mut self, workdir: PathBuf) -> Self {
        self.workdir = Some(workdir);
        self
    }

    pub fn as_teardown(mut self) -> Self {
        self.teardown = true;
        self
    }
}

#[async_trait]
impl LaunchStep for CommandStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_teardown(&self) -> bool {
        self.teardown
    }

    async fn execute(&mut self, ctx: &TaskContext, log: &LogSink) -> LauncherResult<()> {
        let expanded = expand_variables(&self.command, &self.variables);
        let argv = split_command_line(&expanded);
        let Some((program, args)) = argv.split_first() else {
            log.push(
                MessageLevel::Launcher,
                format!("{}: empty command, skipping", self.name),
            );
            return Ok(());
        };

        log.push(
            MessageLevel::Launcher,
            format!("{}: running `{}`", self.name, expanded),
        );

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .envs(self.variables.iter().cloned())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(workdir) = &self.workdir {
            command.current_dir(workdir);
        }

        let mut child = command
            .spawn()
            .map_err(|err| LauncherError::FailedToStart(format!("{program}: {err}")))?;

        forward_output(&mut child, log);

        let waited = tokio::select! {
            _ = ctx.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = waited else {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(LauncherError::Aborted);
        };
        let status = status.map_err(|err| {
            LauncherError::Other(format!("{}: wait failed: {err}", self.name))
        })?;

        if status.success() {
            debug!("{} finished", self.name);
            Ok(())
        } else {
            let code = status.code().unwrap_or(-1);
            log.push(
                MessageLevel::Fatal,
                format!("{}: command exited with code {code}", self.name),
            );
            Err(LauncherError::Other(format!(
                "{} exited with code {code}",
                self.name
            )))
        }
    }
}

/// Pipe a child's stdout/stderr into the log sink.
pub(super) fn forward_output(child: &mut tokio::process::Child, log: &LogSink) {
    if let Some(stdout) = child.stdout.take() {
        let log = log.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log.push(guess_level(&line, MessageLevel::Info), line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let log = log.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log.push(guess_level(&line, MessageLevel::Warning), line);
            }
        });
    }
}

pub(super) fn guess_level(line: &str, fallback: MessageLevel) -> MessageLevel {
    if line.contains("FATAL") {
        MessageLevel::Fatal
    } else if line.contains("ERROR") || line.contains("WARN") {
        MessageLevel::Warning
    } else {
        fallback
    }
}

/// Expand `$NAME` / `${NAME}` references from the variable list. Unknown
/// references are left in place for the shell-literate to notice.
pub fn expand_variables(input: &str, variables: &[(String, String)]) -> String {
    let mut result = input.to_string();
    // Longer names first so $INST_DIR does not clobber $INST_DIR_MODS.
    let mut sorted: Vec<&(String, String)> = variables.iter().collect();
    sorted.sort_by_key(|(name, _)| std::cmp::Reverse(name.len()));
    for (name, value) in sorted {
        result = result.replace(&format!("${{{name}}}"), value);
        result = result.replace(&format!("${name}"), value);
    }
    result
}

/// Split a command line on whitespace, honoring single and double quotes.
pub fn split_command_line(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        parts.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
