// ─── Process Launch & Supervision ───
// Spawns the game process from the merged launch description and supervises
// it to exit, with its own inner state machine.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::core::auth::SessionToken;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::step::{LaunchStep, LogSink, MessageLevel};
use crate::core::launch::steps::command::forward_output;
use crate::core::launch::steps::java::JavaSlot;
use crate::core::profile::EffectiveLaunchDescription;
use crate::core::task::TaskContext;

/// Supervision states. `Finished` with a non-zero code and `Crashed` are
/// both failures, but their causes differ (graceful non-zero exit vs signal)
/// and they are reported distinctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    Starting,
    Running,
    Finished(i32),
    Crashed,
    Aborted,
    FailedToStart,
}

/// Everything needed to spawn the process, assembled from the merged
/// description, instance settings and session.
pub struct ProcessSpec {
    pub description: EffectiveLaunchDescription,
    pub libraries_dir: PathBuf,
    pub game_dir: PathBuf,
    pub session: SessionToken,
    pub min_memory_mb: Option<u64>,
    pub max_memory_mb: Option<u64>,
    /// Program that wraps the java invocation (e.g. a profiler or
    /// `gamemoderun`); the java command line becomes its arguments.
    pub wrapper: Option<String>,
    /// Spawn without supervising: the step still transitions through the
    /// same states but does not block on process exit.
    pub detached: bool,
}

pub struct DirectLaunchStep {
    spec: ProcessSpec,
    java: JavaSlot,
    fallback_java: PathBuf,
    phase: LaunchPhase,
}

impl DirectLaunchStep {
    pub fn new(spec: ProcessSpec, java: JavaSlot) -> Self {
        Self {
            spec,
            java,
            fallback_java: PathBuf::from(if cfg!(windows) { "java.exe" } else { "java" }),
            phase: LaunchPhase::Starting,
        }
    }

    pub fn phase(&self) -> LaunchPhase {
        self.phase
    }

    fn classpath_string(&self) -> String {
        let separator = if cfg!(windows) { ";" } else { ":" };
        self.spec
            .description
            .classpath
            .iter()
            .map(|entry| {
                self.spec
                    .libraries_dir
                    .join(entry)
                    .to_string_lossy()
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn build_command(&self, java_bin: &Path) -> LauncherResult<tokio::process::Command> {
        let main_class = self
            .spec
            .description
            .main_class
            .as_deref()
            .ok_or_else(|| LauncherError::FailedToStart("no main class resolved".into()))?;

        let classpath = self.classpath_string();
        if classpath.is_empty() {
            return Err(LauncherError::FailedToStart("empty classpath".into()));
        }

        let mut argv: Vec<String> = Vec::new();
        if let Some(min) = self.spec.min_memory_mb {
            argv.push(format!("-Xms{min}M"));
        }
        if let Some(max) = self.spec.max_memory_mb {
            argv.push(format!("-Xmx{max}M"));
        }
        argv.extend(sanitize_jvm_args(&self.spec.description.jvm_args, &classpath));
        argv.push("-cp".into());
        argv.push(classpath);
        argv.push(main_class.to_string());
        argv.extend(game_args(
            self.spec.description.minecraft_args.as_deref(),
            &self.spec.session,
            &self.spec.game_dir,
        ));

        let mut command = match &self.spec.wrapper {
            Some(wrapper) => {
                let mut command = tokio::process::Command::new(wrapper);
                command.arg(java_bin);
                command.args(&argv);
                command
            }
            None => {
                let mut command = tokio::process::Command::new(java_bin);
                command.args(&argv);
                command
            }
        };
        command
            .current_dir(&self.spec.game_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if !self.spec.detached {
            // A supervised child must not outlive a dropped supervisor.
            command.kill_on_drop(true);
        }
        Ok(command)
    }
}

#[async_trait]
impl LaunchStep for DirectLaunchStep {
    fn name(&self) -> &str {
        "launch process"
    }

    async fn execute(&mut self, ctx: &TaskContext, log: &LogSink) -> LauncherResult<()> {
        self.phase = LaunchPhase::Starting;

        let java_bin = self
            .java
            .get()
            .unwrap_or_else(|| self.fallback_java.clone());
        let mut command = self.build_command(&java_bin)?;

        std::fs::create_dir_all(&self.spec.game_dir).map_err(|source| LauncherError::Io {
            path: self.spec.game_dir.clone(),
            source,
        })?;

        info!("spawning game process with {:?}", java_bin);
        log.push(
            MessageLevel::Launcher,
            format!("Starting process with runtime {}", java_bin.display()),
        );

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                self.phase = LaunchPhase::FailedToStart;
                return Err(LauncherError::FailedToStart(format!(
                    "{}: {err}",
                    java_bin.display()
                )));
            }
        };
        self.phase = LaunchPhase::Running;
        forward_output(&mut child, log);

        if self.spec.detached {
            log.push(
                MessageLevel::Launcher,
                "Detached launch: not supervising process exit",
            );
            return Ok(());
        }

        let waited = tokio::select! {
            _ = ctx.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = waited else {
            // The process may already be gone; killing then is a no-op.
            let _ = child.start_kill();
            let _ = child.wait().await;
            self.phase = LaunchPhase::Aborted;
            log.push(MessageLevel::Launcher, "Process aborted on request");
            return Err(LauncherError::Aborted);
        };
        let status = status
            .map_err(|err| LauncherError::Other(format!("waiting on process failed: {err}")))?;

        match status.code() {
            Some(0) => {
                self.phase = LaunchPhase::Finished(0);
                log.push(MessageLevel::Launcher, "Process exited normally");
                Ok(())
            }
            Some(code) => {
                self.phase = LaunchPhase::Finished(code);
                log.push(
                    MessageLevel::Fatal,
                    format!("Process exited with code {code}"),
                );
                Err(LauncherError::Crashed(format!("exit code {code}")))
            }
            None => {
                self.phase = LaunchPhase::Crashed;
                let detail = signal_detail(&status);
                log.push(
                    MessageLevel::Fatal,
                    format!("Process was terminated abnormally ({detail})"),
                );
                Err(LauncherError::Crashed(detail))
            }
        }
    }
}

#[cfg(unix)]
fn signal_detail(status: &std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => format!("killed by signal {signal}"),
        None => "no exit code".to_string(),
    }
}

#[cfg(not(unix))]
fn signal_detail(_status: &std::process::ExitStatus) -> String {
    "no exit code".to_string()
}

/// The launcher owns `-cp`; loader-provided classpath switches are dropped
/// with their value, and placeholder references resolve against the real
/// classpath. Anything still holding an unknown placeholder is dropped.
fn sanitize_jvm_args(raw: &[String], classpath: &str) -> Vec<String> {
    let separator = if cfg!(windows) { ";" } else { ":" };
    let mut sanitized = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let arg = &raw[i];
        if arg == "-cp" || arg == "-classpath" || arg == "--class-path" {
            i += 2;
            continue;
        }
        let resolved = arg
            .replace("${classpath}", classpath)
            .replace("${classpath_separator}", separator);
        if resolved.contains("${") {
            debug!("dropping jvm arg with unresolved placeholder: {}", arg);
            // A bare value was meant for the flag before it; a `-X`/`-D`
            // style token stands alone.
            if !resolved.starts_with('-') {
                drop_dangling_option(&mut sanitized);
            }
            i += 1;
            continue;
        }
        sanitized.push(resolved);
        i += 1;
    }
    sanitized
}

/// Substitute the session and directory placeholders into the argument
/// template. Tokens left with an unknown placeholder are dropped, along
/// with the option flag they belonged to.
fn game_args(template: Option<&str>, session: &SessionToken, game_dir: &Path) -> Vec<String> {
    let Some(template) = template else {
        return Vec::new();
    };
    let game_dir = game_dir.to_string_lossy();
    let user_type = if session.online { "msa" } else { "legacy" };

    let mut args = Vec::new();
    for token in template.split_whitespace() {
        let resolved = token
            .replace("${auth_player_name}", &session.player_name)
            .replace("${auth_uuid}", &session.uuid)
            .replace("${auth_access_token}", &session.access_token)
            .replace("${auth_session}", &session.access_token)
            .replace("${user_type}", user_type)
            .replace("${game_directory}", &game_dir)
            .replace("${user_properties}", "{}");
        if resolved.contains("${") {
            if !resolved.starts_with('-') {
                drop_dangling_option(&mut args);
            }
            continue;
        }
        args.push(resolved);
    }
    args
}

fn drop_dangling_option(args: &mut Vec<String>) {
    if args.last().is_some_and(|last| last.starts_with('-')) {
        let _ = args.pop();
    }
}
