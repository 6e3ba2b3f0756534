// ─── Launch Assembly ───
// Builds the step sequence for one launch attempt from the instance, its
// merged description, and the settings store. Presence and ordering of the
// optional steps is configuration-driven.

use reqwest::Client;

use crate::core::auth::SessionToken;
use crate::core::config::ConfigStore;
use crate::core::instance::Instance;
use crate::core::java::{AutoInstallJava, JavaSettings};
use crate::core::launch::steps::{AutoInstallJavaStep, CommandStep, DirectLaunchStep, JavaSlot, ProcessSpec};
use crate::core::launch::task::LaunchTask;
use crate::core::paths::Paths;
use crate::core::profile::EffectiveLaunchDescription;

pub struct LaunchOptions {
    pub paths: Paths,
    pub client: Client,
}

impl LaunchOptions {
    pub fn new(paths: Paths) -> Result<Self, reqwest::Error> {
        Ok(Self {
            paths,
            client: crate::core::http::build_http_client()?,
        })
    }
}

/// Standard sequence: pre-launch command, java provisioning, process spawn
/// and supervision, post-exit command (teardown).
pub fn build_launch_task(
    instance: &Instance,
    description: &EffectiveLaunchDescription,
    config: &dyn ConfigStore,
    session: SessionToken,
    options: LaunchOptions,
) -> LaunchTask {
    let mut task = LaunchTask::new();
    if session.online {
        task.censor(session.access_token.clone(), "<access token>");
    }

    let variables = instance.hook_variables();

    if let Some(command) = nonempty(config.get_string("PreLaunchCommand")) {
        task.append_step(Box::new(
            CommandStep::new("pre-launch command", command)
                .with_variables(variables.clone())
                .with_workdir(instance.path.clone()),
        ));
    }

    let java_slot = JavaSlot::default();
    let resolver = AutoInstallJava::new(
        options.client.clone(),
        options.paths.runtimes_dir(),
        JavaSettings::from_config(config),
    );
    task.append_step(Box::new(AutoInstallJavaStep::new(
        resolver,
        description.compatible_java_majors.clone(),
        java_slot.clone(),
    )));

    let spec = ProcessSpec {
        description: description.clone(),
        libraries_dir: options.paths.libraries_dir(),
        game_dir: instance.game_dir(),
        session,
        min_memory_mb: config.get_u64("MinMemAlloc"),
        max_memory_mb: config.get_u64("MaxMemAlloc"),
        wrapper: nonempty(config.get_string("WrapperCommand")),
        detached: config.get_bool("DetachedLaunch").unwrap_or(false),
    };
    task.append_step(Box::new(DirectLaunchStep::new(spec, java_slot)));

    if let Some(command) = nonempty(config.get_string("PostExitCommand")) {
        task.append_step(Box::new(
            CommandStep::new("post-exit command", command)
                .with_variables(variables)
                .with_workdir(instance.path.clone())
                .as_teardown(),
        ));
    }

    task
}

fn nonempty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
