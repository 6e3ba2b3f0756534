mod command;
mod direct;
mod java;

pub use command::{expand_variables, split_command_line, CommandStep};
pub use direct::{DirectLaunchStep, LaunchPhase, ProcessSpec};
pub use java::{AutoInstallJavaStep, JavaSlot};
