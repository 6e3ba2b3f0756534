// The launch pipeline: sequential, cancellable steps driven by a state
// machine, with teardown guarantees and process supervision.

mod builder;
mod step;
mod task;

pub mod steps;

pub use builder::{build_launch_task, LaunchOptions};
pub use step::{LaunchStep, LogLine, LogSink, MessageLevel, StepState};
pub use task::{LaunchAbortHandle, LaunchState, LaunchTask};
