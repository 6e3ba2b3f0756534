pub mod core;

pub use crate::core::error::{LauncherError, LauncherResult};

/// Install a tracing subscriber honoring `RUST_LOG`, for embedders that do
/// not bring their own.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
