// Java runtime discovery and provisioning: probing local installs, scanning
// managed runtimes, and downloading a compatible runtime from the remote
// providers when none exists.

mod extract;
mod install;
mod install_list;
mod manifest;
mod probe;
mod providers;

pub use extract::{extract_zip_file, set_executable};
pub use install::{AutoInstallJava, JavaSettings};
pub use install_list::JavaInstallList;
pub use manifest::{EntryDownloads, EntryKind, ManifestEntry, RawDownload, RuntimeManifest};
pub use probe::{probe_java, JavaInstallation, PROBE_TIMEOUT};
pub use providers::{
    AdoptiumProvider, AzulProvider, MojangProvider, RuntimePayload, RuntimeProvider,
    RuntimeRelease,
};

/// Mojang-style OS name for the current platform.
pub fn host_os() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    }
}

/// Neutral architecture name; providers map it to their own vocabulary.
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "x86",
        other => other,
    }
}
