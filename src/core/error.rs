use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire launcher backend.
/// Every module returns `Result<T, LauncherError>`.
///
/// Failures cross task boundaries as values, never as panics; the `Display`
/// impl of each variant is the short human-readable reason shown at the top
/// level, distinct from whatever detail went to the log.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("Checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Resolution ──────────────────────────────────────
    #[error("Component '{uid}' requires '{requirement}', which is not in the profile")]
    UnresolvedDependency { uid: String, requirement: String },

    #[error("Conflicting requirements on '{uid}': {detail}")]
    ConflictingRequirement { uid: String, detail: String },

    #[error("No version file for '{uid}' {version}: {reason}")]
    MissingVersionFile {
        uid: String,
        version: String,
        reason: String,
    },

    #[error("Version '{version}' of '{uid}' is not listed in the catalog")]
    VersionNotFound { uid: String, version: String },

    #[error("Component '{0}' appears more than once in the profile")]
    DuplicateComponent(String),

    // ── Libraries ───────────────────────────────────────
    #[error("Invalid library coordinate: {0}")]
    InvalidCoordinate(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Instance ────────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance already exists: {0}")]
    InstanceAlreadyExists(String),

    // ── Launch ──────────────────────────────────────────
    #[error("Process failed to start: {0}")]
    FailedToStart(String),

    #[error("Process crashed: {0}")]
    Crashed(String),

    // ── Java ────────────────────────────────────────────
    #[error("No usable Java runtime for major version {0}")]
    JavaNotFound(u32),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Cancellation ────────────────────────────────────
    #[error("Aborted")]
    Aborted,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl LauncherError {
    /// Whether this failure was caused by cancellation rather than a fault.
    pub fn is_abort(&self) -> bool {
        matches!(self, LauncherError::Aborted)
    }

    /// Whether this is one of the profile-resolution failures that must
    /// leave the previous resolved state of a profile untouched.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            LauncherError::UnresolvedDependency { .. }
                | LauncherError::ConflictingRequirement { .. }
                | LauncherError::MissingVersionFile { .. }
                | LauncherError::VersionNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_errors_are_classified() {
        let err = LauncherError::UnresolvedDependency {
            uid: "org.quiltmc.quilt-loader".into(),
            requirement: "net.fabricmc.intermediary".into(),
        };
        assert!(err.is_resolution_error());
        assert!(!err.is_abort());

        let err = LauncherError::Aborted;
        assert!(err.is_abort());
        assert!(!err.is_resolution_error());
    }

    #[test]
    fn reason_strings_are_short_and_human_readable() {
        let err = LauncherError::MissingVersionFile {
            uid: "net.minecraft".into(),
            version: "1.20.4".into(),
            reason: "network unreachable".into(),
        };
        let reason = err.to_string();
        assert!(reason.contains("net.minecraft"));
        assert!(!reason.contains('\n'));
    }
}
