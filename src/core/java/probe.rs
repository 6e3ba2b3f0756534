use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The external java probe is a known hang risk (broken wrappers, network
/// filesystems), so it runs under a hard timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JavaInstallation {
    pub path: PathBuf,
    pub version: String,
    pub major: u32,
    pub is_64bit: bool,
    pub vendor: String,
}

/// Run `java -XshowSettings:properties -version` and parse what it reports.
/// Returns `None` for anything that is not a working java binary, including
/// a probe that exceeds the timeout.
pub async fn probe_java(path: &Path) -> Option<JavaInstallation> {
    let output = tokio::time::timeout(
        PROBE_TIMEOUT,
        tokio::process::Command::new(path)
            .args(["-XshowSettings:properties", "-version"])
            .kill_on_drop(true)
            .output(),
    )
    .await;

    let output = match output {
        Ok(Ok(output)) => output,
        Ok(Err(_)) => return None,
        Err(_) => {
            warn!("java probe timed out for {:?}", path);
            return None;
        }
    };

    parse_output(path, &output)
}

fn parse_output(path: &Path, output: &std::process::Output) -> Option<JavaInstallation> {
    let combined = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    debug!("probing {:?}: {}", path, combined.lines().next().unwrap_or(""));

    let version = parse_version_string(&combined)?;
    let major = parse_major_version(&version);
    let lower = combined.to_ascii_lowercase();
    let is_64bit = lower.contains("sun.arch.data.model = 64")
        || lower.contains("os.arch = amd64")
        || lower.contains("os.arch = x86_64")
        || lower.contains("os.arch = aarch64");

    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    Some(JavaInstallation {
        path: canonical,
        version,
        major,
        is_64bit,
        vendor: parse_vendor(&combined),
    })
}

/// The quoted version in `java -version` output.
fn parse_version_string(output: &str) -> Option<String> {
    for line in output.lines() {
        if let Some(start) = line.find('"') {
            if let Some(end) = line[start + 1..].find('"') {
                return Some(line[start + 1..start + 1 + end].to_string());
            }
        }
    }
    None
}

/// `1.8.0_392` -> 8, `17.0.8` -> 17.
pub(crate) fn parse_major_version(version: &str) -> u32 {
    let first: u32 = version
        .split('.')
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    if first == 1 {
        version
            .split('.')
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(first)
    } else {
        first
    }
}

fn parse_vendor(output: &str) -> String {
    for line in output.lines() {
        if line.contains("Temurin") {
            return "Temurin".to_string();
        }
        if line.contains("Zulu") {
            return "Zulu".to_string();
        }
        if line.contains("OpenJDK") {
            return "OpenJDK".to_string();
        }
    }
    "unknown".to_string()
}

/// Platform name of the java executable.
pub(crate) fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// `bin/java` in the common layouts, falling back to a recursive search for
/// providers with unusual archive roots.
pub(crate) fn locate_java_binary(runtime_root: &Path) -> PathBuf {
    let primary = runtime_root.join("bin").join(java_exe());
    if primary.exists() {
        return primary;
    }
    let mac_layout = runtime_root
        .join("Contents")
        .join("Home")
        .join("bin")
        .join(java_exe());
    if mac_layout.exists() {
        return mac_layout;
    }
    find_java_binary_recursive(runtime_root).unwrap_or(primary)
}

fn find_java_binary_recursive(root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let file_type = entry.file_type().ok()?;
        if file_type.is_file() {
            if path.file_name().and_then(|n| n.to_str()) == Some(java_exe()) {
                return Some(path);
            }
        } else if file_type.is_dir() {
            if let Some(found) = find_java_binary_recursive(&path) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_major_modern() {
        assert_eq!(parse_major_version("17.0.8"), 17);
        assert_eq!(parse_major_version("21.0.1"), 21);
    }

    #[test]
    fn parse_major_legacy() {
        assert_eq!(parse_major_version("1.8.0_392"), 8);
    }

    #[test]
    fn version_string_comes_from_the_quoted_token() {
        let output = "openjdk version \"21.0.3\" 2024-04-16 LTS\nOpenJDK Runtime";
        assert_eq!(parse_version_string(output).as_deref(), Some("21.0.3"));
        assert!(parse_version_string("no quotes here").is_none());
    }

    #[test]
    fn vendor_detection() {
        assert_eq!(parse_vendor("OpenJDK 64-Bit Server VM Temurin-21"), "Temurin");
        assert_eq!(parse_vendor("OpenJDK Runtime Environment Zulu21"), "Zulu");
        assert_eq!(parse_vendor("something else"), "unknown");
    }

    #[test]
    fn locate_prefers_the_bin_layout() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join(java_exe()), b"").unwrap();
        assert_eq!(locate_java_binary(dir.path()), bin.join(java_exe()));
    }

    #[test]
    fn locate_falls_back_to_recursive_search() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("jdk-21.0.3+9-jre").join("bin");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join(java_exe()), b"").unwrap();
        assert_eq!(locate_java_binary(dir.path()), nested.join(java_exe()));
    }

    #[tokio::test]
    async fn probing_a_non_executable_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join(java_exe());
        std::fs::write(&fake, b"not a binary").unwrap();
        assert!(probe_java(&fake).await.is_none());
    }
}
