use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::java::probe::{java_exe, locate_java_binary, probe_java, JavaInstallation};

/// The set of locally known java runtimes: managed runtime directories plus
/// whatever `java` the PATH resolves to.
#[derive(Debug, Default)]
pub struct JavaInstallList {
    installs: Vec<JavaInstallation>,
}

impl JavaInstallList {
    pub fn new(installs: Vec<JavaInstallation>) -> Self {
        Self { installs }
    }

    pub fn installs(&self) -> &[JavaInstallation] {
        &self.installs
    }

    /// Probe every runtime under the given managed roots, then the system
    /// java. Runtimes that fail or time out their probe are skipped.
    pub async fn load(managed_roots: &[PathBuf]) -> Self {
        let mut installs = Vec::new();

        for root in managed_roots {
            let entries = match std::fs::read_dir(root) {
                Ok(entries) => entries,
                Err(_) => continue,
            };
            for entry in entries.filter_map(Result::ok) {
                let path = entry.path();
                if !path.is_dir() || path.file_name().and_then(|n| n.to_str()) == Some("temp") {
                    continue;
                }
                let java_bin = locate_java_binary(&path);
                if let Some(install) = probe_java(&java_bin).await {
                    installs.push(install);
                }
            }
        }

        if let Some(system) = probe_java(Path::new(java_exe())).await {
            installs.push(system);
        }

        installs.sort_by(|a, b| a.path.cmp(&b.path));
        installs.dedup_by(|a, b| a.path == b.path);
        info!("found {} local java runtimes", installs.len());
        Self { installs }
    }

    /// First runtime whose major version appears in `majors`, honoring the
    /// preference order of `majors`. 32-bit runtimes are accepted with a
    /// warning: their memory-allocation ceiling bites large packs.
    pub fn best_for(&self, majors: &[u32]) -> Option<&JavaInstallation> {
        for &major in majors {
            if let Some(install) = self.installs.iter().find(|i| i.major == major) {
                if !install.is_64bit {
                    warn!(
                        "using 32-bit java at {:?}; memory allocation will be limited",
                        install.path
                    );
                }
                return Some(install);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install(major: u32, is_64bit: bool, path: &str) -> JavaInstallation {
        JavaInstallation {
            path: PathBuf::from(path),
            version: format!("{major}.0.1"),
            major,
            is_64bit,
            vendor: "Temurin".into(),
        }
    }

    #[test]
    fn best_for_honors_the_preference_order() {
        let list = JavaInstallList::new(vec![
            install(8, true, "/runtimes/java8/bin/java"),
            install(17, true, "/runtimes/java17/bin/java"),
        ]);
        // 17 preferred over 8 even though 8 is listed first.
        let best = list.best_for(&[17, 8]).unwrap();
        assert_eq!(best.major, 17);

        let best = list.best_for(&[21, 8]).unwrap();
        assert_eq!(best.major, 8);
    }

    #[test]
    fn best_for_accepts_32bit_runtimes() {
        let list = JavaInstallList::new(vec![install(17, false, "/old/jre/bin/java")]);
        assert!(list.best_for(&[17]).is_some());
    }

    #[test]
    fn no_match_is_none() {
        let list = JavaInstallList::new(vec![install(11, true, "/runtimes/java11/bin/java")]);
        assert!(list.best_for(&[17, 8]).is_none());
    }
}
