use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::meta::VersionFile;

/// One entry in an instance's ordered component list.
///
/// List position is merge order: later components override earlier ones.
/// `customized` marks a component whose version file was locally overridden;
/// resolution loads it from the instance's `patches/` directory and never
/// refreshes it from the network.
#[derive(Debug, Clone)]
pub struct Component {
    pub uid: String,
    pub version: String,
    pub enabled: bool,
    pub customized: bool,
    /// Loaded version file; populated by a successful resolution.
    pub file: Option<Arc<VersionFile>>,
}

impl Component {
    pub fn new(uid: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            version: version.into(),
            enabled: true,
            customized: false,
            file: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn customized(mut self) -> Self {
        self.customized = true;
        self
    }

    /// Path of this component's local override file under `patches_dir`.
    pub fn patch_path(&self, patches_dir: &Path) -> std::path::PathBuf {
        patches_dir.join(format!("{}.json", self.uid))
    }
}

/// On-disk shape of one component. All four fields always serialize so a
/// write-then-read reproduces the identical ordered list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct ComponentRecord {
    uid: String,
    version: String,
    customized: bool,
    enabled: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentListFile {
    format_version: u32,
    components: Vec<ComponentRecord>,
}

/// Read an instance's persisted component list, preserving order.
pub fn read_component_list(path: &Path) -> LauncherResult<Vec<Component>> {
    let raw = std::fs::read_to_string(path).map_err(|source| LauncherError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: ComponentListFile = serde_json::from_str(&raw)?;
    Ok(parsed
        .components
        .into_iter()
        .map(|record| Component {
            uid: record.uid,
            version: record.version,
            enabled: record.enabled,
            customized: record.customized,
            file: None,
        })
        .collect())
}

/// Persist an ordered component list.
pub fn write_component_list(path: &Path, components: &[Component]) -> LauncherResult<()> {
    let records: Vec<ComponentRecord> = components
        .iter()
        .map(|component| ComponentRecord {
            uid: component.uid.clone(),
            version: component.version.clone(),
            customized: component.customized,
            enabled: component.enabled,
        })
        .collect();
    let payload = serde_json::to_vec_pretty(&ComponentListFile {
        format_version: 1,
        components: records,
    })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LauncherError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, payload).map_err(|source| LauncherError::Io {
        path: path.to_path_buf(),
        source,
    })
}
