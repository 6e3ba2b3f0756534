use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::core::error::LauncherResult;
use crate::core::profile::PackProfile;

/// Instance metadata persisted to disk as `instance.json`.
///
/// Each instance has its own folder under `instances/<uuid>/` with:
/// - `minecraft/`       — game working directory
/// - `patches/`         — locally customized component version files
/// - `components.json`  — the ordered component list
/// - `instance.json`    — this serialized struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_launched: Option<DateTime<Utc>>,
}

impl Instance {
    pub fn new(name: impl Into<String>, base_dir: &std::path::Path) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            path: base_dir.join(&id),
            id,
            name: name.into(),
            created_at: Utc::now(),
            last_launched: None,
        }
    }

    /// The game's working directory.
    pub fn game_dir(&self) -> PathBuf {
        self.path.join("minecraft")
    }

    /// Local component override files live here.
    pub fn patches_dir(&self) -> PathBuf {
        self.path.join("patches")
    }

    pub fn components_path(&self) -> PathBuf {
        self.path.join("components.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join("instance.json")
    }

    /// Read this instance's component list into a profile. A fresh instance
    /// with no list yet gets an empty profile.
    pub fn load_profile(&self) -> LauncherResult<PackProfile> {
        if !self.components_path().exists() {
            return Ok(PackProfile::new());
        }
        PackProfile::load(&self.components_path())
    }

    pub fn save_profile(&self, profile: &PackProfile) -> LauncherResult<()> {
        profile.save(&self.components_path())
    }

    /// Variables exposed to hook commands, as substitutions and environment.
    pub fn hook_variables(&self) -> Vec<(String, String)> {
        vec![
            ("INST_NAME".to_string(), self.name.clone()),
            ("INST_ID".to_string(), self.id.clone()),
            (
                "INST_DIR".to_string(),
                self.path.to_string_lossy().to_string(),
            ),
            (
                "INST_MC_DIR".to_string(),
                self.game_dir().to_string_lossy().to_string(),
            ),
        ]
    }
}
