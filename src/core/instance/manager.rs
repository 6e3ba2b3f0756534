use std::path::PathBuf;

use tracing::{info, warn};

use super::model::Instance;
use crate::core::error::{LauncherError, LauncherResult};

/// Manages the lifecycle of instances on disk.
pub struct InstanceManager {
    /// Root directory where all instances live.
    instances_dir: PathBuf,
}

impl InstanceManager {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self { instances_dir }
    }

    /// Create a new instance on disk with its subdirectory structure.
    pub async fn create(&self, mut instance: Instance) -> LauncherResult<Instance> {
        instance.path = self.instances_dir.join(&instance.id);
        if instance.path.exists() {
            return Err(LauncherError::InstanceAlreadyExists(instance.id.clone()));
        }

        for dir in [instance.game_dir(), instance.patches_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| LauncherError::Io { path: dir, source })?;
        }
        self.save(&instance).await?;

        info!("created instance '{}' ({})", instance.name, instance.id);
        Ok(instance)
    }

    /// Persist instance metadata.
    pub async fn save(&self, instance: &Instance) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(instance)?;
        let config_path = instance.config_path();
        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&config_path, json)
            .await
            .map_err(|source| LauncherError::Io {
                path: config_path,
                source,
            })
    }

    /// Load a single instance by ID.
    pub async fn load(&self, id: &str) -> LauncherResult<Instance> {
        let config_path = self.instances_dir.join(id).join("instance.json");
        if !config_path.exists() {
            return Err(LauncherError::InstanceNotFound(id.to_string()));
        }
        let json = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|source| LauncherError::Io {
                path: config_path.clone(),
                source,
            })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// List all instances, skipping unreadable ones with a warning.
    pub async fn list(&self) -> LauncherResult<Vec<Instance>> {
        let mut instances = Vec::new();
        if !self.instances_dir.exists() {
            return Ok(instances);
        }

        let mut entries = tokio::fs::read_dir(&self.instances_dir)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.instances_dir.clone(),
                source,
            })?;

        while let Some(entry) = entries.next_entry().await.map_err(|source| LauncherError::Io {
            path: self.instances_dir.clone(),
            source,
        })? {
            let config_path = entry.path().join("instance.json");
            if !config_path.exists() {
                continue;
            }
            match tokio::fs::read_to_string(&config_path).await {
                Ok(json) => match serde_json::from_str::<Instance>(&json) {
                    Ok(instance) => instances.push(instance),
                    Err(err) => warn!("corrupt instance.json at {:?}: {}", config_path, err),
                },
                Err(err) => warn!("cannot read {:?}: {}", config_path, err),
            }
        }

        instances.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(instances)
    }

    /// Delete an instance from disk.
    pub async fn delete(&self, id: &str) -> LauncherResult<()> {
        let instance_dir = self.instances_dir.join(id);
        if !instance_dir.exists() {
            return Err(LauncherError::InstanceNotFound(id.to_string()));
        }
        tokio::fs::remove_dir_all(&instance_dir)
            .await
            .map_err(|source| LauncherError::Io {
                path: instance_dir,
                source,
            })?;
        info!("deleted instance {}", id);
        Ok(())
    }
}
