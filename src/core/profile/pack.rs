// ─── PackProfile ───
// The ordered component set of one instance and its resolution state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::meta::{LoadMode, VersionFile, VersionSource};
use crate::core::profile::component::{read_component_list, write_component_list, Component};
use crate::core::profile::merge::{merge, EffectiveLaunchDescription};
use crate::core::task::TaskContext;

/// Ordered sequence of components belonging to one instance.
///
/// Invariants: no two components share a UID, and a profile whose hard
/// requirements do not validate stays unresolved. The previous resolved
/// state, when one exists, is kept so a transient failure never corrupts a
/// working instance.
#[derive(Default)]
pub struct PackProfile {
    components: Vec<Component>,
    resolved: Option<EffectiveLaunchDescription>,
}

impl PackProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(components: Vec<Component>) -> LauncherResult<Self> {
        let mut profile = Self::new();
        for component in components {
            profile.append(component)?;
        }
        Ok(profile)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, uid: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.uid == uid)
    }

    /// The last successful merge product, if any.
    pub fn resolved(&self) -> Option<&EffectiveLaunchDescription> {
        self.resolved.as_ref()
    }

    pub fn append(&mut self, component: Component) -> LauncherResult<()> {
        if self.component(&component.uid).is_some() {
            return Err(LauncherError::DuplicateComponent(component.uid));
        }
        self.components.push(component);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, component: Component) -> LauncherResult<()> {
        if self.component(&component.uid).is_some() {
            return Err(LauncherError::DuplicateComponent(component.uid));
        }
        let index = index.min(self.components.len());
        self.components.insert(index, component);
        Ok(())
    }

    pub fn remove(&mut self, uid: &str) -> bool {
        let before = self.components.len();
        self.components.retain(|c| c.uid != uid);
        self.components.len() != before
    }

    /// Move a component to a new position in the merge order.
    pub fn reorder(&mut self, uid: &str, new_index: usize) -> bool {
        let Some(from) = self.components.iter().position(|c| c.uid == uid) else {
            return false;
        };
        let component = self.components.remove(from);
        let new_index = new_index.min(self.components.len());
        self.components.insert(new_index, component);
        true
    }

    /// Pin a component to a different version. Clears its loaded file; the
    /// previous resolved description stays in place until re-resolution.
    pub fn set_version(&mut self, uid: &str, version: impl Into<String>) -> bool {
        match self.components.iter_mut().find(|c| c.uid == uid) {
            Some(component) => {
                component.version = version.into();
                component.file = None;
                true
            }
            None => false,
        }
    }

    pub fn set_enabled(&mut self, uid: &str, enabled: bool) -> bool {
        match self.components.iter_mut().find(|c| c.uid == uid) {
            Some(component) => {
                component.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Freeze a component's currently loaded version file as a local
    /// override under `patches_dir`. From here on, resolution reads that
    /// file and never replaces it with catalog data.
    pub fn customize(&mut self, uid: &str, patches_dir: &Path) -> LauncherResult<()> {
        let component = self
            .components
            .iter_mut()
            .find(|c| c.uid == uid)
            .ok_or_else(|| LauncherError::Other(format!("no component '{uid}' to customize")))?;
        if component.customized {
            return Ok(());
        }
        let file = component.file.clone().ok_or_else(|| {
            LauncherError::Other(format!("component '{uid}' must be resolved before customizing"))
        })?;

        let path = component.patch_path(patches_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LauncherError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = serde_json::to_vec_pretty(file.as_ref())?;
        std::fs::write(&path, payload).map_err(|source| LauncherError::Io { path, source })?;
        component.customized = true;
        info!("customized component '{}'", uid);
        Ok(())
    }

    /// Drop a component's local override and return it to catalog control.
    pub fn revert_customization(&mut self, uid: &str, patches_dir: &Path) -> LauncherResult<()> {
        let component = self
            .components
            .iter_mut()
            .find(|c| c.uid == uid)
            .ok_or_else(|| LauncherError::Other(format!("no component '{uid}' to revert")))?;
        if !component.customized {
            return Ok(());
        }
        let path = component.patch_path(patches_dir);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|source| LauncherError::Io { path, source })?;
        }
        component.customized = false;
        component.file = None;
        Ok(())
    }

    pub fn load(path: &Path) -> LauncherResult<Self> {
        Self::from_components(read_component_list(path)?)
    }

    pub fn save(&self, path: &Path) -> LauncherResult<()> {
        write_component_list(path, &self.components)
    }

    /// Resolve every enabled component to a loaded version file, validate
    /// the dependency graph, and merge. On any failure the profile keeps its
    /// previous resolved state and loaded files.
    pub async fn resolve(
        &mut self,
        source: &mut dyn VersionSource,
        patches_dir: &Path,
        mode: LoadMode,
        ctx: &TaskContext,
    ) -> LauncherResult<&EffectiveLaunchDescription> {
        // Load into a scratch list first; the profile is only touched once
        // everything validated.
        let mut loaded: Vec<(usize, Arc<VersionFile>)> = Vec::new();
        for (index, component) in self.components.iter().enumerate() {
            if !component.enabled {
                debug!("skipping disabled component '{}'", component.uid);
                continue;
            }
            let file = if component.customized {
                load_patch_file(component, patches_dir)?
            } else if let Some(file) = &component.file {
                file.clone()
            } else {
                source
                    .load_version(&component.uid, &component.version, mode, ctx)
                    .await?
            };
            loaded.push((index, file));
        }

        validate_requirements(&loaded)?;

        let files: Vec<Arc<VersionFile>> = loaded.iter().map(|(_, f)| f.clone()).collect();
        let description = merge(&files)?;

        for (index, file) in loaded {
            self.components[index].file = Some(file);
        }
        Ok(self.resolved.insert(description))
    }

    /// Download actions for the libraries of the resolved component set,
    /// destined for the shared libraries directory. Run them through a
    /// [`crate::core::net::NetJob`] before launching.
    pub fn resolved_library_downloads(
        &self,
        libraries_dir: &Path,
    ) -> LauncherResult<Vec<crate::core::net::DownloadAction>> {
        let files: Vec<Arc<VersionFile>> = self
            .components
            .iter()
            .filter(|c| c.enabled)
            .filter_map(|c| c.file.clone())
            .collect();
        let libraries = crate::core::profile::merge::merged_libraries(&files)?;
        crate::core::profile::merge::library_downloads(&libraries, libraries_dir)
    }
}

fn load_patch_file(component: &Component, patches_dir: &Path) -> LauncherResult<Arc<VersionFile>> {
    let path = component.patch_path(patches_dir);
    let raw = std::fs::read_to_string(&path).map_err(|_| LauncherError::MissingVersionFile {
        uid: component.uid.clone(),
        version: component.version.clone(),
        reason: format!("local override missing at {:?}", path),
    })?;
    let file: VersionFile =
        serde_json::from_str(&raw).map_err(|err| LauncherError::MissingVersionFile {
            uid: component.uid.clone(),
            version: component.version.clone(),
            reason: format!("local override unparsable: {err}"),
        })?;
    Ok(Arc::new(file))
}

/// Enforce the `requires`/`conflicts` partial order over the loaded set.
fn validate_requirements(loaded: &[(usize, Arc<VersionFile>)]) -> LauncherResult<()> {
    let present: HashMap<&str, &str> = loaded
        .iter()
        .map(|(_, file)| (file.uid.as_str(), file.version.as_str()))
        .collect();

    for (_, file) in loaded {
        for requirement in &file.requires {
            match present.get(requirement.uid.as_str()) {
                None => {
                    return Err(LauncherError::UnresolvedDependency {
                        uid: file.uid.clone(),
                        requirement: requirement.uid.clone(),
                    });
                }
                Some(actual) => {
                    if let Some(expected) = &requirement.equals {
                        if expected != actual {
                            return Err(LauncherError::ConflictingRequirement {
                                uid: requirement.uid.clone(),
                                detail: format!(
                                    "'{}' requires exactly {}, profile has {}",
                                    file.uid, expected, actual
                                ),
                            });
                        }
                    }
                    if let Some(suggested) = &requirement.suggests {
                        if suggested != actual {
                            warn!(
                                "'{}' suggests {} {}, profile has {}",
                                file.uid, requirement.uid, suggested, actual
                            );
                        }
                    }
                }
            }
        }
        for conflict in &file.conflicts {
            if let Some(actual) = present.get(conflict.uid.as_str()) {
                let applies = match &conflict.equals {
                    Some(version) => version == actual,
                    None => true,
                };
                if applies {
                    return Err(LauncherError::ConflictingRequirement {
                        uid: conflict.uid.clone(),
                        detail: format!("'{}' declares a conflict with it", file.uid),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::meta::Requirement;
    use async_trait::async_trait;

    /// Catalog stand-in: versions served from memory, with a call log.
    #[derive(Default)]
    struct FakeSource {
        files: HashMap<(String, String), Arc<VersionFile>>,
        requests: Vec<String>,
    }

    impl FakeSource {
        fn put(&mut self, file: VersionFile) {
            self.files
                .insert((file.uid.clone(), file.version.clone()), Arc::new(file));
        }
    }

    #[async_trait]
    impl VersionSource for FakeSource {
        async fn load_version(
            &mut self,
            uid: &str,
            version: &str,
            _mode: LoadMode,
            _ctx: &TaskContext,
        ) -> LauncherResult<Arc<VersionFile>> {
            self.requests.push(format!("{uid}@{version}"));
            self.files
                .get(&(uid.to_string(), version.to_string()))
                .cloned()
                .ok_or_else(|| LauncherError::MissingVersionFile {
                    uid: uid.to_string(),
                    version: version.to_string(),
                    reason: "not in catalog".into(),
                })
        }
    }

    fn base_game() -> VersionFile {
        VersionFile {
            uid: "net.minecraft".into(),
            version: "1.20.4".into(),
            main_class: Some("net.minecraft.client.main.Main".into()),
            compatible_java_majors: vec![17],
            ..VersionFile::default()
        }
    }

    fn loader_requiring(uid: &str, requirement: Requirement) -> VersionFile {
        VersionFile {
            uid: uid.into(),
            version: "0.15.0".into(),
            main_class: Some("loader.Main".into()),
            requires: vec![requirement],
            ..VersionFile::default()
        }
    }

    #[tokio::test]
    async fn resolves_and_merges_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::default();
        source.put(base_game());
        source.put(loader_requiring(
            "net.fabricmc.fabric-loader",
            Requirement {
                uid: "net.minecraft".into(),
                equals: None,
                suggests: None,
            },
        ));

        let mut profile = PackProfile::from_components(vec![
            Component::new("net.minecraft", "1.20.4"),
            Component::new("net.fabricmc.fabric-loader", "0.15.0"),
        ])
        .unwrap();

        let ctx = TaskContext::detached();
        let description = profile
            .resolve(&mut source, dir.path(), LoadMode::Offline, &ctx)
            .await
            .unwrap();
        assert_eq!(description.main_class.as_deref(), Some("loader.Main"));
        assert_eq!(description.compatible_java_majors, vec![17]);
    }

    #[tokio::test]
    async fn duplicate_uids_are_rejected() {
        let mut profile = PackProfile::new();
        profile.append(Component::new("net.minecraft", "1.20.4")).unwrap();
        let err = profile
            .append(Component::new("net.minecraft", "1.20.2"))
            .unwrap_err();
        assert!(matches!(err, LauncherError::DuplicateComponent(_)));
    }

    #[tokio::test]
    async fn missing_requirement_fails_and_keeps_last_known_good() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::default();
        source.put(base_game());
        source.put(loader_requiring(
            "org.quiltmc.quilt-loader",
            Requirement {
                uid: "net.fabricmc.intermediary".into(),
                equals: Some("2.0".into()),
                suggests: None,
            },
        ));

        // First resolution: base game only, succeeds.
        let mut profile =
            PackProfile::from_components(vec![Component::new("net.minecraft", "1.20.4")]).unwrap();
        let ctx = TaskContext::detached();
        profile
            .resolve(&mut source, dir.path(), LoadMode::Offline, &ctx)
            .await
            .unwrap();
        let good = profile.resolved().unwrap().clone();

        // Adding a loader with an unmet hard requirement fails resolution...
        profile
            .append(Component::new("org.quiltmc.quilt-loader", "0.15.0"))
            .unwrap();
        let err = profile
            .resolve(&mut source, dir.path(), LoadMode::Offline, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::UnresolvedDependency { .. }));

        // ...and the previous resolved state is untouched.
        assert_eq!(profile.resolved(), Some(&good));
    }

    #[tokio::test]
    async fn exact_version_pin_mismatch_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::default();
        source.put(base_game());
        source.put(loader_requiring(
            "net.minecraftforge",
            Requirement {
                uid: "net.minecraft".into(),
                equals: Some("1.19.2".into()),
                suggests: None,
            },
        ));

        let mut profile = PackProfile::from_components(vec![
            Component::new("net.minecraft", "1.20.4"),
            Component::new("net.minecraftforge", "0.15.0"),
        ])
        .unwrap();

        let ctx = TaskContext::detached();
        let err = profile
            .resolve(&mut source, dir.path(), LoadMode::Offline, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::ConflictingRequirement { .. }));
        assert!(profile.resolved().is_none());
    }

    #[tokio::test]
    async fn declared_conflicts_block_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::default();
        source.put(base_game());
        source.put(VersionFile {
            uid: "com.example.exclusive".into(),
            version: "1.0".into(),
            conflicts: vec![Requirement {
                uid: "net.minecraft".into(),
                equals: None,
                suggests: None,
            }],
            ..VersionFile::default()
        });

        let mut profile = PackProfile::from_components(vec![
            Component::new("net.minecraft", "1.20.4"),
            Component::new("com.example.exclusive", "1.0"),
        ])
        .unwrap();

        let ctx = TaskContext::detached();
        let err = profile
            .resolve(&mut source, dir.path(), LoadMode::Offline, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::ConflictingRequirement { .. }));
    }

    #[tokio::test]
    async fn customized_components_never_touch_the_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::default();
        source.put(base_game());

        let mut profile =
            PackProfile::from_components(vec![Component::new("net.minecraft", "1.20.4")]).unwrap();
        let ctx = TaskContext::detached();
        profile
            .resolve(&mut source, dir.path(), LoadMode::Offline, &ctx)
            .await
            .unwrap();

        // Freeze, then hand-edit the local override.
        profile.customize("net.minecraft", dir.path()).unwrap();
        let patch_path = dir.path().join("net.minecraft.json");
        let mut patched: VersionFile =
            serde_json::from_str(&std::fs::read_to_string(&patch_path).unwrap()).unwrap();
        patched.main_class = Some("custom.EditedMain".into());
        std::fs::write(&patch_path, serde_json::to_vec_pretty(&patched).unwrap()).unwrap();

        // A refresh-capable resolution must use the override, not the
        // catalog, and must not rewrite the override file.
        source.put(VersionFile {
            main_class: Some("net.minecraft.client.main.NewerMain".into()),
            ..base_game()
        });
        source.requests.clear();
        let before = std::fs::read_to_string(&patch_path).unwrap();

        let description = profile
            .resolve(&mut source, dir.path(), LoadMode::Online, &ctx)
            .await
            .unwrap()
            .clone();
        assert_eq!(description.main_class.as_deref(), Some("custom.EditedMain"));
        assert!(source.requests.is_empty());
        assert_eq!(std::fs::read_to_string(&patch_path).unwrap(), before);
    }

    #[tokio::test]
    async fn disabled_components_are_skipped_but_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::default();
        source.put(base_game());
        source.put(VersionFile {
            uid: "com.example.addon".into(),
            version: "1.0".into(),
            main_class: Some("addon.Main".into()),
            ..VersionFile::default()
        });

        let mut profile = PackProfile::from_components(vec![
            Component::new("net.minecraft", "1.20.4"),
            Component::new("com.example.addon", "1.0").disabled(),
        ])
        .unwrap();

        let ctx = TaskContext::detached();
        let description = profile
            .resolve(&mut source, dir.path(), LoadMode::Offline, &ctx)
            .await
            .unwrap();
        assert_eq!(
            description.main_class.as_deref(),
            Some("net.minecraft.client.main.Main")
        );
        assert_eq!(profile.components().len(), 2);
    }

    #[tokio::test]
    async fn reorder_changes_merge_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::default();
        source.put(base_game());
        source.put(VersionFile {
            uid: "loader".into(),
            version: "1.0".into(),
            main_class: Some("loader.Main".into()),
            ..VersionFile::default()
        });

        let mut profile = PackProfile::from_components(vec![
            Component::new("net.minecraft", "1.20.4"),
            Component::new("loader", "1.0"),
        ])
        .unwrap();
        let ctx = TaskContext::detached();
        profile
            .resolve(&mut source, dir.path(), LoadMode::Offline, &ctx)
            .await
            .unwrap();
        assert_eq!(
            profile.resolved().unwrap().main_class.as_deref(),
            Some("loader.Main")
        );

        assert!(profile.reorder("loader", 0));
        profile
            .resolve(&mut source, dir.path(), LoadMode::Offline, &ctx)
            .await
            .unwrap();
        assert_eq!(
            profile.resolved().unwrap().main_class.as_deref(),
            Some("net.minecraft.client.main.Main")
        );
    }
}
