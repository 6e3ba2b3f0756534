// ─── MetadataIndex / VersionList ───
// Answers "what versions exist for UID X" and "give me version Y of UID X,
// fully loaded", through MetaCache-backed fetches.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::Client;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::core::cache::{write_cached_file, MetaCache};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::meta::format::{MetaIndexFile, VersionDescriptor, VersionFile, VersionListFile};
use crate::core::task::TaskContext;

/// Expiring namespace for catalog indexes and version lists.
pub const NS_META: &str = "meta";
/// Never-expiring namespace for immutable per-version files.
pub const NS_VERSIONS: &str = "meta-versions";

const LIST_MAX_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Only promote cache hits that are not stale; never touch the network.
    Offline,
    /// Refresh anything stale from the network, falling back to a stale
    /// cached copy when the network fails.
    Online,
}

/// A catalog version in one of two states: stub (descriptor only) or loaded
/// (full version file fetched). Never mutated after loading, except through
/// an explicit cache invalidation that forces a refetch.
#[derive(Debug, Clone)]
pub struct MetaVersion {
    pub descriptor: VersionDescriptor,
    pub file: Option<Arc<VersionFile>>,
}

impl MetaVersion {
    pub fn is_loaded(&self) -> bool {
        self.file.is_some()
    }
}

/// Ordered versions of one component UID, in the catalog's declared order.
#[derive(Debug, Default)]
pub struct VersionList {
    pub uid: String,
    pub name: String,
    versions: Vec<MetaVersion>,
    loaded: bool,
}

impl VersionList {
    fn unloaded(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            ..Self::default()
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn versions(&self) -> &[MetaVersion] {
        &self.versions
    }

    pub fn version(&self, version: &str) -> Option<&MetaVersion> {
        self.versions.iter().find(|v| v.descriptor.version == version)
    }

    /// The catalog's recommended entry, if it flagged one.
    pub fn recommended(&self) -> Option<&MetaVersion> {
        self.versions.iter().find(|v| v.descriptor.recommended)
    }
}

/// Fetch plumbing shared by list and version loads: cache gate, conditional
/// requests, stale-copy fallback.
pub struct MetaService {
    base_url: String,
    client: Client,
    cache: Arc<MetaCache>,
}

impl MetaService {
    pub fn new(base_url: impl Into<String>, client: Client, cache: Arc<MetaCache>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            cache,
        }
    }

    /// Register the two catalog namespaces on a cache rooted at `root`.
    pub fn register_namespaces(cache: &MetaCache, root: &std::path::Path) {
        cache.add_namespace(NS_META, root.join("meta"), Some(LIST_MAX_AGE));
        cache.add_namespace(NS_VERSIONS, root.join("meta"), None);
    }

    pub fn cache(&self) -> &Arc<MetaCache> {
        &self.cache
    }

    /// Fetch one catalog document through the cache.
    ///
    /// Returns the local path of a usable copy, or `Ok(None)` when offline
    /// mode has nothing fresh to offer. A fresh entry short-circuits even in
    /// online mode; forcing a refetch inside the freshness window is what
    /// `MetaCache::mark_stale` is for.
    async fn fetch_document(
        &self,
        namespace: &str,
        key: &str,
        mode: LoadMode,
        ctx: &TaskContext,
    ) -> LauncherResult<Option<PathBuf>> {
        let entry = self.cache.resolve_entry(namespace, key)?;
        if !entry.stale {
            return Ok(Some(entry.path));
        }
        if mode == LoadMode::Offline {
            return Ok(None);
        }
        if ctx.is_cancelled() {
            return Err(LauncherError::Aborted);
        }

        let url = format!("{}/{}", self.base_url, key);
        ctx.set_step(format!("Fetching {key}"));

        let mut request = self.client.get(&url);
        if !entry.etag.is_empty() {
            request = request.header(IF_NONE_MATCH, entry.etag.clone());
        }

        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(LauncherError::Aborted),
            response = request.send() => response,
        };

        match response {
            Ok(response) if response.status() == StatusCode::NOT_MODIFIED => {
                debug!("{} not modified, reusing cached copy", key);
                self.cache.update_entry(namespace, key, None);
                Ok(Some(entry.path))
            }
            Ok(response) if response.status().is_success() => {
                let etag = response
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let bytes = response.bytes().await?;
                write_cached_file(&entry.path, &bytes)?;
                self.cache.update_entry(namespace, key, etag.as_deref());
                Ok(Some(entry.path))
            }
            Ok(response) => self.stale_fallback(
                &entry.path,
                key,
                LauncherError::DownloadFailed {
                    url,
                    status: response.status().as_u16(),
                },
            ),
            Err(err) => self.stale_fallback(&entry.path, key, err.into()),
        }
    }

    /// Online fetches never fail outright while any cached copy exists.
    fn stale_fallback(
        &self,
        path: &std::path::Path,
        key: &str,
        err: LauncherError,
    ) -> LauncherResult<Option<PathBuf>> {
        if path.is_file() {
            warn!("refresh of {} failed, using stale cached copy: {}", key, err);
            Ok(Some(path.to_path_buf()))
        } else {
            Err(err)
        }
    }
}

/// What profile resolution needs from a catalog. Implemented by
/// [`MetadataIndex`]; tests substitute an in-memory source.
#[async_trait]
pub trait VersionSource: Send {
    async fn load_version(
        &mut self,
        uid: &str,
        version: &str,
        mode: LoadMode,
        ctx: &TaskContext,
    ) -> LauncherResult<Arc<VersionFile>>;
}

/// Catalog of component UIDs, each with an ordered version list.
pub struct MetadataIndex {
    service: MetaService,
    lists: HashMap<String, VersionList>,
}

impl MetadataIndex {
    pub fn new(service: MetaService) -> Self {
        Self {
            service,
            lists: HashMap::new(),
        }
    }

    /// Look up a UID, creating an empty unloaded list on first reference.
    /// A UID the remote catalog never serves simply stays unloaded; that is
    /// only an error once a caller insists on a version from it.
    pub fn get(&mut self, uid: &str) -> &VersionList {
        self.lists
            .entry(uid.to_string())
            .or_insert_with(|| VersionList::unloaded(uid))
    }

    /// Load the top-level catalog: the set of component UIDs the remote
    /// serves. Creates unloaded lists so the UIDs are browsable before any
    /// per-UID load.
    pub async fn load_catalog(&mut self, mode: LoadMode, ctx: &TaskContext) -> LauncherResult<()> {
        let Some(path) = self
            .service
            .fetch_document(NS_META, "index.json", mode, ctx)
            .await?
        else {
            return Ok(());
        };
        let raw = std::fs::read_to_string(&path).map_err(|source| LauncherError::Io {
            path: path.clone(),
            source,
        })?;
        let parsed: MetaIndexFile = serde_json::from_str(&raw)?;
        for package in parsed.packages {
            let list = self
                .lists
                .entry(package.uid.clone())
                .or_insert_with(|| VersionList::unloaded(&package.uid));
            if !package.name.is_empty() {
                list.name = package.name;
            }
        }
        Ok(())
    }

    /// Load (or refresh) the version list for one UID.
    pub async fn load_list(
        &mut self,
        uid: &str,
        mode: LoadMode,
        ctx: &TaskContext,
    ) -> LauncherResult<()> {
        let key = format!("{uid}/index.json");
        let Some(path) = self.service.fetch_document(NS_META, &key, mode, ctx).await? else {
            debug!("no fresh cached list for {} in offline mode", uid);
            return Ok(());
        };

        let raw = std::fs::read_to_string(&path).map_err(|source| LauncherError::Io {
            path: path.clone(),
            source,
        })?;
        let parsed: VersionListFile = serde_json::from_str(&raw)?;

        let list = self
            .lists
            .entry(uid.to_string())
            .or_insert_with(|| VersionList::unloaded(uid));

        // Carry already-loaded version files across a refresh; loaded
        // versions are immutable.
        let mut loaded_files: HashMap<String, Arc<VersionFile>> = list
            .versions
            .iter()
            .filter_map(|v| {
                v.file
                    .clone()
                    .map(|file| (v.descriptor.version.clone(), file))
            })
            .collect();

        list.name = parsed.name;
        list.versions = parsed
            .versions
            .into_iter()
            .map(|descriptor| {
                let file = loaded_files.remove(&descriptor.version);
                MetaVersion { descriptor, file }
            })
            .collect();
        list.loaded = true;
        info!("loaded {} versions for {}", list.versions.len(), uid);
        Ok(())
    }

    /// Load the full version file for one specific version. Idempotent:
    /// loading an already-loaded version is a no-op success.
    pub async fn load_version_file(
        &mut self,
        uid: &str,
        version: &str,
        mode: LoadMode,
        ctx: &TaskContext,
    ) -> LauncherResult<Arc<VersionFile>> {
        if let Some(list) = self.lists.get(uid) {
            if let Some(meta) = list.version(version) {
                if let Some(file) = &meta.file {
                    return Ok(file.clone());
                }
            } else if list.loaded {
                // The catalog is authoritative about what exists.
                return Err(LauncherError::VersionNotFound {
                    uid: uid.to_string(),
                    version: version.to_string(),
                });
            }
        }

        let key = format!("{uid}/{version}.json");
        let path = self
            .service
            .fetch_document(NS_VERSIONS, &key, mode, ctx)
            .await
            .map_err(|err| missing_version(uid, version, err))?
            .ok_or_else(|| LauncherError::MissingVersionFile {
                uid: uid.to_string(),
                version: version.to_string(),
                reason: "no cached copy and offline mode requested".into(),
            })?;

        let raw = std::fs::read_to_string(&path).map_err(|source| LauncherError::Io {
            path: path.clone(),
            source,
        })?;
        let file: VersionFile =
            serde_json::from_str(&raw).map_err(|err| missing_version(uid, version, err.into()))?;
        let file = Arc::new(file);

        // Promote the stub (creating one if the list was never loaded).
        let list = self
            .lists
            .entry(uid.to_string())
            .or_insert_with(|| VersionList::unloaded(uid));
        match list
            .versions
            .iter_mut()
            .find(|v| v.descriptor.version == version)
        {
            Some(meta) => meta.file = Some(file.clone()),
            None => list.versions.push(MetaVersion {
                descriptor: VersionDescriptor {
                    version: version.to_string(),
                    version_type: file.version_type.clone(),
                    release_time: file.release_time.clone(),
                    recommended: false,
                    volatile: file.volatile,
                    requires: file.requires.clone(),
                    conflicts: file.conflicts.clone(),
                },
                file: Some(file.clone()),
            }),
        }

        Ok(file)
    }

    /// Force the next online load of this version to hit the network.
    pub fn invalidate_version(&mut self, uid: &str, version: &str) {
        let key = format!("{uid}/{version}.json");
        self.service.cache().mark_stale(NS_VERSIONS, &key);
        if let Some(list) = self.lists.get_mut(uid) {
            if let Some(meta) = list.versions.iter_mut().find(|v| v.descriptor.version == version) {
                meta.file = None;
            }
        }
    }
}

fn missing_version(uid: &str, version: &str, err: LauncherError) -> LauncherError {
    match err {
        err @ LauncherError::Aborted => err,
        err @ LauncherError::MissingVersionFile { .. } => err,
        other => LauncherError::MissingVersionFile {
            uid: uid.to_string(),
            version: version.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl VersionSource for MetadataIndex {
    async fn load_version(
        &mut self,
        uid: &str,
        version: &str,
        mode: LoadMode,
        ctx: &TaskContext,
    ) -> LauncherResult<Arc<VersionFile>> {
        self.load_version_file(uid, version, mode, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_in(dir: &std::path::Path) -> MetaService {
        let cache = Arc::new(MetaCache::new(dir.join("index.json")));
        MetaService::register_namespaces(&cache, dir);
        MetaService::new("http://192.0.2.1/v1", Client::new(), cache)
    }

    fn seed_list(service: &MetaService, uid: &str, body: &str) {
        let key = format!("{uid}/index.json");
        let path = service.cache().entry_path(NS_META, &key).unwrap();
        write_cached_file(&path, body.as_bytes()).unwrap();
        service.cache().update_entry(NS_META, &key, None);
    }

    fn seed_version(service: &MetaService, uid: &str, version: &str, body: &str) {
        let key = format!("{uid}/{version}.json");
        let path = service.cache().entry_path(NS_VERSIONS, &key).unwrap();
        write_cached_file(&path, body.as_bytes()).unwrap();
        service.cache().update_entry(NS_VERSIONS, &key, None);
    }

    #[tokio::test]
    async fn unknown_uid_yields_an_unloaded_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = MetadataIndex::new(service_in(dir.path()));

        let list = index.get("com.example.never-served");
        assert!(!list.is_loaded());
        assert!(list.versions().is_empty());
    }

    #[tokio::test]
    async fn offline_load_promotes_fresh_cache_hits() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        seed_list(
            &service,
            "net.minecraft",
            r#"{"formatVersion":1,"uid":"net.minecraft","name":"Minecraft",
                "versions":[{"version":"1.20.4","type":"release","recommended":true},
                            {"version":"1.20.2","type":"release"}]}"#,
        );

        let mut index = MetadataIndex::new(service);
        let ctx = TaskContext::detached();
        index
            .load_list("net.minecraft", LoadMode::Offline, &ctx)
            .await
            .unwrap();

        let list = index.get("net.minecraft");
        assert!(list.is_loaded());
        assert_eq!(list.versions().len(), 2);
        // Catalog's declared order is preserved.
        assert_eq!(list.versions()[0].descriptor.version, "1.20.4");
        assert_eq!(
            list.recommended().unwrap().descriptor.version,
            "1.20.4"
        );
    }

    #[tokio::test]
    async fn offline_load_without_cache_stays_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = MetadataIndex::new(service_in(dir.path()));
        let ctx = TaskContext::detached();

        index
            .load_list("net.minecraft", LoadMode::Offline, &ctx)
            .await
            .unwrap();
        assert!(!index.get("net.minecraft").is_loaded());
    }

    #[tokio::test]
    async fn version_file_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        seed_version(
            &service,
            "net.minecraft",
            "1.20.4",
            r#"{"formatVersion":1,"uid":"net.minecraft","version":"1.20.4",
                "mainClass":"net.minecraft.client.main.Main",
                "compatibleJavaMajors":[17]}"#,
        );

        let mut index = MetadataIndex::new(service);
        let ctx = TaskContext::detached();
        let first = index
            .load_version_file("net.minecraft", "1.20.4", LoadMode::Offline, &ctx)
            .await
            .unwrap();
        let second = index
            .load_version_file("net.minecraft", "1.20.4", LoadMode::Offline, &ctx)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.compatible_java_majors, vec![17]);
    }

    #[tokio::test]
    async fn missing_version_file_offline_is_a_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = MetadataIndex::new(service_in(dir.path()));
        let ctx = TaskContext::detached();

        let err = index
            .load_version_file("net.minecraft", "1.99.0", LoadMode::Offline, &ctx)
            .await
            .unwrap_err();
        assert!(err.is_resolution_error());
    }

    #[tokio::test]
    async fn invalidate_version_demotes_to_stub_and_marks_cache_stale() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        seed_version(
            &service,
            "org.lwjgl3",
            "3.3.3",
            r#"{"uid":"org.lwjgl3","version":"3.3.3"}"#,
        );

        let mut index = MetadataIndex::new(service);
        let ctx = TaskContext::detached();
        index
            .load_version_file("org.lwjgl3", "3.3.3", LoadMode::Offline, &ctx)
            .await
            .unwrap();
        assert!(index.get("org.lwjgl3").version("3.3.3").unwrap().is_loaded());

        index.invalidate_version("org.lwjgl3", "3.3.3");
        assert!(!index.get("org.lwjgl3").version("3.3.3").unwrap().is_loaded());

        // The cached copy is now stale, so an offline reload must refuse it.
        let err = index
            .load_version_file("org.lwjgl3", "3.3.3", LoadMode::Offline, &ctx)
            .await
            .unwrap_err();
        assert!(err.is_resolution_error());
    }

    #[tokio::test]
    async fn catalog_load_precreates_unloaded_lists() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        let path = service.cache().entry_path(NS_META, "index.json").unwrap();
        write_cached_file(
            &path,
            br#"{"formatVersion":1,"packages":[
                {"uid":"net.minecraft","name":"Minecraft"},
                {"uid":"org.lwjgl3"}]}"#,
        )
        .unwrap();
        service.cache().update_entry(NS_META, "index.json", None);

        let mut index = MetadataIndex::new(service);
        let ctx = TaskContext::detached();
        index.load_catalog(LoadMode::Offline, &ctx).await.unwrap();

        assert_eq!(index.get("net.minecraft").name, "Minecraft");
        assert!(!index.get("net.minecraft").is_loaded());
        assert!(index.get("org.lwjgl3").name.is_empty());
    }

    #[tokio::test]
    async fn versions_absent_from_a_loaded_list_are_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        seed_list(
            &service,
            "net.minecraft",
            r#"{"uid":"net.minecraft","versions":[{"version":"1.20.4"}]}"#,
        );

        let mut index = MetadataIndex::new(service);
        let ctx = TaskContext::detached();
        index
            .load_list("net.minecraft", LoadMode::Offline, &ctx)
            .await
            .unwrap();

        let err = index
            .load_version_file("net.minecraft", "9.9.9", LoadMode::Offline, &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::VersionNotFound { .. }));
    }

    #[tokio::test]
    async fn list_refresh_preserves_loaded_version_files() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        seed_list(
            &service,
            "net.fabricmc.fabric-loader",
            r#"{"uid":"net.fabricmc.fabric-loader","versions":[{"version":"0.15.0"}]}"#,
        );
        seed_version(
            &service,
            "net.fabricmc.fabric-loader",
            "0.15.0",
            r#"{"uid":"net.fabricmc.fabric-loader","version":"0.15.0"}"#,
        );

        let mut index = MetadataIndex::new(service);
        let ctx = TaskContext::detached();
        index
            .load_version_file("net.fabricmc.fabric-loader", "0.15.0", LoadMode::Offline, &ctx)
            .await
            .unwrap();
        index
            .load_list("net.fabricmc.fabric-loader", LoadMode::Offline, &ctx)
            .await
            .unwrap();

        let list = index.get("net.fabricmc.fabric-loader");
        assert!(list.version("0.15.0").unwrap().is_loaded());
    }
}
