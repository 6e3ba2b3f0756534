// ─── AutoInstallJava ───
// Ensures a usable runtime exists for a profile's compatible majors before
// the process step runs. Every failure here is recoverable: the launch
// falls back to the default/system runtime with a warning.

use std::path::{Path, PathBuf};

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::config::ConfigStore;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java::extract::{extract_zip_file, set_executable};
use crate::core::java::install_list::JavaInstallList;
use crate::core::java::manifest::{EntryKind, RuntimeManifest};
use crate::core::java::probe::{locate_java_binary, probe_java};
use crate::core::java::providers::{
    AdoptiumProvider, AzulProvider, MojangProvider, RuntimePayload, RuntimeProvider,
    RuntimeRelease,
};
use crate::core::java::{host_arch, host_os};
use crate::core::net::{DownloadAction, NetJob, Validator};
use crate::core::task::TaskContext;

const MIN_FREE_DISK_BYTES: u64 = 512 * 1024 * 1024;

/// User overrides consumed before any automation runs.
#[derive(Debug, Clone, Default)]
pub struct JavaSettings {
    /// Explicitly pinned runtime path; used unconditionally when it exists.
    pub pinned_path: Option<PathBuf>,
    pub auto_download: bool,
}

impl JavaSettings {
    pub fn from_config(config: &dyn ConfigStore) -> Self {
        Self {
            pinned_path: config.get_string("JavaPath").map(PathBuf::from),
            auto_download: config.get_bool("AutomaticJavaDownload").unwrap_or(true),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RuntimeMetadata {
    vendor: String,
    version: String,
    major: u32,
    arch: String,
    installed_at: String,
}

pub struct AutoInstallJava {
    client: Client,
    runtimes_root: PathBuf,
    providers: Vec<Box<dyn RuntimeProvider>>,
    settings: JavaSettings,
}

impl AutoInstallJava {
    /// Default provider order: Mojang, Adoptium, Azul.
    pub fn new(client: Client, runtimes_root: PathBuf, settings: JavaSettings) -> Self {
        let providers: Vec<Box<dyn RuntimeProvider>> = vec![
            Box::new(MojangProvider::new(client.clone())),
            Box::new(AdoptiumProvider::new(client.clone())),
            Box::new(AzulProvider::new(client.clone())),
        ];
        Self {
            client,
            runtimes_root,
            providers,
            settings,
        }
    }

    pub fn with_providers(mut self, providers: Vec<Box<dyn RuntimeProvider>>) -> Self {
        self.providers = providers;
        self
    }

    /// Resolve a runtime for the given majors (most-preferred first).
    ///
    /// `Ok(None)` means "use the default/system runtime". It is never an
    /// error, because a missing Java must not block the launch by itself;
    /// only cancellation propagates as `Err`.
    pub async fn ensure_runtime(
        &self,
        majors: &[u32],
        ctx: &TaskContext,
    ) -> LauncherResult<Option<PathBuf>> {
        // User intent beats automation.
        if let Some(pinned) = &self.settings.pinned_path {
            if pinned.exists() {
                info!("using pinned java runtime at {:?}", pinned);
                return Ok(Some(pinned.clone()));
            }
            warn!("pinned java runtime {:?} does not exist, ignoring", pinned);
        }

        if !self.settings.auto_download {
            let list = JavaInstallList::load(&[self.runtimes_root.clone()]).await;
            let found = list.best_for(majors).map(|install| install.path.clone());
            if found.is_none() {
                warn!("no local java matches majors {:?}; falling back to system runtime", majors);
            }
            return Ok(found);
        }

        for &major in majors {
            if ctx.is_cancelled() {
                return Err(LauncherError::Aborted);
            }
            if let Some(existing) = self.find_managed(major).await {
                info!("reusing managed java {} at {:?}", major, existing);
                return Ok(Some(existing));
            }

            for provider in &self.providers {
                if ctx.is_cancelled() {
                    return Err(LauncherError::Aborted);
                }
                let release = match provider.query(major, host_os(), host_arch()).await {
                    Ok(Some(release)) => release,
                    Ok(None) => {
                        continue;
                    }
                    Err(err) => {
                        warn!(
                            "provider {} failed for java {}: {}",
                            provider.name(),
                            major,
                            err
                        );
                        continue;
                    }
                };
                match self.install(&release, ctx).await {
                    Ok(java_bin) => return Ok(Some(java_bin)),
                    Err(err) if err.is_abort() => return Err(err),
                    Err(err) => {
                        warn!(
                            "install of java {} from {} failed: {}",
                            major,
                            provider.name(),
                            err
                        );
                    }
                }
            }
        }

        warn!(
            "no provider could supply a runtime for majors {:?}; falling back to system runtime",
            majors
        );
        Ok(None)
    }

    /// An already-downloaded runtime of this major under the managed root.
    async fn find_managed(&self, major: u32) -> Option<PathBuf> {
        let prefix = format!("java{major}-");
        let entries = std::fs::read_dir(&self.runtimes_root).ok()?;
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            if !path.is_dir() || !name.starts_with(&prefix) {
                continue;
            }
            let java_bin = locate_java_binary(&path);
            if let Some(info) = probe_java(&java_bin).await {
                if info.major == major {
                    return Some(java_bin);
                }
            }
        }
        None
    }

    async fn install(&self, release: &RuntimeRelease, ctx: &TaskContext) -> LauncherResult<PathBuf> {
        ensure_min_disk_space(&self.runtimes_root, MIN_FREE_DISK_BYTES)?;

        let temp_root = self.runtimes_root.join("temp");
        let staging = temp_root.join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&staging).map_err(|source| LauncherError::Io {
            path: staging.clone(),
            source,
        })?;

        let result = self.install_into(release, &staging, &temp_root, ctx).await;
        if result.is_err() {
            let _ = std::fs::remove_dir_all(&staging);
        }
        result
    }

    async fn install_into(
        &self,
        release: &RuntimeRelease,
        staging: &Path,
        temp_root: &Path,
        ctx: &TaskContext,
    ) -> LauncherResult<PathBuf> {
        ctx.set_step(format!("Installing java {} ({})", release.major, release.vendor));

        match &release.payload {
            RuntimePayload::Archive { url, sha256 } => {
                let zip_path = temp_root.join(format!("{}.zip", Uuid::new_v4()));
                let mut action = DownloadAction::new(url.clone(), zip_path.clone());
                if let Some(sha256) = sha256 {
                    action = action.with_validator(Validator::Sha256(sha256.clone()));
                }
                let mut job = NetJob::new("java runtime archive", self.client.clone());
                job.add(action);
                job.run(ctx).await?;

                extract_zip_file(&zip_path, staging)?;
                let _ = std::fs::remove_file(&zip_path);
            }
            RuntimePayload::Manifest { url } => {
                let response = tokio::select! {
                    _ = ctx.cancelled() => return Err(LauncherError::Aborted),
                    response = self.client.get(url).send() => response?,
                };
                let manifest: RuntimeManifest = response
                    .error_for_status()
                    .map_err(LauncherError::Http)?
                    .json()
                    .await?;
                assemble_from_manifest(&manifest, staging, &self.client, ctx).await?;
            }
        }

        let java_bin = locate_java_binary(staging);
        let info = probe_java(&java_bin).await.ok_or_else(|| {
            LauncherError::Other(format!(
                "downloaded runtime failed validation: {}",
                java_bin.display()
            ))
        })?;
        if info.major != release.major {
            return Err(LauncherError::Other(format!(
                "downloaded runtime reports java {} instead of {}",
                info.major, release.major
            )));
        }

        let identifier = format!(
            "java{}-{}-{}-{}",
            release.major,
            release.vendor.to_lowercase(),
            normalize_version(&release.version),
            host_arch()
        );
        let final_root = self.runtimes_root.join(&identifier);
        if final_root.exists() {
            std::fs::remove_dir_all(&final_root).map_err(|source| LauncherError::Io {
                path: final_root.clone(),
                source,
            })?;
        }
        std::fs::rename(staging, &final_root).map_err(|source| LauncherError::Io {
            path: final_root.clone(),
            source,
        })?;

        let metadata = RuntimeMetadata {
            vendor: release.vendor.clone(),
            version: release.version.clone(),
            major: release.major,
            arch: host_arch().to_string(),
            installed_at: Utc::now().to_rfc3339(),
        };
        let metadata_path = final_root.join("runtime.json");
        std::fs::write(&metadata_path, serde_json::to_vec_pretty(&metadata)?).map_err(
            |source| LauncherError::Io {
                path: metadata_path,
                source,
            },
        )?;

        info!("installed java runtime {}", identifier);
        Ok(locate_java_binary(&final_root))
    }
}

/// Assemble a manifest-driven runtime under `dest`: directories first, then
/// the per-file downloads with their checksums, then executable bits and
/// links.
pub(crate) async fn assemble_from_manifest(
    manifest: &RuntimeManifest,
    dest: &Path,
    client: &Client,
    ctx: &TaskContext,
) -> LauncherResult<()> {
    for relative in manifest.files.keys() {
        reject_escaping_path(relative)?;
    }

    for (relative, entry) in &manifest.files {
        if entry.kind == EntryKind::Directory {
            let path = dest.join(relative);
            std::fs::create_dir_all(&path)
                .map_err(|source| LauncherError::Io { path, source })?;
        }
    }

    let mut job = NetJob::new("java runtime files", client.clone());
    for (relative, entry) in &manifest.files {
        if entry.kind != EntryKind::File {
            continue;
        }
        let Some(raw) = entry.downloads.as_ref().and_then(|d| d.raw.as_ref()) else {
            continue;
        };
        let mut action = DownloadAction::new(raw.url.clone(), dest.join(relative))
            .with_validator(Validator::Sha1(raw.sha1.clone()));
        if let Some(size) = raw.size {
            action = action.with_size(size);
        }
        job.add(action);
    }
    if !job.is_empty() {
        job.run(ctx).await?;
    }

    for (relative, entry) in &manifest.files {
        match entry.kind {
            EntryKind::File if entry.executable => {
                set_executable(&dest.join(relative))?;
            }
            EntryKind::Link => {
                if let Some(target) = &entry.target {
                    make_link(target, &dest.join(relative))?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn reject_escaping_path(relative: &str) -> LauncherResult<()> {
    let escapes = Path::new(relative)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir | std::path::Component::RootDir));
    if escapes {
        return Err(LauncherError::Other(format!(
            "runtime manifest entry escapes the install root: {relative}"
        )));
    }
    Ok(())
}

#[cfg(unix)]
fn make_link(target: &str, link: &Path) -> LauncherResult<()> {
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LauncherError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    if link.exists() {
        let _ = std::fs::remove_file(link);
    }
    std::os::unix::fs::symlink(target, link).map_err(|source| LauncherError::Io {
        path: link.to_path_buf(),
        source,
    })
}

#[cfg(not(unix))]
fn make_link(target: &str, link: &Path) -> LauncherResult<()> {
    warn!("skipping symlink {:?} -> {} on this platform", link, target);
    Ok(())
}

fn normalize_version(version: &str) -> String {
    version.replace('+', "_").replace(' ', "")
}

fn ensure_min_disk_space(path: &Path, minimum_bytes: u64) -> LauncherResult<()> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut best_len = 0usize;
    let mut available = None;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if canonical.starts_with(mount) {
            let len = mount.as_os_str().len();
            if len >= best_len {
                best_len = len;
                available = Some(disk.available_space());
            }
        }
    }
    if let Some(bytes) = available {
        if bytes < minimum_bytes {
            return Err(LauncherError::Other(format!(
                "not enough free disk space for a runtime install: {bytes} bytes available, {minimum_bytes} required"
            )));
        }
    }
    Ok(())
}
