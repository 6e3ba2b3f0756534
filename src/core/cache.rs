// ─── MetaCache ───
// Content-addressable local cache: (namespace, key) -> file path plus
// staleness and ETag bookkeeping. Decides whether a local copy can be used
// without a network round-trip; never performs network I/O itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

const INDEX_FORMAT_VERSION: &str = "1";

/// One record in the cache index. Owned exclusively by [`MetaCache`];
/// callers receive [`ResolvedEntry`] snapshots and mutate through the
/// cache's update API only.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    etag: String,
    last_checked: i64,
    #[serde(skip)]
    stale: bool,
}

/// Snapshot handed to callers after staleness evaluation.
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub namespace: String,
    pub key: String,
    pub etag: String,
    pub stale: bool,
    pub path: PathBuf,
}

struct Namespace {
    root: PathBuf,
    /// `None` = entries never expire once fetched (immutable artifacts);
    /// `Some(age)` = entries go stale `age` after their last check.
    max_age: Option<Duration>,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Default)]
struct Inner {
    namespaces: HashMap<String, Namespace>,
}

pub struct MetaCache {
    index_file: PathBuf,
    inner: Mutex<Inner>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: String,
    entries: Vec<IndexRecord>,
}

#[derive(Serialize, Deserialize)]
struct IndexRecord {
    namespace: String,
    path: String,
    etag: String,
    last_checked: i64,
}

impl MetaCache {
    pub fn new(index_file: PathBuf) -> Self {
        Self {
            index_file,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Register a namespace before `load()`. Entries persisted under an
    /// unregistered namespace are dropped on load.
    pub fn add_namespace(&self, name: &str, root: PathBuf, max_age: Option<Duration>) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.namespaces.entry(name.to_string()).or_insert(Namespace {
            root,
            max_age,
            entries: HashMap::new(),
        });
    }

    /// Absolute path a key maps to, whether or not anything is cached there.
    pub fn entry_path(&self, namespace: &str, key: &str) -> LauncherResult<PathBuf> {
        let inner = self.inner.lock().expect("cache lock poisoned");
        let ns = inner
            .namespaces
            .get(namespace)
            .ok_or_else(|| LauncherError::Other(format!("unknown cache namespace '{namespace}'")))?;
        Ok(ns.root.join(key))
    }

    /// Look up or create the entry for `(namespace, key)` and compute its
    /// staleness from the namespace policy and the state of the local file.
    pub fn resolve_entry(&self, namespace: &str, key: &str) -> LauncherResult<ResolvedEntry> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let ns = inner
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| LauncherError::Other(format!("unknown cache namespace '{namespace}'")))?;

        let path = ns.root.join(key);

        let fresh = match ns.entries.get(key) {
            None => false,
            Some(entry) => {
                if entry.stale {
                    false
                } else if !path.is_file() {
                    // The file went away underneath us; disown the entry.
                    debug!("cache file missing, disowning {}/{}", namespace, key);
                    ns.entries.remove(key);
                    false
                } else {
                    match ns.max_age {
                        None => true,
                        Some(age) => {
                            let elapsed = Utc::now().timestamp() - entry.last_checked;
                            elapsed >= 0 && (elapsed as u64) < age.as_secs()
                        }
                    }
                }
            }
        };

        let etag = ns
            .entries
            .get(key)
            .map(|e| e.etag.clone())
            .unwrap_or_default();

        Ok(ResolvedEntry {
            namespace: namespace.to_string(),
            key: key.to_string(),
            etag,
            stale: !fresh,
            path,
        })
    }

    /// Force the next fetch for this key to hit the network regardless of age.
    pub fn mark_stale(&self, namespace: &str, key: &str) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if let Some(ns) = inner.namespaces.get_mut(namespace) {
            if let Some(entry) = ns.entries.get_mut(key) {
                entry.stale = true;
            }
        }
    }

    /// Record a successful fetch: clears staleness, stamps the check time,
    /// stores the new ETag (if the server sent one).
    pub fn update_entry(&self, namespace: &str, key: &str, etag: Option<&str>) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let Some(ns) = inner.namespaces.get_mut(namespace) else {
            warn!("update for unknown cache namespace '{}'", namespace);
            return;
        };
        let entry = ns.entries.entry(key.to_string()).or_insert(CacheEntry {
            etag: String::new(),
            last_checked: 0,
            stale: false,
        });
        if let Some(etag) = etag {
            entry.etag = etag.to_string();
        }
        entry.last_checked = Utc::now().timestamp();
        entry.stale = false;
    }

    /// Load the persisted index. A corrupt or unreadable index is treated as
    /// a cold start: logged, never fatal.
    pub fn load(&self) {
        let raw = match std::fs::read_to_string(&self.index_file) {
            Ok(raw) => raw,
            Err(_) => return,
        };
        let parsed: IndexFile = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    "corrupt cache index at {:?}, starting cold: {}",
                    self.index_file, err
                );
                return;
            }
        };
        if parsed.version != INDEX_FORMAT_VERSION {
            warn!("unknown cache index version '{}', starting cold", parsed.version);
            return;
        }

        let mut inner = self.inner.lock().expect("cache lock poisoned");
        for record in parsed.entries {
            let Some(ns) = inner.namespaces.get_mut(&record.namespace) else {
                continue;
            };
            ns.entries.insert(
                record.path,
                CacheEntry {
                    etag: record.etag,
                    last_checked: record.last_checked,
                    stale: false,
                },
            );
        }
    }

    /// Persist the index. Stale entries are dead and not written out.
    pub fn save(&self) -> LauncherResult<()> {
        let inner = self.inner.lock().expect("cache lock poisoned");
        let mut entries = Vec::new();
        for (ns_name, ns) in &inner.namespaces {
            for (key, entry) in &ns.entries {
                if entry.stale {
                    continue;
                }
                entries.push(IndexRecord {
                    namespace: ns_name.clone(),
                    path: key.clone(),
                    etag: entry.etag.clone(),
                    last_checked: entry.last_checked,
                });
            }
        }
        entries.sort_by(|a, b| (&a.namespace, &a.path).cmp(&(&b.namespace, &b.path)));

        let payload = serde_json::to_vec_pretty(&IndexFile {
            version: INDEX_FORMAT_VERSION.to_string(),
            entries,
        })?;
        if let Some(parent) = self.index_file.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LauncherError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.index_file, payload).map_err(|source| LauncherError::Io {
            path: self.index_file.clone(),
            source,
        })
    }
}

/// Write a fetched payload into the cache tree for `(namespace, key)`.
pub fn write_cached_file(path: &Path, bytes: &[u8]) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LauncherError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, bytes).map_err(|source| LauncherError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_in(dir: &Path) -> MetaCache {
        let cache = MetaCache::new(dir.join("index.json"));
        cache.add_namespace("meta", dir.join("meta"), Some(Duration::from_secs(3600)));
        cache.add_namespace("versions", dir.join("versions"), None);
        cache
    }

    #[test]
    fn unknown_entries_start_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let entry = cache.resolve_entry("meta", "net.minecraft/index.json").unwrap();
        assert!(entry.stale);
        assert!(entry.etag.is_empty());
    }

    #[test]
    fn fetched_entries_stay_fresh_within_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let path = cache.entry_path("meta", "net.minecraft/index.json").unwrap();
        write_cached_file(&path, b"{}").unwrap();
        cache.update_entry("meta", "net.minecraft/index.json", Some("\"abc\""));

        let entry = cache.resolve_entry("meta", "net.minecraft/index.json").unwrap();
        assert!(!entry.stale);
        assert_eq!(entry.etag, "\"abc\"");
        assert_eq!(entry.path, path);
    }

    #[test]
    fn mark_stale_forces_refetch_within_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let path = cache.entry_path("meta", "org.lwjgl/index.json").unwrap();
        write_cached_file(&path, b"{}").unwrap();
        cache.update_entry("meta", "org.lwjgl/index.json", None);
        assert!(!cache.resolve_entry("meta", "org.lwjgl/index.json").unwrap().stale);

        cache.mark_stale("meta", "org.lwjgl/index.json");
        assert!(cache.resolve_entry("meta", "org.lwjgl/index.json").unwrap().stale);
    }

    #[test]
    fn missing_file_disowns_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        // Entry recorded but no file ever written.
        cache.update_entry("versions", "net.minecraft/1.20.4.json", None);
        let entry = cache
            .resolve_entry("versions", "net.minecraft/1.20.4.json")
            .unwrap();
        assert!(entry.stale);
    }

    #[test]
    fn immutable_namespace_never_expires() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let path = cache.entry_path("versions", "net.minecraft/1.8.9.json").unwrap();
        write_cached_file(&path, b"{}").unwrap();
        cache.update_entry("versions", "net.minecraft/1.8.9.json", None);

        let entry = cache
            .resolve_entry("versions", "net.minecraft/1.8.9.json")
            .unwrap();
        assert!(!entry.stale);
    }

    #[test]
    fn index_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = cache_in(dir.path());
            let path = cache.entry_path("versions", "net.fabricmc/0.15.0.json").unwrap();
            write_cached_file(&path, b"{}").unwrap();
            cache.update_entry("versions", "net.fabricmc/0.15.0.json", Some("\"tag\""));
            cache.save().unwrap();
        }

        let cache = cache_in(dir.path());
        cache.load();
        let entry = cache
            .resolve_entry("versions", "net.fabricmc/0.15.0.json")
            .unwrap();
        assert!(!entry.stale);
        assert_eq!(entry.etag, "\"tag\"");
    }

    #[test]
    fn stale_entries_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = cache_in(dir.path());
            let path = cache.entry_path("versions", "a/1.json").unwrap();
            write_cached_file(&path, b"{}").unwrap();
            cache.update_entry("versions", "a/1.json", None);
            cache.mark_stale("versions", "a/1.json");
            cache.save().unwrap();
        }

        let cache = cache_in(dir.path());
        cache.load();
        assert!(cache.resolve_entry("versions", "a/1.json").unwrap().stale);
    }

    #[test]
    fn corrupt_index_is_a_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.json"), b"{ not json").unwrap();

        let cache = cache_in(dir.path());
        cache.load();
        let entry = cache.resolve_entry("meta", "anything").unwrap();
        assert!(entry.stale);
    }
}
