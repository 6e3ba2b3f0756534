use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use reqwest::header::ETAG;
use reqwest::Client;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::cache::MetaCache;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::task::TaskContext;

/// Post-transfer integrity check. Runs on the temporary file; only a passing
/// file is promoted to its final path.
#[derive(Debug, Clone)]
pub enum Validator {
    Sha1(String),
    Sha256(String),
}

impl Validator {
    pub fn verify(&self, path: &Path) -> LauncherResult<()> {
        let bytes = std::fs::read(path).map_err(|source| LauncherError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (expected, actual) = match self {
            Validator::Sha1(expected) => {
                let mut hasher = Sha1::new();
                hasher.update(&bytes);
                (expected.clone(), hex::encode(hasher.finalize()))
            }
            Validator::Sha256(expected) => {
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                (expected.clone(), hex::encode(hasher.finalize()))
            }
        };
        if actual.eq_ignore_ascii_case(&expected) {
            Ok(())
        } else {
            Err(LauncherError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected,
                actual,
            })
        }
    }
}

/// Ties an action to a [`MetaCache`] entry: a fresh entry short-circuits the
/// fetch, and a completed fetch updates the entry.
#[derive(Debug, Clone)]
pub struct CacheGate {
    pub namespace: String,
    pub key: String,
}

/// One file to fetch, with optional integrity validation and cache gating.
#[derive(Debug, Clone)]
pub struct DownloadAction {
    pub url: String,
    pub dest: PathBuf,
    pub validator: Option<Validator>,
    /// Expected byte size, when the catalog declares it. Actions without a
    /// known size report through the step channel instead of the aggregate.
    pub size: Option<u64>,
    pub cache: Option<CacheGate>,
}

impl DownloadAction {
    pub fn new(url: impl Into<String>, dest: PathBuf) -> Self {
        Self {
            url: url.into(),
            dest,
            validator: None,
            size: None,
            cache: None,
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_cache_gate(mut self, namespace: impl Into<String>, key: impl Into<String>) -> Self {
        self.cache = Some(CacheGate {
            namespace: namespace.into(),
            key: key.into(),
        });
        self
    }

    fn file_label(&self) -> String {
        self.dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.url.clone())
    }

    /// Run this action to completion. Bytes stream into `<dest>.part`; the
    /// validator must pass before the file is promoted to `dest`, so a
    /// checksum mismatch never leaves a bad file at the final path.
    pub(crate) async fn execute(
        &self,
        client: &Client,
        cache: Option<&MetaCache>,
        ctx: &TaskContext,
        counter: &TransferCounter,
    ) -> LauncherResult<ActionOutcome> {
        if ctx.is_cancelled() {
            return Err(LauncherError::Aborted);
        }

        // Cache-aware skips before any network traffic.
        if let (Some(gate), Some(cache)) = (&self.cache, cache) {
            let entry = cache.resolve_entry(&gate.namespace, &gate.key)?;
            if !entry.stale {
                debug!("cache hit, skipping fetch of {}", self.url);
                counter.skip(self.size);
                return Ok(ActionOutcome::CacheHit);
            }
        }
        if self.dest.is_file() {
            if let Some(validator) = &self.validator {
                if validator.verify(&self.dest).is_ok() {
                    debug!("existing file validates, skipping fetch of {}", self.url);
                    counter.skip(self.size);
                    return Ok(ActionOutcome::AlreadyPresent);
                }
            }
        }

        ctx.set_step(format!("Fetching {}", self.file_label()));

        if let Some(parent) = self.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(LauncherError::Aborted),
            response = client.get(&self.url).send() => response?,
        };
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let part_path = self.dest.with_extension(part_extension(&self.dest));
        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|source| LauncherError::Io {
                path: part_path.clone(),
                source,
            })?;

        let mut stream = response.bytes_stream();
        loop {
            let polled = tokio::select! {
                _ = ctx.cancelled() => None,
                chunk = stream.next() => Some(chunk),
            };
            let Some(chunk) = polled else {
                // Cancelled mid-transfer: never leave a partial file behind.
                drop(file);
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(LauncherError::Aborted);
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|source| LauncherError::Io {
                    path: part_path.clone(),
                    source,
                })?;
            counter.add(chunk.len() as u64, self.size.is_some());
        }
        file.flush().await.map_err(|source| LauncherError::Io {
            path: part_path.clone(),
            source,
        })?;
        drop(file);

        if let Some(validator) = &self.validator {
            if let Err(err) = validator.verify(&part_path) {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(err);
            }
        }

        tokio::fs::rename(&part_path, &self.dest)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.dest.clone(),
                source,
            })?;

        if let (Some(gate), Some(cache)) = (&self.cache, cache) {
            cache.update_entry(&gate.namespace, &gate.key, etag.as_deref());
        }

        debug!("downloaded {} -> {:?}", self.url, self.dest);
        Ok(ActionOutcome::Downloaded)
    }
}

fn part_extension(dest: &Path) -> String {
    match dest.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.part"),
        None => "part".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Downloaded,
    CacheHit,
    AlreadyPresent,
}

/// Aggregates transferred bytes across concurrently running actions and
/// republishes the sum on the owning job's progress channel. Actions whose
/// size is unknown are excluded from the percentage so it stays honest.
pub struct TransferCounter {
    transferred: AtomicU64,
    expected_total: Option<u64>,
    ctx: TaskContext,
}

impl TransferCounter {
    pub(crate) fn new(ctx: TaskContext, expected_total: Option<u64>) -> Self {
        Self {
            transferred: AtomicU64::new(0),
            expected_total,
            ctx,
        }
    }

    fn add(&self, bytes: u64, counted: bool) {
        let total = self.transferred.fetch_add(bytes, Ordering::Relaxed) + bytes;
        if counted {
            self.ctx.set_progress(total, self.expected_total);
        }
    }

    /// Credit a skipped action's full size so the aggregate still completes.
    fn skip(&self, size: Option<u64>) {
        if let Some(size) = size {
            self.add(size, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_validator_accepts_matching_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.jar");
        std::fs::write(&path, b"hello world").unwrap();
        // sha1("hello world")
        let validator = Validator::Sha1("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed".into());
        assert!(validator.verify(&path).is_ok());
    }

    #[test]
    fn sha256_validator_rejects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.zip");
        std::fs::write(&path, b"corrupted").unwrap();
        let validator = Validator::Sha256("00".repeat(32));
        let err = validator.verify(&path).unwrap_err();
        assert!(matches!(err, LauncherError::ChecksumMismatch { .. }));
    }

    #[test]
    fn validator_comparison_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.jar");
        std::fs::write(&path, b"hello world").unwrap();
        let validator = Validator::Sha1("2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED".into());
        assert!(validator.verify(&path).is_ok());
    }

    #[test]
    fn part_extension_appends_to_existing_extension() {
        assert_eq!(part_extension(Path::new("a/b.jar")), "jar.part");
        assert_eq!(part_extension(Path::new("a/b")), "part");
    }
}
