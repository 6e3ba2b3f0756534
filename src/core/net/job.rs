use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use tracing::{info, warn};

use crate::core::cache::MetaCache;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::net::action::{DownloadAction, TransferCounter};
use crate::core::task::TaskContext;

const DEFAULT_CONCURRENCY: usize = 6;

/// A batch of download actions treated as one cancellable unit of work.
///
/// Actions run concurrently with no ordering guarantee among themselves; the
/// job reports completion only once every action has finished, and succeeds
/// only if all of them did.
pub struct NetJob {
    name: String,
    client: Client,
    cache: Option<Arc<MetaCache>>,
    actions: Vec<DownloadAction>,
    concurrency: usize,
}

impl NetJob {
    pub fn new(name: impl Into<String>, client: Client) -> Self {
        Self {
            name: name.into(),
            client,
            cache: None,
            actions: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_cache(mut self, cache: Arc<MetaCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn add(&mut self, action: DownloadAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run all actions to completion.
    ///
    /// A failed action does not cancel its siblings: whatever they fetch is
    /// a valid, independently-cacheable artifact, and letting them finish
    /// keeps throughput on large library sets. The job still fails, with the
    /// first failure as the reason. Aborting the surrounding context, by
    /// contrast, does cancel every in-flight action; files already completed
    /// stay on disk.
    pub async fn run(self, ctx: &TaskContext) -> LauncherResult<()> {
        let NetJob {
            name,
            client,
            cache,
            actions,
            concurrency,
        } = self;
        if actions.is_empty() {
            return Ok(());
        }
        info!(
            "{}: starting {} downloads, concurrency={}",
            name,
            actions.len(),
            concurrency
        );

        let expected_total = actions
            .iter()
            .try_fold(0u64, |sum, action| action.size.map(|s| sum + s));
        let counter = TransferCounter::new(ctx.clone(), expected_total);

        let actions_ctx = ctx.child();
        let client = &client;
        let cache = cache.as_deref();
        let counter_ref = &counter;
        let actions_ctx_ref = &actions_ctx;

        let results: Vec<(String, LauncherResult<_>)> = stream::iter(actions.into_iter())
            .map(|action| async move {
                let url = action.url.clone();
                let result = action
                    .execute(client, cache, actions_ctx_ref, counter_ref)
                    .await;
                (url, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        if ctx.is_cancelled() {
            return Err(LauncherError::Aborted);
        }

        let mut first_failure = None;
        let mut failed = 0usize;
        for (url, result) in results {
            if let Err(err) = result {
                failed += 1;
                warn!("{}: action failed for {}: {}", name, url, err);
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }

        match first_failure {
            None => {
                info!("{}: all downloads finished", name);
                Ok(())
            }
            Some(err) => {
                warn!("{}: {} of the downloads failed", name, failed);
                Err(err)
            }
        }
    }
}
