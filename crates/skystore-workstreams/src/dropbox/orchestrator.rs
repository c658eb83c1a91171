//! Scan orchestration: connectivity check, one listing, bounded fan-out of
//! registrations, fan-in at a single point, summary.
//!
//! Cancellation: when the token fires, tasks still in flight are aborted, the results
//! already collected are kept, and the summary is marked `partial`.

use futures::FutureExt;
use skystore_core::models::{AssetCreationResult, ScanSummary, StoredObject};
use skystore_core::ScanConfig;
use skystore_storage::Storage;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::lister::ObjectLister;
use super::registrar::{AssetRegistrar, AssetRegistry};
use crate::error::WorkstreamError;
use crate::retry::RetryPolicy;

pub struct DropboxScanner {
    storage: Arc<dyn Storage>,
    lister: ObjectLister,
    registrar: Arc<AssetRegistrar>,
    concurrency: usize,
}

impl DropboxScanner {
    pub fn new(
        storage: Arc<dyn Storage>,
        registry: Arc<dyn AssetRegistry>,
        config: &ScanConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            lister: ObjectLister::new(storage.clone(), config.dropbox_prefix.clone()),
            registrar: Arc::new(AssetRegistrar::new(registry, config, retry)),
            storage,
            concurrency: config.concurrency.max(1),
        }
    }

    /// Run one scan.
    ///
    /// Returns an error only for fatal conditions: the bucket cannot be reached or the
    /// listing fails. Per-file failures, including keys storage cannot address, are
    /// reported in the summary.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<ScanSummary, WorkstreamError> {
        let start = Instant::now();

        tracing::info!(
            bucket = %self.storage.bucket(),
            prefix = %self.lister.prefix(),
            concurrency = self.concurrency,
            "Starting dropbox scan"
        );

        self.storage.check_connection().await?;

        let listing = tokio::select! {
            listed = self.lister.collect() => listed?,
            _ = cancel.cancelled() => {
                tracing::warn!("Dropbox scan cancelled while listing");
                return Ok(ScanSummary::from_results(0, Vec::new(), start.elapsed(), true));
            }
        };

        if listing.is_empty() {
            tracing::info!("No files in dropbox");
            return Ok(ScanSummary::empty(start.elapsed()));
        }

        let files_processed = listing.len();
        let mut results: Vec<AssetCreationResult> = listing
            .unreadable
            .iter()
            .map(|(key, reason)| AssetCreationResult::failed(key, reason.as_str()))
            .collect();
        let (registered, partial) = self.register_all(listing.objects, cancel).await;
        results.extend(registered);
        let summary =
            ScanSummary::from_results(files_processed, results, start.elapsed(), partial);

        log_summary(&summary);
        Ok(summary)
    }

    async fn register_all(
        &self,
        objects: Vec<StoredObject>,
        cancel: &CancellationToken,
    ) -> (Vec<AssetCreationResult>, bool) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut results = Vec::with_capacity(objects.len());

        for object in objects {
            let registrar = self.registrar.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                match AssertUnwindSafe(registrar.register(&object))
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!(key = %object.key, "Asset registration panicked");
                        AssetCreationResult::failed(&object.key, "registration task panicked")
                    }
                }
            });
        }

        let mut partial = false;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    partial = true;
                    tasks.abort_all();
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(result)) => results.push(result),
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Registration task ended without a result");
                    }
                    None => break,
                },
            }
        }

        if partial {
            // Drain so aborted tasks are gone before the summary is reported.
            while tasks.join_next().await.is_some() {}
            tracing::warn!(
                collected = results.len(),
                "Dropbox scan cancelled, returning partial results"
            );
        }

        (results, partial)
    }
}

fn log_summary(summary: &ScanSummary) {
    tracing::info!(
        success = summary.success,
        files_processed = summary.files_processed,
        successful_assets = summary.successful_assets,
        failed_assets = summary.failed_assets,
        partial = summary.partial,
        duration_secs = summary.duration_secs,
        "Dropbox scan finished"
    );

    for failure in summary.failures() {
        tracing::warn!(
            file_name = %failure.file_name,
            key = %failure.key,
            error = failure.error().unwrap_or_default(),
            "Dropbox file not registered"
        );
    }
}
