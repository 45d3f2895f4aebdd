//! Job coordination
//!
//! The [`Coordinator`] ties the extraction pipeline to the job store:
//! single-URL crawls run inline, bulk crawls run on a spawned task, and
//! every state change is written through to the store.

use crate::bulk::{run_bulk, BulkSpec};
use crate::config::Config;
use crate::crawler::{CrawlRequest, Extractor};
use crate::state::{CrawlOutcome, CrawlType, Job};
use crate::storage::JobStorage;
use crate::HarvestError;
use std::fs;
use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Runs crawls and records them as jobs
#[derive(Clone)]
pub struct Coordinator {
    config: Arc<Config>,
    store: Arc<dyn JobStorage>,
    extractor: Arc<Extractor>,
}

impl Coordinator {
    /// Creates a coordinator with an extractor built from `config`
    ///
    /// # Arguments
    ///
    /// * `config` - Shared configuration
    /// * `store` - Where jobs are persisted
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run crawls
    /// * `Err(HarvestError)` - The HTTP clients could not be built
    pub fn new(config: Arc<Config>, store: Arc<dyn JobStorage>) -> Result<Self, HarvestError> {
        let extractor = Extractor::new(Arc::clone(&config))?;
        Ok(Self::with_extractor(config, store, extractor))
    }

    /// Creates a coordinator around a preconfigured extractor
    pub fn with_extractor(
        config: Arc<Config>,
        store: Arc<dyn JobStorage>,
        extractor: Extractor,
    ) -> Self {
        Self {
            config,
            store,
            extractor: Arc::new(extractor),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStorage> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one URL as a single-crawl job
    ///
    /// The job completes when the extraction succeeds and fails with the
    /// failure reason otherwise. Either way the finished job is returned;
    /// only store and state errors are propagated.
    pub async fn crawl_single(&self, request: CrawlRequest) -> Result<Job, HarvestError> {
        let mut job = self.store.create_job(1, CrawlType::Single, None)?;
        job.start()?;
        job.set_current_url(Some(request.url.clone()))?;
        self.store.update_job(&job)?;

        let outcome = self.extractor.extract(&request, None).await;
        let failure_reason = outcome.as_failure().map(|f| f.reason.clone());
        job.add_result(outcome)?;

        match failure_reason {
            Some(reason) => job.fail(reason)?,
            None => job.complete()?,
        }
        self.store.update_job(&job)?;

        tracing::info!("Job {} finished as {}", job.id(), job.status());
        Ok(job)
    }

    /// Starts a bulk job in the background
    ///
    /// Empty batches and batches above `bulk.max-urls` are rejected before
    /// a job is created. If the worker errors or panics, the stored job is
    /// marked failed so it never stays running.
    ///
    /// # Returns
    ///
    /// * `Ok((job_id, handle))` - The job exists and its worker is running
    /// * `Err(HarvestError)` - The batch was rejected or the job not created
    pub fn start_bulk(
        &self,
        spec: BulkSpec,
    ) -> Result<(String, JoinHandle<Result<Job, HarvestError>>), HarvestError> {
        let total = spec.rows.len();
        if total == 0 {
            return Err(HarvestError::Bulk("No URLs to process".to_string()));
        }
        let max_urls = self.config.bulk.max_urls;
        if total > max_urls {
            return Err(HarvestError::Bulk(format!(
                "Too many URLs: {} (maximum {})",
                total, max_urls
            )));
        }

        let job = self
            .store
            .create_job(total, CrawlType::Bulk, spec.csv_filename.clone())?;
        let job_id = job.id().to_string();
        tracing::info!("Created bulk job {} for {} URLs", job_id, total);

        let extractor = Arc::clone(&self.extractor);
        let worker_store = Arc::clone(&self.store);
        let worker = async move { run_bulk(&extractor, &*worker_store, job, &spec).await };
        let handle = tokio::spawn(supervise_bulk(
            Arc::clone(&self.store),
            job_id.clone(),
            worker,
        ));

        Ok((job_id, handle))
    }

    /// Deletes a job and every output it produced
    ///
    /// Extraction folders are removed whole. Combined results share one
    /// folder, so only their listed files are removed.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The job existed and was removed
    /// * `Ok(false)` - No such job
    pub fn delete_job(&self, job_id: &str) -> Result<bool, HarvestError> {
        let Some(job) = self.store.get_job(job_id)? else {
            return Ok(false);
        };

        for outcome in job.results() {
            let Some(folder) = outcome.output_folder() else {
                continue;
            };
            let folder = Path::new(folder);

            let removed = match outcome {
                CrawlOutcome::Combined(record) => record
                    .output_files
                    .iter()
                    .try_for_each(|file| remove_if_present(&folder.join(file), false)),
                _ => remove_if_present(folder, true),
            };
            if let Err(e) = removed {
                tracing::warn!("Failed to remove output {}: {}", folder.display(), e);
            }
        }

        Ok(self.store.delete_job(job_id)?)
    }
}

/// Runs a bulk worker on its own task and finalizes the job if it aborts
async fn supervise_bulk<F>(
    store: Arc<dyn JobStorage>,
    job_id: String,
    worker: F,
) -> Result<Job, HarvestError>
where
    F: Future<Output = Result<Job, HarvestError>> + Send + 'static,
{
    match tokio::spawn(worker).await {
        Ok(Ok(job)) => Ok(job),
        Ok(Err(e)) => {
            tracing::error!("Bulk job {} aborted: {}", job_id, e);
            mark_aborted(&*store, &job_id, &format!("Bulk job aborted: {}", e));
            Err(e)
        }
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                "Bulk worker panicked"
            } else {
                "Bulk worker was cancelled"
            };
            tracing::error!("Bulk job {} aborted: {}", job_id, reason);
            mark_aborted(&*store, &job_id, reason);
            Err(HarvestError::Bulk(reason.to_string()))
        }
    }
}

/// Moves a stored job that is still pending or running to failed
fn mark_aborted(store: &dyn JobStorage, job_id: &str, reason: &str) {
    let mut job = match store.get_job(job_id) {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::warn!("Aborted job {} is no longer stored", job_id);
            return;
        }
        Err(e) => {
            tracing::error!("Failed to load aborted job {}: {}", job_id, e);
            return;
        }
    };
    if job.status().is_terminal() {
        return;
    }
    if let Err(e) = job.fail(reason) {
        tracing::error!("Failed to mark job {} as failed: {}", job_id, e);
        return;
    }
    if let Err(e) = store.update_job(&job) {
        tracing::error!("Failed to persist aborted job {}: {}", job_id, e);
    }
}

fn remove_if_present(path: &Path, is_dir: bool) -> io::Result<()> {
    let result = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
