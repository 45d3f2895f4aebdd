//! JSON file job store
//!
//! The whole collection lives in memory and is rewritten to disk after
//! every mutation. One mutex covers both the map and the file write, so
//! concurrent jobs never interleave partial writes. A mutation whose write
//! fails is rolled back in memory.

use super::file::{preserve_copy, quarantine, read_json_array, write_json_atomic};
use super::traits::{JobStorage, StorageError, StorageResult};
use crate::state::{CrawlType, Job, JobSnapshot};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Write-through job store backed by a flat JSON array
#[derive(Debug)]
pub struct JsonJobStore {
    path: PathBuf,
    jobs: Mutex<HashMap<String, Job>>,
}

impl JsonJobStore {
    /// Opens the store, loading any existing history
    ///
    /// A file that cannot be parsed is moved to `<path>.corrupt` and the
    /// store starts from whatever records were readable.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the job history file
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let jobs = load_jobs(&path)?;
        tracing::info!("Loaded {} jobs from {}", jobs.len(), path.display());

        Ok(Self {
            path,
            jobs: Mutex::new(jobs),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, HashMap<String, Job>>> {
        self.jobs.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn persist(&self, jobs: &HashMap<String, Job>) -> StorageResult<()> {
        let mut ordered: Vec<&Job> = jobs.values().collect();
        ordered.sort_by_key(|job| job.created_at());
        let snapshots: Vec<JobSnapshot> = ordered.iter().map(|job| job.snapshot()).collect();

        write_json_atomic(&self.path, &snapshots).map_err(|e| {
            tracing::error!("Failed to save job history to {}: {}", self.path.display(), e);
            e
        })
    }
}

fn load_jobs(path: &Path) -> StorageResult<HashMap<String, Job>> {
    let records = match read_json_array(path) {
        Ok(Some(records)) => records,
        Ok(None) => {
            tracing::info!("No job history at {}, starting fresh", path.display());
            return Ok(HashMap::new());
        }
        Err(e) => {
            let moved = quarantine(path)?;
            tracing::error!(
                "Job history {} is unreadable ({}); moved to {}",
                path.display(),
                e,
                moved.display()
            );
            return Ok(HashMap::new());
        }
    };

    let mut jobs = HashMap::new();
    let mut rejected = 0;
    for record in records {
        match Job::from_dict(record) {
            Ok(job) => {
                jobs.insert(job.id().to_string(), job);
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable job record: {}", e);
                rejected += 1;
            }
        }
    }

    if rejected > 0 {
        // Keep the original so the skipped records are not lost on next save
        let backup = preserve_copy(path)?;
        tracing::error!(
            "{} job records could not be loaded; original kept at {}",
            rejected,
            backup.display()
        );
    }

    Ok(jobs)
}

impl JobStorage for JsonJobStore {
    fn create_job(
        &self,
        total_urls: usize,
        crawl_type: CrawlType,
        csv_filename: Option<String>,
    ) -> StorageResult<Job> {
        let job = Job::new(total_urls, crawl_type, csv_filename);
        let mut jobs = self.lock()?;
        jobs.insert(job.id().to_string(), job.clone());
        if let Err(e) = self.persist(&jobs) {
            jobs.remove(job.id());
            return Err(e);
        }
        tracing::debug!("Created {} job {} ({} URLs)", crawl_type, job.id(), total_urls);
        Ok(job)
    }

    fn get_job(&self, job_id: &str) -> StorageResult<Option<Job>> {
        Ok(self.lock()?.get(job_id).cloned())
    }

    fn list_jobs(&self, limit: usize) -> StorageResult<Vec<Job>> {
        let jobs = self.lock()?;
        let mut listed: Vec<Job> = jobs.values().cloned().collect();
        listed.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        listed.truncate(limit);
        Ok(listed)
    }

    fn update_job(&self, job: &Job) -> StorageResult<()> {
        let mut jobs = self.lock()?;
        let Some(stored) = jobs.get_mut(job.id()) else {
            return Err(StorageError::JobNotFound(job.id().to_string()));
        };
        let previous = std::mem::replace(stored, job.clone());
        if let Err(e) = self.persist(&jobs) {
            jobs.insert(previous.id().to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn delete_job(&self, job_id: &str) -> StorageResult<bool> {
        let mut jobs = self.lock()?;
        let Some(removed) = jobs.remove(job_id) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&jobs) {
            jobs.insert(job_id.to_string(), removed);
            return Err(e);
        }
        Ok(true)
    }
}
