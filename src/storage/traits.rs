//! Storage traits and error types
//!
//! This module defines the trait interface for job storage backends and
//! associated error types.

use crate::state::{CrawlType, Job};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Saved job not found: {0}")]
    SavedJobNotFound(String),

    #[error("A saved job named '{0}' already exists")]
    DuplicateName(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for job storage backends
///
/// Every mutating call is durable before it returns. Implementations are
/// shared between the caller and bulk worker tasks, so all methods take
/// `&self` and serialize access internally.
pub trait JobStorage: Send + Sync {
    /// Creates and persists a pending job
    ///
    /// # Arguments
    ///
    /// * `total_urls` - Number of URLs the job will attempt
    /// * `crawl_type` - Single URL or bulk
    /// * `csv_filename` - Source CSV name for bulk jobs
    ///
    /// # Returns
    ///
    /// The new job; the caller owns this copy and writes it back with
    /// [`JobStorage::update_job`]
    fn create_job(
        &self,
        total_urls: usize,
        crawl_type: CrawlType,
        csv_filename: Option<String>,
    ) -> StorageResult<Job>;

    /// Gets a job by id
    fn get_job(&self, job_id: &str) -> StorageResult<Option<Job>>;

    /// Lists jobs, newest first
    fn list_jobs(&self, limit: usize) -> StorageResult<Vec<Job>>;

    /// Replaces the stored copy of a job and persists the collection
    fn update_job(&self, job: &Job) -> StorageResult<()>;

    /// Removes a job record
    ///
    /// # Returns
    ///
    /// `true` if a record was removed
    fn delete_job(&self, job_id: &str) -> StorageResult<bool>;
}
