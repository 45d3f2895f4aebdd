//! Sequential bulk execution
//!
//! [`run_bulk`] drives one bulk job through every row in order, persisting
//! the job before and after each row so the store always reflects the URL
//! being worked on and the results so far.

use super::auth::{resolve_auth, AuthBlock};
use super::rows::BulkRow;
use crate::crawler::{classify_failure, Extractor};
use crate::output::combine_outputs;
use crate::state::{now_local, CrawlOutcome, FailureRecord, Job};
use crate::storage::JobStorage;
use crate::HarvestError;

/// Everything a bulk job needs besides the job itself
#[derive(Debug, Clone, Default)]
pub struct BulkSpec {
    pub rows: Vec<BulkRow>,
    /// Applied to rows without enabled auth of their own
    pub global_auth: Option<AuthBlock>,
    pub combine_results: bool,
    pub csv_filename: Option<String>,
}

impl BulkSpec {
    pub fn new(rows: Vec<BulkRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }
}

/// Writes the job through to the store
///
/// A store failure is logged and the run continues; the in-memory job stays
/// authoritative until the next successful write.
fn persist(store: &dyn JobStorage, job: &Job) {
    if let Err(e) = store.update_job(job) {
        tracing::error!("Failed to persist job {}: {}", job.id(), e);
    }
}

/// Runs every row of a bulk job
///
/// Rows run one at a time. A row that fails validation is recorded as a
/// validation failure without any network traffic, and no row failure
/// stops the loop. When `combine_results` is set and at least one row
/// succeeded, the text and Markdown outputs are merged into an extra,
/// uncounted result before the job completes.
///
/// # Arguments
///
/// * `extractor` - Runs the individual extractions
/// * `store` - Receives the job after every state change
/// * `job` - A pending bulk job sized for `spec.rows`
/// * `spec` - Rows, batch-wide auth and the combine flag
///
/// # Returns
///
/// * `Ok(job)` - The job in its terminal state
/// * `Err(HarvestError)` - The job rejected a transition
pub async fn run_bulk(
    extractor: &Extractor,
    store: &dyn JobStorage,
    mut job: Job,
    spec: &BulkSpec,
) -> Result<Job, HarvestError> {
    job.start()?;
    persist(store, &job);

    let total = spec.rows.len();
    tracing::info!("Starting bulk job {} with {} URLs", job.id(), total);

    for (idx, row) in spec.rows.iter().enumerate() {
        let index = idx + 1;
        tracing::info!("[{}/{}] {}", index, total, row.url);

        job.set_current_url(Some(row.url.clone()))?;
        persist(store, &job);

        let auth = resolve_auth(row.auth.as_ref(), spec.global_auth.as_ref());
        let outcome = match row.to_request(auth) {
            Ok(request) => extractor.extract(&request, Some(index)).await,
            Err(problems) => {
                tracing::warn!(
                    "Row {} rejected: {}",
                    row.row_number,
                    problems.join("; ")
                );
                let error = HarvestError::InvalidRequest(problems);
                CrawlOutcome::Failed(FailureRecord::from_failure(
                    row.url.clone(),
                    classify_failure(&error, None),
                ))
            }
        };

        if let CrawlOutcome::Failed(failure) = &outcome {
            tracing::warn!(
                "[{}/{}] Failed {}: {}",
                index,
                total,
                failure.url,
                failure.reason
            );
        }

        job.add_result(outcome)?;
        persist(store, &job);
    }

    job.set_current_url(None)?;

    if spec.combine_results {
        combine(extractor, &mut job)?;
    }

    job.complete()?;
    persist(store, &job);

    tracing::info!(
        "Bulk job {} finished as {}: {} succeeded, {} failed",
        job.id(),
        job.status(),
        job.completed_urls(),
        job.failed_urls()
    );

    Ok(job)
}

fn combine(extractor: &Extractor, job: &mut Job) -> Result<(), HarvestError> {
    let successes: Vec<_> = job
        .results()
        .iter()
        .filter_map(CrawlOutcome::as_success)
        .collect();

    if successes.is_empty() {
        tracing::info!("Nothing to combine: no successful extractions");
        return Ok(());
    }

    match combine_outputs(&successes, extractor.output_writer().root(), &now_local()) {
        Ok(Some(record)) => {
            tracing::info!("{} written to {}", record.label, record.output_folder);
            job.add_result(CrawlOutcome::Combined(record))?;
        }
        Ok(None) => tracing::info!("Nothing to combine: no text or Markdown outputs"),
        Err(e) => tracing::error!("Failed to combine results: {}", e),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::parse_bulk_csv;
    use crate::config::Config;
    use crate::state::{CrawlType, JobStatus};
    use crate::storage::JsonJobStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Extractor, JsonJobStore) {
        let mut config = Config::default();
        config.output.output_directory = dir.path().join("out").display().to_string();
        let extractor = Extractor::new(Arc::new(config)).unwrap();
        let store = JsonJobStore::open(dir.path().join("jobs.json")).unwrap();
        (extractor, store)
    }

    #[tokio::test]
    async fn test_invalid_rows_fail_without_network() {
        let dir = TempDir::new().unwrap();
        let (extractor, store) = setup(&dir);

        let csv = "url,mode,format\nftp://a.example,content,txt\nhttps://b.example,link,md\n";
        let spec = BulkSpec::new(parse_bulk_csv(csv.as_bytes()).unwrap());
        let job = store
            .create_job(spec.rows.len(), CrawlType::Bulk, Some("rows.csv".to_string()))
            .unwrap();

        let job = run_bulk(&extractor, &store, job, &spec).await.unwrap();

        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.failed_urls(), 2);
        assert!(job.current_url().is_none());
        for outcome in job.results() {
            let failure = outcome.as_failure().unwrap();
            assert_eq!(failure.error_code, "VALIDATION_ERROR");
            assert!(failure.output_folder.is_none());
        }

        let stored = store.get_job(job.id()).unwrap().unwrap();
        assert_eq!(stored.status(), JobStatus::Failed);
        assert_eq!(stored.results().len(), 2);
    }

    #[tokio::test]
    async fn test_combine_skipped_without_successes() {
        let dir = TempDir::new().unwrap();
        let (extractor, store) = setup(&dir);

        let mut spec = BulkSpec::new(parse_bulk_csv("url\nnot a url\n".as_bytes()).unwrap());
        spec.combine_results = true;
        let job = store.create_job(1, CrawlType::Bulk, None).unwrap();

        let job = run_bulk(&extractor, &store, job, &spec).await.unwrap();
        assert_eq!(job.results().len(), 1);
        assert!(!dir.path().join("out").join("combined_results").exists());
    }
}
