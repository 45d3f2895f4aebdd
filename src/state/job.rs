//! Job state machine
//!
//! A [`Job`] tracks one single-URL or bulk extraction from intake to a
//! terminal status:
//!
//! ```text
//! pending ──start()──▶ running ──complete()──▶ completed | failed
//!    │                    │
//!    └──────fail()────────┴──────fail()──────▶ failed
//! ```
//!
//! The counters only move through [`Job::add_result`], which keeps
//! `completed_urls + failed_urls <= total_urls`.

use super::outcome::CrawlOutcome;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Offset every timestamp is recorded in (UTC+07:00, no DST)
pub const JOB_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// Returns the fixed job time zone
pub fn job_timezone() -> FixedOffset {
    FixedOffset::east_opt(JOB_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current time in the job time zone
pub fn now_local() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&job_timezone())
}

/// Parses a persisted timestamp
///
/// RFC 3339 strings keep their own offset. Naive ISO-8601 strings are read
/// as wall-clock time in the job time zone, not UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return job_timezone().from_local_datetime(&naive).single();
        }
    }

    None
}

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns true for `completed` and `failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Whether a job came from one URL or a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlType {
    #[default]
    Single,
    Bulk,
}

impl CrawlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Bulk => "bulk",
        }
    }
}

impl fmt::Display for CrawlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal operations on a job
#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Job is {status}, expected running")]
    NotRunning { status: JobStatus },

    #[error("Job already holds results for all {total} URLs")]
    ResultOverflow { total: usize },

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Malformed job record: {0}")]
    Malformed(String),
}

/// Serializable form of a job, as persisted and as returned to callers
///
/// Every field except `job_id` has a default so records written by older
/// versions still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default = "default_total_urls")]
    pub total_urls: usize,
    #[serde(default)]
    pub completed_urls: usize,
    #[serde(default)]
    pub failed_urls: usize,
    /// Derived; ignored on load
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub results: Vec<CrawlOutcome>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub crawl_type: Option<CrawlType>,
    #[serde(default)]
    pub csv_filename: Option<String>,
    #[serde(default)]
    pub current_url: Option<String>,
}

fn default_total_urls() -> usize {
    1
}

/// One row of the job history listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: String,
    /// Mode of the first successful result, if any
    pub mode: Option<String>,
    pub url_count: usize,
    /// Reason of the first failed result, if any
    pub first_error: Option<String>,
    pub crawl_type: CrawlType,
    pub csv_filename: Option<String>,
}

/// Durable record of one extraction job
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    id: String,
    status: JobStatus,
    created_at: DateTime<FixedOffset>,
    started_at: Option<DateTime<FixedOffset>>,
    completed_at: Option<DateTime<FixedOffset>>,
    total_urls: usize,
    completed_urls: usize,
    failed_urls: usize,
    results: Vec<CrawlOutcome>,
    errors: Vec<String>,
    crawl_type: CrawlType,
    csv_filename: Option<String>,
    current_url: Option<String>,
}

impl Job {
    /// Creates a pending job with a fresh id
    ///
    /// # Arguments
    ///
    /// * `total_urls` - Number of URLs the job will attempt, fixed up front
    /// * `crawl_type` - Single URL or bulk
    /// * `csv_filename` - Name of the uploaded CSV, for bulk jobs
    pub fn new(total_urls: usize, crawl_type: CrawlType, csv_filename: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            created_at: now_local(),
            started_at: None,
            completed_at: None,
            total_urls,
            completed_urls: 0,
            failed_urls: 0,
            results: Vec::new(),
            errors: Vec::new(),
            crawl_type,
            csv_filename,
            current_url: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<FixedOffset> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<FixedOffset>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<FixedOffset>> {
        self.completed_at
    }

    pub fn total_urls(&self) -> usize {
        self.total_urls
    }

    pub fn completed_urls(&self) -> usize {
        self.completed_urls
    }

    pub fn failed_urls(&self) -> usize {
        self.failed_urls
    }

    pub fn results(&self) -> &[CrawlOutcome] {
        &self.results
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn crawl_type(&self) -> CrawlType {
        self.crawl_type
    }

    pub fn csv_filename(&self) -> Option<&str> {
        self.csv_filename.as_deref()
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    /// Moves a pending job to running and stamps the start time
    pub fn start(&mut self) -> Result<(), JobError> {
        if self.status != JobStatus::Pending {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Running,
            });
        }
        self.status = JobStatus::Running;
        self.started_at = Some(now_local());
        Ok(())
    }

    /// Records the URL currently being processed
    pub fn set_current_url(&mut self, url: Option<String>) -> Result<(), JobError> {
        if url.is_some() && self.status != JobStatus::Running {
            return Err(JobError::NotRunning {
                status: self.status,
            });
        }
        self.current_url = url;
        Ok(())
    }

    /// Appends a result and advances the matching counter
    ///
    /// Combined results are appended without touching the counters.
    pub fn add_result(&mut self, outcome: CrawlOutcome) -> Result<(), JobError> {
        if self.status != JobStatus::Running {
            return Err(JobError::NotRunning {
                status: self.status,
            });
        }

        if outcome.is_counted() {
            if self.completed_urls + self.failed_urls >= self.total_urls {
                return Err(JobError::ResultOverflow {
                    total: self.total_urls,
                });
            }
            if outcome.is_success() {
                self.completed_urls += 1;
            } else {
                self.failed_urls += 1;
            }
        }

        self.results.push(outcome);
        Ok(())
    }

    /// Ends a running job
    ///
    /// The job becomes `failed` when every URL failed, `completed` otherwise.
    pub fn complete(&mut self) -> Result<(), JobError> {
        let target = if self.total_urls > 0 && self.failed_urls == self.total_urls {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };

        if self.status != JobStatus::Running {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        self.status = target;
        self.completed_at = Some(now_local());
        self.current_url = None;
        Ok(())
    }

    /// Ends a pending or running job as failed and records the error
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Failed,
            });
        }
        self.status = JobStatus::Failed;
        self.completed_at = Some(now_local());
        self.current_url = None;
        self.errors.push(error.into());
        Ok(())
    }

    /// Percentage of URLs completed successfully
    pub fn progress(&self) -> f64 {
        if self.total_urls == 0 {
            0.0
        } else {
            self.completed_urls as f64 / self.total_urls as f64 * 100.0
        }
    }

    /// Typed snapshot of the job
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            created_at: Some(self.created_at.to_rfc3339()),
            started_at: self.started_at.map(|t| t.to_rfc3339()),
            completed_at: self.completed_at.map(|t| t.to_rfc3339()),
            total_urls: self.total_urls,
            completed_urls: self.completed_urls,
            failed_urls: self.failed_urls,
            progress: self.progress(),
            results: self.results.clone(),
            errors: self.errors.clone(),
            crawl_type: Some(self.crawl_type),
            csv_filename: self.csv_filename.clone(),
            current_url: self.current_url.clone(),
        }
    }

    /// JSON object form of the job, including the derived `progress`
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }

    /// Rebuilds a job from its JSON object form
    pub fn from_dict(value: serde_json::Value) -> Result<Self, JobError> {
        let snapshot: JobSnapshot =
            serde_json::from_value(value).map_err(|e| JobError::Malformed(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }

    /// Rebuilds a job from a snapshot
    ///
    /// Older records are repaired on the way in: a missing crawl type is
    /// inferred from the URL count, a `completed` job whose every URL failed
    /// becomes `failed`, and `current_url` is dropped unless the job is
    /// still running.
    pub fn from_snapshot(snapshot: JobSnapshot) -> Result<Self, JobError> {
        let created_at = match snapshot.created_at.as_deref() {
            Some(s) => {
                parse_timestamp(s).ok_or_else(|| JobError::InvalidTimestamp(s.to_string()))?
            }
            None => now_local(),
        };
        let started_at = parse_optional(snapshot.started_at.as_deref())?;
        let completed_at = parse_optional(snapshot.completed_at.as_deref())?;

        let crawl_type = match snapshot.crawl_type {
            Some(CrawlType::Single) | None if snapshot.total_urls > 1 => CrawlType::Bulk,
            Some(crawl_type) => crawl_type,
            None => CrawlType::Single,
        };

        let mut status = snapshot.status;
        if status == JobStatus::Completed
            && snapshot.total_urls > 0
            && snapshot.failed_urls == snapshot.total_urls
        {
            status = JobStatus::Failed;
        }

        let current_url = if status == JobStatus::Running {
            snapshot.current_url
        } else {
            None
        };

        Ok(Self {
            id: snapshot.job_id,
            status,
            created_at,
            started_at,
            completed_at,
            total_urls: snapshot.total_urls,
            completed_urls: snapshot.completed_urls,
            failed_urls: snapshot.failed_urls,
            results: snapshot.results,
            errors: snapshot.errors,
            crawl_type,
            csv_filename: snapshot.csv_filename,
            current_url,
        })
    }

    /// History listing row
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.id.clone(),
            status: self.status,
            created_at: self.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            mode: self
                .results
                .iter()
                .find_map(|r| r.as_success().map(|s| s.mode.to_string())),
            url_count: self.total_urls,
            first_error: self
                .results
                .iter()
                .find_map(|r| r.as_failure().map(|f| f.reason.clone())),
            crawl_type: self.crawl_type,
            csv_filename: self.csv_filename.clone(),
        }
    }
}

fn parse_optional(value: Option<&str>) -> Result<Option<DateTime<FixedOffset>>, JobError> {
    match value {
        Some(s) if !s.is_empty() => parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| JobError::InvalidTimestamp(s.to_string())),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::ErrorKind;
    use crate::state::{CombinedRecord, FailureRecord};

    fn failed(url: &str) -> CrawlOutcome {
        CrawlOutcome::Failed(FailureRecord {
            url: url.to_string(),
            error_type: ErrorKind::HttpError,
            error_code: "404".to_string(),
            reason: "404 Not Found".to_string(),
            retry_possible: false,
            suggestions: Vec::new(),
            diagnostics: None,
            output_folder: None,
            debug_html: None,
        })
    }

    fn combined() -> CrawlOutcome {
        CrawlOutcome::Combined(CombinedRecord {
            label: "Combined Results (1 URLs)".to_string(),
            output_folder: "/tmp/combined_results".to_string(),
            output_files: Vec::new(),
            urls_combined: 1,
        })
    }

    #[test]
    fn test_lifecycle_all_failed_becomes_failed() {
        let mut job = Job::new(2, CrawlType::Bulk, Some("urls.csv".to_string()));
        assert_eq!(job.status(), JobStatus::Pending);

        job.start().unwrap();
        assert_eq!(job.status(), JobStatus::Running);
        assert!(job.started_at().is_some());

        job.set_current_url(Some("https://a.com".to_string())).unwrap();
        job.add_result(failed("https://a.com")).unwrap();
        job.add_result(failed("https://b.com")).unwrap();
        job.complete().unwrap();

        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.current_url().is_none());
        assert!(job.completed_at().is_some());
    }

    #[test]
    fn test_counter_invariant_enforced() {
        let mut job = Job::new(1, CrawlType::Single, None);
        job.start().unwrap();
        job.add_result(failed("https://a.com")).unwrap();

        let err = job.add_result(failed("https://a.com")).unwrap_err();
        assert_eq!(err, JobError::ResultOverflow { total: 1 });

        // Combined entries never count
        job.add_result(combined()).unwrap();
        assert_eq!(job.results().len(), 2);
        assert_eq!(job.completed_urls() + job.failed_urls(), 1);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut job = Job::new(1, CrawlType::Single, None);
        assert!(job.complete().is_err());
        assert!(job.add_result(failed("https://a.com")).is_err());
        assert!(job.set_current_url(Some("https://a.com".to_string())).is_err());

        job.start().unwrap();
        assert!(job.start().is_err());

        job.fail("boom").unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.errors(), ["boom".to_string()]);
        assert!(job.fail("again").is_err());
        assert!(job.complete().is_err());
    }

    #[test]
    fn test_fail_from_pending() {
        let mut job = Job::new(3, CrawlType::Bulk, None);
        job.fail("could not read CSV").unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[test]
    fn test_progress() {
        let mut job = Job::new(4, CrawlType::Bulk, None);
        assert_eq!(job.progress(), 0.0);
        job.start().unwrap();
        job.add_result(failed("https://a.com")).unwrap();
        assert_eq!(job.progress(), 0.0);

        let empty = Job::new(0, CrawlType::Bulk, None);
        assert_eq!(empty.progress(), 0.0);
    }

    #[test]
    fn test_dict_round_trip() {
        let mut job = Job::new(2, CrawlType::Bulk, Some("list.csv".to_string()));
        job.start().unwrap();
        job.set_current_url(Some("https://b.com".to_string())).unwrap();
        job.add_result(failed("https://a.com")).unwrap();

        let dict = job.to_dict();
        assert_eq!(dict["status"], "running");
        assert_eq!(dict["progress"], 0.0);
        assert_eq!(dict["crawl_type"], "bulk");

        let restored = Job::from_dict(dict).unwrap();
        assert_eq!(restored, job);
    }

    #[test]
    fn test_from_dict_repairs_old_records() {
        let value = serde_json::json!({
            "job_id": "abc",
            "status": "completed",
            "created_at": "2024-03-01T10:00:00",
            "total_urls": 2,
            "completed_urls": 0,
            "failed_urls": 2,
            "progress": 42.0,
            "current_url": "https://stale.example"
        });

        let job = Job::from_dict(value).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.crawl_type(), CrawlType::Bulk);
        assert!(job.current_url().is_none());
        assert_eq!(job.created_at().offset().local_minus_utc(), JOB_UTC_OFFSET_SECS);
        assert_eq!(job.created_at().format("%H:%M").to_string(), "10:00");
    }

    #[test]
    fn test_from_dict_single_defaults() {
        let job = Job::from_dict(serde_json::json!({"job_id": "x"})).unwrap();
        assert_eq!(job.total_urls(), 1);
        assert_eq!(job.crawl_type(), CrawlType::Single);
        assert_eq!(job.status(), JobStatus::Pending);
    }

    #[test]
    fn test_from_dict_rejects_bad_timestamp() {
        let value = serde_json::json!({"job_id": "x", "created_at": "yesterday"});
        assert!(matches!(
            Job::from_dict(value),
            Err(JobError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_parse_timestamp_keeps_explicit_offset() {
        let dt = parse_timestamp("2024-03-01T10:00:00+00:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_summary() {
        let mut job = Job::new(1, CrawlType::Single, None);
        job.start().unwrap();
        job.add_result(failed("https://a.com")).unwrap();
        job.complete().unwrap();

        let summary = job.summary();
        assert_eq!(summary.status, JobStatus::Failed);
        assert_eq!(summary.first_error.as_deref(), Some("404 Not Found"));
        assert!(summary.mode.is_none());
    }
}
