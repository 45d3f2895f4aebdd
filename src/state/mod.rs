//! Job state and per-URL outcomes
//!
//! # Components
//!
//! - `Job`: lifecycle state machine with counters, results and error log
//! - `CrawlOutcome`: success, failure or combined record for one attempt
//! - Time helpers for the fixed job time zone

mod job;
mod outcome;

pub use job::{
    job_timezone, now_local, parse_timestamp, CrawlType, Job, JobError, JobSnapshot, JobStatus,
    JobSummary, JOB_UTC_OFFSET_SECS,
};
pub use outcome::{
    CombinedRecord, CrawlOutcome, ExtractionStatistics, FailureRecord, SuccessRecord,
};
