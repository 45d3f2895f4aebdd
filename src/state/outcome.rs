//! Per-URL result records
//!
//! A job's `results` list holds one [`CrawlOutcome`] per attempted URL, in
//! attempt order, plus an optional synthetic combined entry at the end.

use crate::crawler::{CrawlMode, ErrorKind, FailureInfo};
use crate::extract::{ContentStatistics, LinkStatistics, ScopeNotFound};
use serde::{Deserialize, Serialize};

/// Statistics of a successful extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractionStatistics {
    Content(ContentStatistics),
    Links(LinkStatistics),
}

/// A URL that produced output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessRecord {
    pub url: String,
    pub mode: CrawlMode,
    /// Absolute path of the extraction folder
    pub output_folder: String,
    /// File names inside `output_folder`
    pub output_files: Vec<String>,
    pub statistics: ExtractionStatistics,
    /// Seconds
    pub execution_time: f64,
    #[serde(default)]
    pub has_images: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A URL that failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub error_type: ErrorKind,
    pub error_code: String,
    pub reason: String,
    pub retry_possible: bool,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Structured scope diagnostics for `ELEMENT_NOT_FOUND`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<ScopeNotFound>,
    /// Folder holding `extraction_details.json` and the debug page, if written
    #[serde(default)]
    pub output_folder: Option<String>,
    /// `<folder name>/debug_fetched.html`, relative to the output directory
    #[serde(default)]
    pub debug_html: Option<String>,
}

impl FailureRecord {
    /// Builds a failure record from a classified error
    pub fn from_failure(url: impl Into<String>, info: FailureInfo) -> Self {
        Self {
            url: url.into(),
            error_type: info.kind,
            error_code: info.code,
            reason: info.reason,
            retry_possible: info.retryable,
            suggestions: info.suggestions,
            diagnostics: None,
            output_folder: None,
            debug_html: None,
        }
    }
}

/// The merged output of a bulk job's successful rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedRecord {
    pub label: String,
    pub output_folder: String,
    pub output_files: Vec<String>,
    pub urls_combined: usize,
}

/// Result of one extraction attempt, tagged by `status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CrawlOutcome {
    Success(SuccessRecord),
    Failed(FailureRecord),
    Combined(CombinedRecord),
}

impl CrawlOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Combined entries are informational and never touch the job counters
    pub fn is_counted(&self) -> bool {
        !matches!(self, Self::Combined(_))
    }

    /// The source URL, or the combined label
    pub fn url(&self) -> &str {
        match self {
            Self::Success(record) => &record.url,
            Self::Failed(record) => &record.url,
            Self::Combined(record) => &record.label,
        }
    }

    /// The folder this outcome wrote to, if any
    pub fn output_folder(&self) -> Option<&str> {
        match self {
            Self::Success(record) => Some(&record.output_folder),
            Self::Failed(record) => record.output_folder.as_deref(),
            Self::Combined(record) => Some(&record.output_folder),
        }
    }

    pub fn output_files(&self) -> &[String] {
        match self {
            Self::Success(record) => &record.output_files,
            Self::Failed(_) => &[],
            Self::Combined(record) => &record.output_files,
        }
    }

    pub fn as_success(&self) -> Option<&SuccessRecord> {
        match self {
            Self::Success(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_failure(&self) -> Option<&FailureRecord> {
        match self {
            Self::Failed(record) => Some(record),
            _ => None,
        }
    }
}
