//! `extraction_details.json` records

use crate::crawler::{CrawlMode, CrawlRequest, ErrorKind, FetchedPage, ImageRecord, ImageReport, OutputFormat};
use crate::extract::LinkTypeFilter;
use crate::state::{ExtractionStatistics, FailureRecord};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Parameters the extraction ran with; credentials are described, never copied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionParameters {
    pub mode: CrawlMode,
    pub scope_class: Option<String>,
    pub scope_id: Option<String>,
    pub formats: Vec<OutputFormat>,
    pub download_images: bool,
    pub link_type: LinkTypeFilter,
    pub exclude_anchors: bool,
    pub authentication: String,
}

impl From<&CrawlRequest> for ExtractionParameters {
    fn from(request: &CrawlRequest) -> Self {
        Self {
            mode: request.mode,
            scope_class: request.scope.class.clone(),
            scope_id: request.scope.id.clone(),
            formats: request.formats.clone(),
            download_images: request.download_images,
            link_type: request.link_type,
            exclude_anchors: request.exclude_anchors,
            authentication: request.auth.describe(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpResponseInfo {
    pub status_code: u16,
    pub content_type: Option<String>,
    pub final_url: String,
}

impl From<&FetchedPage> for HttpResponseInfo {
    fn from(page: &FetchedPage) -> Self {
        Self {
            status_code: page.status_code,
            content_type: if page.content_type.is_empty() {
                None
            } else {
                Some(page.content_type.clone())
            },
            final_url: page.final_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImagesInfo {
    pub total_found: usize,
    pub successfully_downloaded: usize,
    pub failed: usize,
    pub image_list: Vec<ImageRecord>,
}

impl From<&ImageReport> for ImagesInfo {
    fn from(report: &ImageReport) -> Self {
        Self {
            total_found: report.attempted,
            successfully_downloaded: report.succeeded,
            failed: report.failed,
            image_list: report.images.clone(),
        }
    }
}

/// Details of a successful extraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionDetails {
    pub source_url: String,
    #[serde(rename = "timestamp")]
    pub extracted_at: DateTime<FixedOffset>,
    pub execution_time_seconds: f64,
    pub extraction_parameters: ExtractionParameters,
    pub http_response: HttpResponseInfo,
    pub content_statistics: ExtractionStatistics,
    /// Present for content-mode extractions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ImagesInfo>,
    pub output_files: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Details of a failed extraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedExtractionDetails {
    pub source_url: String,
    #[serde(rename = "timestamp")]
    pub failed_at: DateTime<FixedOffset>,
    pub extraction_status: &'static str,
    pub failure_reason: String,
    pub error_type: ErrorKind,
    pub error_code: String,
    pub retry_possible: bool,
    pub suggestions: Vec<String>,
    pub execution_time: Option<f64>,
    pub http_response: Option<HttpResponseInfo>,
    pub extraction_parameters: ExtractionParameters,
    pub output_files: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl FailedExtractionDetails {
    pub fn new(
        request: &CrawlRequest,
        failure: &FailureRecord,
        page: Option<&FetchedPage>,
        execution_time: f64,
        failed_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            source_url: request.url.clone(),
            failed_at,
            extraction_status: "failed",
            failure_reason: failure.reason.clone(),
            error_type: failure.error_type,
            error_code: failure.error_code.clone(),
            retry_possible: failure.retry_possible,
            suggestions: failure.suggestions.clone(),
            execution_time: Some(execution_time),
            http_response: page.map(HttpResponseInfo::from),
            extraction_parameters: ExtractionParameters::from(request),
            output_files: Vec::new(),
            errors: vec![failure.reason.clone()],
            warnings: Vec::new(),
        }
    }
}
