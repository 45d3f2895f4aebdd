//! Single-URL extraction pipeline
//!
//! [`Extractor::extract`] runs one [`CrawlRequest`] end to end and always
//! returns a [`CrawlOutcome`]; failures are classified and recorded, never
//! propagated. Parsed documents are confined to synchronous helpers so no
//! `scraper::Html` lives across an `.await`:
//!
//! 1. validate the request (no network on failure)
//! 2. fetch the page with retries
//! 3. parse, resolve the scope and collect text, title and images
//! 4. download images into the output folder
//! 5. re-parse and render Markdown/HTML with rewritten image paths
//! 6. write output files, `extraction_details.json` and the summary

use crate::config::Config;
use crate::crawler::failure::classify_failure;
use crate::crawler::fetcher::{build_http_client, fetch_page, FetchedPage};
use crate::crawler::images::{ImageDownloader, ImageReport};
use crate::crawler::request::{CrawlMode, CrawlRequest, OutputFormat};
use crate::extract::{
    content_statistics, extract_links, filter_links, image_references, link_statistics,
    links_to_json, links_to_text, page_title, resolve_scope, serialize_text, to_markdown,
    to_styled_html, ImageMap, ImageReference, LinkRecord, ScopeSelector,
};
use crate::output::{
    format_summary, ExtractionDetails, ExtractionParameters, FailedExtractionDetails,
    HttpResponseInfo, ImagesInfo, OutputFolder, OutputWriter, DEBUG_HTML_FILE,
};
use crate::state::{
    now_local, CrawlOutcome, ExtractionStatistics, FailureRecord, SuccessRecord,
};
use crate::url::validate_http_url;
use crate::HarvestError;
use chrono::{DateTime, FixedOffset};
use scraper::Html;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// What the content phase found inside the scope
#[derive(Debug, Clone)]
struct ContentAnalysis {
    text: String,
    title: String,
    images: Vec<ImageReference>,
}

/// Per-attempt context kept for failure reporting
#[derive(Debug, Default)]
struct Attempt {
    page: Option<FetchedPage>,
}

/// Runs extractions and writes their artifacts
#[derive(Debug, Clone)]
pub struct Extractor {
    config: Arc<Config>,
    writer: OutputWriter,
    images: ImageDownloader,
}

impl Extractor {
    /// Creates an extractor writing under `output.output-directory`
    pub fn new(config: Arc<Config>) -> Result<Self, HarvestError> {
        let images = ImageDownloader::new(&config.images, &config.fetcher.user_agent)?;
        let writer = OutputWriter::new(&config.output.output_directory);
        Ok(Self {
            config,
            writer,
            images,
        })
    }

    /// Replaces the image downloader
    pub fn with_image_downloader(mut self, images: ImageDownloader) -> Self {
        self.images = images;
        self
    }

    pub fn output_writer(&self) -> &OutputWriter {
        &self.writer
    }

    /// Runs one extraction
    ///
    /// # Arguments
    ///
    /// * `request` - The extraction to run
    /// * `bulk_index` - 1-based row index for bulk jobs; prefixes the folder name
    ///
    /// # Returns
    ///
    /// A success record, or a classified failure record
    pub async fn extract(&self, request: &CrawlRequest, bulk_index: Option<usize>) -> CrawlOutcome {
        let started = Instant::now();
        let started_at = now_local();

        if let Err(problems) = request.validate() {
            let error = HarvestError::InvalidRequest(problems);
            tracing::warn!("Rejected request for '{}': {}", request.url, error);
            return CrawlOutcome::Failed(FailureRecord::from_failure(
                request.url.clone(),
                classify_failure(&error, None),
            ));
        }

        tracing::info!(
            "Extracting {} ({} mode, auth: {})",
            request.url,
            request.mode,
            request.auth.describe()
        );

        let mut attempt = Attempt::default();
        match self
            .run(request, bulk_index, &started_at, started, &mut attempt)
            .await
        {
            Ok(record) => {
                tracing::info!(
                    "Extracted {} in {:.2}s ({} files)",
                    record.url,
                    record.execution_time,
                    record.output_files.len()
                );
                CrawlOutcome::Success(record)
            }
            Err(error) => CrawlOutcome::Failed(self.record_failure(
                request,
                bulk_index,
                &started_at,
                started,
                error,
                attempt,
            )),
        }
    }

    async fn run(
        &self,
        request: &CrawlRequest,
        bulk_index: Option<usize>,
        started_at: &DateTime<FixedOffset>,
        started: Instant,
        attempt: &mut Attempt,
    ) -> Result<SuccessRecord, HarvestError> {
        let url = validate_http_url(&request.url)?;
        let client = build_http_client(&self.config.fetcher, &request.auth)?;
        let page = fetch_page(
            &client,
            &request.url,
            request.auth.basic.as_ref(),
            self.config.fetcher.max_retries,
        )
        .await?;

        tracing::info!("HTTP {} from {}", page.status_code, page.final_url);
        let page: &FetchedPage = attempt.page.insert(page);
        let base = Url::parse(&page.final_url).unwrap_or_else(|_| url.clone());

        match request.mode {
            CrawlMode::Content => {
                self.extract_content(request, &url, &base, page, bulk_index, started_at, started)
                    .await
            }
            CrawlMode::Link => {
                self.extract_link_list(request, &url, &base, page, bulk_index, started_at, started)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn extract_content(
        &self,
        request: &CrawlRequest,
        url: &Url,
        base: &Url,
        page: &FetchedPage,
        bulk_index: Option<usize>,
        started_at: &DateTime<FixedOffset>,
        started: Instant,
    ) -> Result<SuccessRecord, HarvestError> {
        let analysis = analyze_content(&page.body, &request.scope)?;
        if analysis.text.is_empty() && analysis.images.is_empty() {
            return Err(HarvestError::EmptyContent {
                url: request.url.clone(),
            });
        }

        let folder = self.writer.create_folder(url, bulk_index, started_at)?;

        let report = if request.download_images && !analysis.images.is_empty() {
            tracing::info!("Downloading {} images", analysis.images.len());
            Some(
                self.images
                    .download_all(&analysis.images, base, folder.path())
                    .await,
            )
        } else {
            None
        };
        let mapping = report
            .as_ref()
            .map(|r| r.mapping.clone())
            .unwrap_or_default();

        let mut output_files: Vec<String> = report
            .iter()
            .flat_map(|r| r.images.iter())
            .filter_map(|image| image.local_filename.clone())
            .collect();

        for (format, content) in render_content(&page.body, &request.scope, &request.formats, &analysis, &mapping)? {
            output_files.push(folder.write_format(format, &content)?);
        }

        let statistics = content_statistics(&analysis.text, analysis.images.len(), &analysis.title);
        let warnings = report.as_ref().map(ImageReport::warnings).unwrap_or_default();
        for warning in &warnings {
            tracing::warn!("{}: {}", request.url, warning);
        }
        let has_images = report.as_ref().is_some_and(|r| r.succeeded > 0);

        let details = ExtractionDetails {
            source_url: request.url.clone(),
            extracted_at: *started_at,
            execution_time_seconds: started.elapsed().as_secs_f64(),
            extraction_parameters: ExtractionParameters::from(request),
            http_response: HttpResponseInfo::from(page),
            content_statistics: ExtractionStatistics::Content(statistics),
            images: Some(report.as_ref().map(ImagesInfo::from).unwrap_or_default()),
            output_files,
            errors: Vec::new(),
            warnings,
        };
        write_metadata(&folder, &details)?;

        Ok(SuccessRecord {
            url: request.url.clone(),
            mode: CrawlMode::Content,
            output_folder: folder.path().to_string_lossy().into_owned(),
            output_files: details.output_files,
            statistics: details.content_statistics,
            execution_time: details.execution_time_seconds,
            has_images,
            warnings: details.warnings,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn extract_link_list(
        &self,
        request: &CrawlRequest,
        url: &Url,
        base: &Url,
        page: &FetchedPage,
        bulk_index: Option<usize>,
        started_at: &DateTime<FixedOffset>,
        started: Instant,
    ) -> Result<SuccessRecord, HarvestError> {
        let links = collect_links(&page.body, &request.scope, base)?;
        let links = filter_links(links, request.link_type, request.exclude_anchors);
        let statistics = link_statistics(&links);
        tracing::debug!(
            "{} links ({} internal, {} external)",
            statistics.total_links,
            statistics.internal_links,
            statistics.external_links
        );

        let folder = self.writer.create_folder(url, bulk_index, started_at)?;
        let mut output_files = Vec::new();
        for format in &request.formats {
            let content = match format {
                OutputFormat::Txt => links_to_text(&links),
                OutputFormat::Json => links_to_json(&links)?,
                OutputFormat::Md | OutputFormat::Html => continue,
            };
            output_files.push(folder.write_format(*format, &content)?);
        }

        let details = ExtractionDetails {
            source_url: request.url.clone(),
            extracted_at: *started_at,
            execution_time_seconds: started.elapsed().as_secs_f64(),
            extraction_parameters: ExtractionParameters::from(request),
            http_response: HttpResponseInfo::from(page),
            content_statistics: ExtractionStatistics::Links(statistics),
            images: None,
            output_files,
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        write_metadata(&folder, &details)?;

        Ok(SuccessRecord {
            url: request.url.clone(),
            mode: CrawlMode::Link,
            output_folder: folder.path().to_string_lossy().into_owned(),
            output_files: details.output_files,
            statistics: details.content_statistics,
            execution_time: details.execution_time_seconds,
            has_images: false,
            warnings: Vec::new(),
        })
    }

    /// Classifies a failure and writes its debug artifacts, best effort
    fn record_failure(
        &self,
        request: &CrawlRequest,
        bulk_index: Option<usize>,
        started_at: &DateTime<FixedOffset>,
        started: Instant,
        error: HarvestError,
        attempt: Attempt,
    ) -> FailureRecord {
        let page_status = attempt.page.as_ref().map(|page| page.status_code);
        let info = classify_failure(&error, page_status);
        tracing::error!(
            "Extraction of {} failed [{} {}]: {}",
            request.url,
            info.kind,
            info.code,
            error
        );

        let mut record = FailureRecord::from_failure(request.url.clone(), info);
        let scope_failure = match error {
            HarvestError::ScopeNotFound(diagnostics) => {
                record.diagnostics = Some(diagnostics);
                true
            }
            _ => false,
        };

        let Ok(url) = Url::parse(&request.url) else {
            return record;
        };
        let folder = match self.writer.create_folder(&url, bulk_index, started_at) {
            Ok(folder) => folder,
            Err(e) => {
                tracing::warn!("Could not create folder for failure details: {}", e);
                return record;
            }
        };
        record.output_folder = Some(folder.path().to_string_lossy().into_owned());

        if let Some(page) = &attempt.page {
            match folder.write_debug_html(&page.body) {
                Ok(()) => {
                    tracing::info!("Saved fetched HTML to {}", folder.relative(DEBUG_HTML_FILE));
                    record.debug_html = Some(folder.relative(DEBUG_HTML_FILE));
                    if scope_failure {
                        record.reason.push_str(&format!(
                            "\n\nDebug: fetched HTML saved to {} for inspection",
                            DEBUG_HTML_FILE
                        ));
                    }
                }
                Err(e) => tracing::warn!("Could not save debug HTML: {}", e),
            }
        }

        let details = FailedExtractionDetails::new(
            request,
            &record,
            attempt.page.as_ref(),
            started.elapsed().as_secs_f64(),
            now_local(),
        );
        if let Err(e) = folder.write_details(&details) {
            tracing::warn!("Could not write failure details: {}", e);
        }

        record
    }
}

fn write_metadata(folder: &OutputFolder, details: &ExtractionDetails) -> Result<(), HarvestError> {
    folder.write_details(details)?;
    folder.write_summary(&format_summary(details))?;
    Ok(())
}

/// Parses the page and collects what the content outputs need
fn analyze_content(body: &str, scope: &ScopeSelector) -> Result<ContentAnalysis, HarvestError> {
    let document = Html::parse_document(body);
    let root = resolve_scope(&document, body, scope)?;

    Ok(ContentAnalysis {
        text: serialize_text(root),
        title: page_title(&document),
        images: image_references(root),
    })
}

/// Renders the requested content formats in request order
fn render_content(
    body: &str,
    scope: &ScopeSelector,
    formats: &[OutputFormat],
    analysis: &ContentAnalysis,
    images: &ImageMap,
) -> Result<Vec<(OutputFormat, String)>, HarvestError> {
    let document = Html::parse_document(body);
    let root = resolve_scope(&document, body, scope)?;

    Ok(formats
        .iter()
        .filter_map(|format| {
            let content = match format {
                OutputFormat::Txt => analysis.text.clone(),
                OutputFormat::Md => to_markdown(root, images),
                OutputFormat::Html => to_styled_html(root, &analysis.title, images),
                OutputFormat::Json => return None,
            };
            Some((*format, content))
        })
        .collect())
}

/// Parses the page and collects the links inside the scope
fn collect_links(body: &str, scope: &ScopeSelector, base: &Url) -> Result<Vec<LinkRecord>, HarvestError> {
    let document = Html::parse_document(body);
    let root = resolve_scope(&document, body, scope)?;
    Ok(extract_links(root, base))
}
