//! Crawler module for fetching and extracting pages
//!
//! This module contains the network side of extraction, including:
//! - Request modelling and validation
//! - HTTP fetching with retry logic and authentication
//! - Image downloading with collision-safe filenames
//! - Failure classification with retry hints and suggestions
//! - Page previews that fetch without writing output
//! - The per-URL extraction pipeline and job coordination

mod coordinator;
mod failure;
mod fetcher;
mod images;
mod pipeline;
mod preview;
mod request;

pub use coordinator::Coordinator;
pub use failure::{classify_failure, http_error_suggestions, ErrorKind, FailureInfo};
pub use fetcher::{build_http_client, fetch_page, FetchedPage};
pub use images::{
    image_extension, sanitize_image_filename, FilenameAllocator, ImageDownloader, ImageRecord,
    ImageReport, ImageStatus, DEFAULT_IMAGE_EXTENSION, IMAGE_EXTENSIONS,
};
pub use pipeline::Extractor;
pub use preview::{
    preview_page, summarize_page, ClassCount, PagePreview, PageStatistics, ScopeElementInfo,
    MAX_PREVIEW_CLASSES, PAGE_PREVIEW_CHARS, SCOPE_PREVIEW_CHARS,
};
pub use request::{AuthConfig, BasicAuth, CrawlMode, CrawlRequest, OutputFormat};
