//! Sumi-Harvest: scoped web page extraction
//!
//! This crate fetches web pages and converts their DOM into plain text,
//! Markdown, styled HTML or a link list, optionally restricted to a single
//! subtree selected by class or id. Referenced images can be downloaded
//! alongside the output, and batches of URLs are tracked as durable jobs.

pub mod bulk;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection refused for {url}")]
    Connect { url: String },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("HTTP {status} {reason} for {url}")]
    HttpStatus {
        url: String,
        status: u16,
        reason: String,
    },

    #[error("Failed to decode response body from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Invalid crawl request: {}", .0.join("; "))]
    InvalidRequest(Vec<String>),

    #[error("{0}")]
    ScopeNotFound(#[from] extract::ScopeNotFound),

    #[error("No extractable content found at {url}")]
    EmptyContent { url: String },

    #[error("Job error: {0}")]
    Job(#[from] state::JobError),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Bulk intake error: {0}")]
    Bulk(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlMode, CrawlRequest, OutputFormat};
pub use state::{CrawlOutcome, CrawlType, Job, JobStatus};
pub use storage::{JobStorage, JsonJobStore, SavedJobStore};
