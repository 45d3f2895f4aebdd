use serde::Deserialize;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
}

/// Page fetch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Timeout for a single HTTP attempt (seconds)
    #[serde(rename = "timeout-secs", default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Number of attempts made for retryable failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum number of redirects followed per request
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Image download configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Timeout for a single image request (seconds)
    #[serde(rename = "timeout-secs", default = "default_image_timeout")]
    pub timeout_secs: u64,

    /// Largest accepted image (megabytes)
    #[serde(rename = "max-size-mb", default = "default_max_size_mb")]
    pub max_size_mb: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives one folder per extraction
    #[serde(rename = "output-directory", default = "default_output_directory")]
    pub output_directory: String,

    /// Path to the JSON job history file
    #[serde(rename = "job-history-path", default = "default_job_history_path")]
    pub job_history_path: String,

    /// Path to the JSON saved-job file
    #[serde(rename = "saved-jobs-path", default = "default_saved_jobs_path")]
    pub saved_jobs_path: String,
}

/// Bulk intake configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BulkConfig {
    /// Maximum number of rows accepted in one batch
    #[serde(rename = "max-urls", default = "default_max_urls")]
    pub max_urls: usize,
}

impl ImageConfig {
    /// The size ceiling in bytes
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_retries: default_max_retries(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_image_timeout(),
            max_size_mb: default_max_size_mb(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            job_history_path: default_job_history_path(),
            saved_jobs_path: default_saved_jobs_path(),
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_urls: default_max_urls(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Web Crawler Bot)".to_string()
}

fn default_image_timeout() -> u64 {
    10
}

fn default_max_size_mb() -> u64 {
    10
}

fn default_output_directory() -> String {
    "./output".to_string()
}

fn default_job_history_path() -> String {
    "./job_history.json".to_string()
}

fn default_saved_jobs_path() -> String {
    "./saved_jobs.json".to_string()
}

fn default_max_urls() -> usize {
    1000
}
