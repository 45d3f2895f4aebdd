//! Output folder and file naming
//!
//! Every extraction writes into its own folder under the output directory:
//!
//! ```text
//! output/
//! ├── 003_example_com_docs_20240301_1015/
//! │   ├── example_com_docs_20240301_1015.txt
//! │   ├── example_com_docs_20240301_1015.md
//! │   ├── logo.png
//! │   ├── extraction_details.json
//! │   └── extraction_summary.txt
//! └── combined_results/
//!     └── combined_20240301_101733.txt
//! ```

use crate::crawler::OutputFormat;
use crate::url::authority;
use crate::HarvestError;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

pub const DETAILS_FILE: &str = "extraction_details.json";
pub const SUMMARY_FILE: &str = "extraction_summary.txt";
pub const DEBUG_HTML_FILE: &str = "debug_fetched.html";

/// Characters replaced by `_` in folder and file names
const UNSAFE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Longest first-path-segment kept in names, including its leading `_`
const MAX_SEGMENT_LEN: usize = 50;

fn replace_unsafe(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE_NAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Domain and first path segment of a URL, as used in output names
///
/// # Examples
///
/// ```
/// use sumi_harvest::output::output_slug;
/// use url::Url;
///
/// let url = Url::parse("https://www.example.com/docs/intro?x=1").unwrap();
/// assert_eq!(output_slug(&url), "example_com_docs");
/// ```
pub fn output_slug(url: &Url) -> String {
    let domain = authority(url).replace("www.", "").replace('.', "_");

    let segment = url
        .path()
        .split('/')
        .find(|part| !part.is_empty())
        .map(|first| {
            let cleaned: String = format!("_{}", first)
                .chars()
                .map(|c| {
                    if c.is_alphanumeric() || c == '_' || c == '-' {
                        c
                    } else {
                        '_'
                    }
                })
                .take(MAX_SEGMENT_LEN)
                .collect();
            cleaned
        })
        .unwrap_or_default();

    format!("{}{}", domain, segment)
}

/// Folder name: `[NNN_]{slug}_{YYYYmmdd_HHMM}`
pub fn folder_name(url: &Url, bulk_index: Option<usize>, at: &DateTime<FixedOffset>) -> String {
    let stamp = at.format("%Y%m%d_%H%M");
    let name = match bulk_index {
        Some(index) => format!("{:03}_{}_{}", index, output_slug(url), stamp),
        None => format!("{}_{}", output_slug(url), stamp),
    };
    replace_unsafe(&name)
}

/// Base name shared by the content files in one folder
pub fn file_base_name(url: &Url, at: &DateTime<FixedOffset>) -> String {
    replace_unsafe(&format!("{}_{}", output_slug(url), at.format("%Y%m%d_%H%M")))
}

/// Creates extraction folders under the output directory
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh folder for one extraction
    ///
    /// Existing folders are never reused: when the name is taken, `_1`,
    /// `_2`, ... is appended until creation succeeds.
    ///
    /// # Arguments
    ///
    /// * `url` - The page URL
    /// * `bulk_index` - 1-based row index for bulk jobs
    /// * `at` - Extraction start time
    pub fn create_folder(
        &self,
        url: &Url,
        bulk_index: Option<usize>,
        at: &DateTime<FixedOffset>,
    ) -> io::Result<OutputFolder> {
        fs::create_dir_all(&self.root)?;

        let base = folder_name(url, bulk_index, at);
        let mut attempt = 0usize;
        let (name, path) = loop {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{}_{}", base, attempt)
            };
            let path = self.root.join(&name);
            match fs::create_dir(&path) {
                Ok(()) => break (name, path),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        };
        tracing::debug!("Output folder {}", path.display());

        Ok(OutputFolder {
            path,
            name,
            base_name: file_base_name(url, at),
        })
    }
}

/// One extraction's output folder
#[derive(Debug, Clone)]
pub struct OutputFolder {
    path: PathBuf,
    name: String,
    base_name: String,
}

impl OutputFolder {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folder name relative to the output directory
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Path of a file in this folder, relative to the output directory
    pub fn relative(&self, filename: &str) -> String {
        format!("{}/{}", self.name, filename)
    }

    /// Writes one output format and returns its file name
    pub fn write_format(&self, format: OutputFormat, content: &str) -> io::Result<String> {
        let filename = format!("{}.{}", self.base_name, format.extension());
        fs::write(self.path.join(&filename), content)?;
        Ok(filename)
    }

    /// Writes `extraction_details.json`
    pub fn write_details<T: Serialize>(&self, details: &T) -> Result<(), HarvestError> {
        let json = serde_json::to_string_pretty(details)?;
        fs::write(self.path.join(DETAILS_FILE), json)?;
        Ok(())
    }

    /// Writes `extraction_summary.txt`
    pub fn write_summary(&self, summary: &str) -> io::Result<()> {
        fs::write(self.path.join(SUMMARY_FILE), summary)
    }

    /// Writes the fetched page for post-mortem inspection
    pub fn write_debug_html(&self, body: &str) -> io::Result<()> {
        fs::write(self.path.join(DEBUG_HTML_FILE), body)
    }
}
