//! Image resolution and download
//!
//! Images referenced inside the scope are resolved like links, fetched
//! once per distinct URL, and stored under collision-free local names.
//! Failures are recorded per image and never abort the extraction.

use crate::config::ImageConfig;
use crate::extract::{ImageMap, ImageReference};
use crate::url::resolve_reference;
use crate::HarvestError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Extensions kept as-is when they appear on the URL basename
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".bmp", ".ico",
];

/// Extension used when neither the URL nor the response says what the image is
pub const DEFAULT_IMAGE_EXTENSION: &str = ".jpg";

/// Longest stem kept from a URL basename
const MAX_STEM_CHARS: usize = 100;

/// Characters that cannot appear in a local filename
const UNSAFE_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Outcome of one image download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Success,
    Failed,
}

/// One image as written in the page and what happened to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// The reference exactly as written in the page
    pub original_url: String,
    /// Absolute URL the image was requested from
    pub resolved_url: Option<String>,
    /// Name of the file in the output folder
    pub local_filename: Option<String>,
    pub status: ImageStatus,
    pub size_bytes: Option<u64>,
    pub error: Option<String>,
}

/// Totals and per-image results for one extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub images: Vec<ImageRecord>,
    /// Original reference → local filename, for successfully downloaded images
    pub mapping: ImageMap,
}

impl ImageReport {
    /// Soft-failure warnings to surface on the extraction result
    pub fn warnings(&self) -> Vec<String> {
        if self.failed == 0 {
            Vec::new()
        } else {
            vec![format!("{} images failed to download", self.failed)]
        }
    }
}

/// Hands out unique filenames within one output folder
///
/// The first request for a name gets it unchanged; later requests get
/// `stem_1.ext`, `stem_2.ext`, and so on.
#[derive(Debug, Default)]
pub struct FilenameAllocator {
    used: HashSet<String>,
}

impl FilenameAllocator {
    /// Creates an allocator that also avoids files already present in `dir`
    pub fn for_directory(dir: &Path) -> Self {
        let used = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| entry.file_name().into_string().ok())
                    .collect()
            })
            .unwrap_or_default();
        Self { used }
    }

    /// Reserves and returns a unique name derived from `candidate`
    pub fn allocate(&mut self, candidate: &str) -> String {
        if self.used.insert(candidate.to_string()) {
            return candidate.to_string();
        }

        let (stem, extension) = split_extension(candidate);
        let mut counter = 1;
        loop {
            let name = format!("{}_{}{}", stem, counter, extension);
            if self.used.insert(name.clone()) {
                return name;
            }
            counter += 1;
        }
    }
}

/// Splits `name.ext` into (`name`, `.ext`); dotfiles have no extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

/// Derives a safe local filename from an image URL
///
/// Takes the percent-decoded basename of the URL path, replaces characters
/// that are unsafe on common filesystems with `_`, falls back to `image`
/// when nothing usable is left, and caps the stem at 100 characters.
///
/// # Examples
///
/// ```
/// use sumi_harvest::crawler::sanitize_image_filename;
///
/// assert_eq!(sanitize_image_filename("https://x.com/a/my%20logo.png?v=2"), "my logo.png");
/// assert_eq!(sanitize_image_filename("https://x.com/"), "image");
/// ```
pub fn sanitize_image_filename(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or_default().to_string());
    let decoded = urlencoding::decode(&path)
        .map(|d| d.into_owned())
        .unwrap_or(path);
    let basename = decoded.rsplit('/').next().unwrap_or_default();

    let cleaned: String = basename
        .chars()
        .map(|c| {
            if UNSAFE_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "_" {
        return "image".to_string();
    }

    let (stem, extension) = split_extension(cleaned);
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
    format!("{}{}", stem, extension)
}

/// Picks the extension for a downloaded image
///
/// A known image extension on the URL basename wins, then the response
/// content-type, then [`DEFAULT_IMAGE_EXTENSION`].
pub fn image_extension(filename: &str, content_type: Option<&str>) -> &'static str {
    let (_, extension) = split_extension(filename);
    let extension = extension.to_lowercase();
    if let Some(known) = IMAGE_EXTENSIONS.iter().find(|e| **e == extension) {
        return known;
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_lowercase())
        .unwrap_or_default();
    match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/svg+xml" => ".svg",
        "image/webp" => ".webp",
        "image/bmp" => ".bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        _ => DEFAULT_IMAGE_EXTENSION,
    }
}

/// Downloads images into an extraction's output folder
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    client: Client,
    max_bytes: u64,
}

impl ImageDownloader {
    /// Creates a downloader from configuration
    pub fn new(config: &ImageConfig, user_agent: &str) -> Result<Self, HarvestError> {
        Self::with_limits(
            Duration::from_secs(config.timeout_secs),
            config.max_size_bytes(),
            user_agent,
        )
    }

    /// Creates a downloader with an explicit timeout and size ceiling
    pub fn with_limits(
        timeout: Duration,
        max_bytes: u64,
        user_agent: &str,
    ) -> Result<Self, HarvestError> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|source| HarvestError::Http {
                url: String::new(),
                source,
            })?;
        Ok(Self { client, max_bytes })
    }

    /// Downloads every referenced image, sequentially, in document order
    ///
    /// # Arguments
    ///
    /// * `references` - Images found inside the scope
    /// * `base` - The page URL references are resolved against
    /// * `dir` - The extraction's output folder
    ///
    /// # Returns
    ///
    /// An [`ImageReport`]; individual failures are recorded in it
    pub async fn download_all(
        &self,
        references: &[ImageReference],
        base: &Url,
        dir: &Path,
    ) -> ImageReport {
        let mut report = ImageReport::default();
        let mut allocator = FilenameAllocator::for_directory(dir);
        let mut by_url: HashMap<String, Option<String>> = HashMap::new();

        for reference in references {
            let original = reference.src.clone();

            if original.starts_with("data:") {
                report.failed += 1;
                report.attempted += 1;
                report.images.push(failed_record(
                    original,
                    None,
                    "Inline data URI images are not downloaded".to_string(),
                ));
                continue;
            }

            let Some(resolved) = resolve_reference(&original, base) else {
                report.failed += 1;
                report.attempted += 1;
                report.images.push(failed_record(
                    original,
                    None,
                    "Could not resolve image URL".to_string(),
                ));
                continue;
            };

            // Same image referenced again: reuse the first outcome
            if let Some(previous) = by_url.get(&resolved) {
                if let Some(filename) = previous {
                    report.mapping.insert(original, filename.clone());
                }
                continue;
            }

            report.attempted += 1;
            match self.download_one(&resolved, dir, &mut allocator).await {
                Ok((filename, size)) => {
                    tracing::debug!("Downloaded image {} -> {}", resolved, filename);
                    report.succeeded += 1;
                    report.mapping.insert(original.clone(), filename.clone());
                    by_url.insert(resolved.clone(), Some(filename.clone()));
                    report.images.push(ImageRecord {
                        original_url: original,
                        resolved_url: Some(resolved),
                        local_filename: Some(filename),
                        status: ImageStatus::Success,
                        size_bytes: Some(size),
                        error: None,
                    });
                }
                Err(message) => {
                    tracing::warn!("Image download failed for {}: {}", resolved, message);
                    report.failed += 1;
                    by_url.insert(resolved.clone(), None);
                    report
                        .images
                        .push(failed_record(original, Some(resolved), message));
                }
            }
        }

        tracing::info!(
            "Images: {} of {} downloaded",
            report.succeeded,
            report.attempted
        );
        report
    }

    async fn download_one(
        &self,
        url: &str,
        dir: &Path,
        allocator: &mut FilenameAllocator,
    ) -> Result<(String, u64), String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(format!(
                    "Image too large: {} bytes (max {})",
                    length, self.max_bytes
                ));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let base_name = sanitize_image_filename(url);
        let extension = image_extension(&base_name, content_type.as_deref());
        let candidate = if base_name.to_lowercase().ends_with(extension) {
            base_name
        } else {
            format!("{}{}", base_name, extension)
        };
        let filename = allocator.allocate(&candidate);
        let path = dir.join(&filename);

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| e.to_string())?;
        let mut written: u64 = 0;

        let outcome: Result<(), String> = async {
            while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
                written += chunk.len() as u64;
                if written > self.max_bytes {
                    return Err(format!(
                        "Image exceeded size limit while downloading (max {} bytes)",
                        self.max_bytes
                    ));
                }
                file.write_all(&chunk).await.map_err(|e| e.to_string())?;
            }
            file.flush().await.map_err(|e| e.to_string())
        }
        .await;

        if let Err(message) = outcome {
            drop(file);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(message);
        }

        Ok((filename, written))
    }
}

fn failed_record(original: String, resolved: Option<String>, error: String) -> ImageRecord {
    ImageRecord {
        original_url: original,
        resolved_url: resolved,
        local_filename: None,
        status: ImageStatus::Failed,
        size_bytes: None,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_suffixes_collisions() {
        let mut allocator = FilenameAllocator::default();
        assert_eq!(allocator.allocate("logo.png"), "logo.png");
        assert_eq!(allocator.allocate("logo.png"), "logo_1.png");
        assert_eq!(allocator.allocate("logo.png"), "logo_2.png");
        assert_eq!(allocator.allocate("logo_1.png"), "logo_1_1.png");
        assert_eq!(allocator.allocate("image"), "image");
        assert_eq!(allocator.allocate("image"), "image_1");
    }

    #[test]
    fn test_allocator_avoids_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), b"old").unwrap();

        let mut allocator = FilenameAllocator::for_directory(dir.path());
        assert_eq!(allocator.allocate("logo.png"), "logo_1.png");
    }

    #[test]
    fn test_sanitize_basename() {
        assert_eq!(sanitize_image_filename("https://x.com/img/logo.png"), "logo.png");
        assert_eq!(
            sanitize_image_filename("https://x.com/img/a%3Cb%3E.png"),
            "a_b_.png"
        );
        assert_eq!(sanitize_image_filename("https://x.com/img/"), "image");
    }

    #[test]
    fn test_sanitize_truncates_stem() {
        let long = "a".repeat(150);
        let name = sanitize_image_filename(&format!("https://x.com/{}.webp", long));
        assert_eq!(name, format!("{}.webp", "a".repeat(100)));
    }

    #[test]
    fn test_extension_sources() {
        assert_eq!(image_extension("logo.PNG", Some("image/gif")), ".png");
        assert_eq!(image_extension("photo", Some("image/webp; charset=binary")), ".webp");
        assert_eq!(image_extension("photo.php", Some("image/svg+xml")), ".svg");
        assert_eq!(image_extension("photo", None), ".jpg");
        assert_eq!(image_extension("photo", Some("application/octet-stream")), ".jpg");
    }

    #[test]
    fn test_report_warnings() {
        let mut report = ImageReport::default();
        assert!(report.warnings().is_empty());
        report.failed = 2;
        assert_eq!(report.warnings(), vec!["2 images failed to download"]);
    }
}
