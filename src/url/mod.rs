//! URL handling module for Sumi-Harvest
//!
//! This module provides target URL validation, href resolution, fragment
//! stripping and host comparison used by link classification.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{authority, authority_of, extract_domain};
pub use normalize::{is_skipped_href, resolve_reference, strip_fragment, validate_http_url};

use url::Url;

/// Classification of a link relative to the page it was found on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Same host (and port) as the page
    Internal,
    /// Any other host
    External,
}

impl LinkKind {
    /// Returns the lowercase label used in output files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

/// Classifies an absolute URL against the page URL
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::{classify_link, LinkKind};
/// use url::Url;
///
/// let base = Url::parse("https://example.com").unwrap();
/// assert_eq!(classify_link("https://example.com/a", &base), LinkKind::Internal);
/// assert_eq!(classify_link("https://cdn.x.com/i.jpg", &base), LinkKind::External);
/// ```
pub fn classify_link(url: &str, base: &Url) -> LinkKind {
    if authority_of(url) == authority(base) {
        LinkKind::Internal
    } else {
        LinkKind::External
    }
}
