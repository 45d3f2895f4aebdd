//! Link collection, classification and filtering

use crate::url::{classify_link, is_skipped_href, resolve_reference, strip_fragment, LinkKind};
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// One anchor found inside the scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Absolute URL
    pub url: String,

    /// Internal or external relative to the page
    #[serde(rename = "type")]
    pub kind: LinkKind,

    /// Anchor text (trimmed text nodes joined as-is), or the raw href when
    /// the anchor has no text
    pub text: String,

    /// The `title` attribute, empty when absent
    pub title: String,

    /// The `rel` attribute split on whitespace
    pub rel: Vec<String>,
}

/// Which links survive filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkTypeFilter {
    #[default]
    All,
    Internal,
    External,
}

impl LinkTypeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Internal => "internal",
            Self::External => "external",
        }
    }

    fn accepts(&self, kind: LinkKind) -> bool {
        match self {
            Self::All => true,
            Self::Internal => kind == LinkKind::Internal,
            Self::External => kind == LinkKind::External,
        }
    }
}

impl fmt::Display for LinkTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkTypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "internal" => Ok(Self::Internal),
            "external" => Ok(Self::External),
            other => Err(format!(
                "invalid link type '{}' (expected all, internal or external)",
                other
            )),
        }
    }
}

/// Counts over a filtered link list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatistics {
    pub total_links: usize,
    pub internal_links: usize,
    pub external_links: usize,
    /// Distinct hosts among external links
    pub unique_domains: usize,
}

/// Collects every usable anchor inside the scope
///
/// Hrefs that are empty, fragment-only, `mailto:`, `tel:` or `javascript:`
/// are skipped. The rest are resolved against `base`, deduplicated by their
/// resolved form (the first occurrence keeps its metadata) and classified.
///
/// # Arguments
///
/// * `scope` - The subtree to search
/// * `base` - The page URL
///
/// # Returns
///
/// Link records in document order
pub fn extract_links(scope: ElementRef<'_>, base: &Url) -> Vec<LinkRecord> {
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in scope.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if is_skipped_href(href) {
            continue;
        }
        let Some(url) = resolve_reference(href, base) else {
            tracing::debug!("Skipping unresolvable href: {}", href);
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        // Text nodes are trimmed and joined without a separator.
        let text = element.text().map(str::trim).collect::<String>();
        let text = if text.is_empty() { href.to_string() } else { text };

        links.push(LinkRecord {
            kind: classify_link(&url, base),
            url,
            text,
            title: element.value().attr("title").unwrap_or_default().to_string(),
            rel: element
                .value()
                .attr("rel")
                .map(|rel| rel.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        });
    }

    links
}

/// Applies the link-type filter and optional fragment stripping
///
/// Stripping fragments can merge entries that were distinct before, so a
/// second deduplication pass runs over the stripped URLs.
pub fn filter_links(
    links: Vec<LinkRecord>,
    filter: LinkTypeFilter,
    exclude_anchors: bool,
) -> Vec<LinkRecord> {
    let filtered = links.into_iter().filter(|link| filter.accepts(link.kind));

    if !exclude_anchors {
        return filtered.collect();
    }

    let mut seen = HashSet::new();
    filtered
        .filter_map(|mut link| {
            link.url = strip_fragment(&link.url).to_string();
            seen.insert(link.url.clone()).then_some(link)
        })
        .collect()
}

/// Renders links as one URL per line
pub fn links_to_text(links: &[LinkRecord]) -> String {
    links
        .iter()
        .map(|link| link.url.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders links as a pretty-printed JSON array in encounter order
pub fn links_to_json(links: &[LinkRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(links)
}

/// Computes totals for a link list
pub fn link_statistics(links: &[LinkRecord]) -> LinkStatistics {
    let internal_links = links
        .iter()
        .filter(|link| link.kind == LinkKind::Internal)
        .count();
    let unique_domains = links
        .iter()
        .filter(|link| link.kind == LinkKind::External)
        .map(|link| crate::url::authority_of(&link.url))
        .collect::<BTreeSet<_>>()
        .len();

    LinkStatistics {
        total_links: links.len(),
        internal_links,
        external_links: links.len() - internal_links,
        unique_domains,
    }
}
