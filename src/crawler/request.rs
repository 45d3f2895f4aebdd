//! Crawl request model
//!
//! A [`CrawlRequest`] is one extraction intent. It is validated as a whole
//! before any network traffic so that mode/format mismatches and malformed
//! URLs surface as validation failures.

use crate::extract::{LinkTypeFilter, ScopeSelector};
use crate::url::validate_http_url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What an extraction produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    /// Page content as text, Markdown or HTML
    #[default]
    Content,
    /// The list of links found on the page
    Link,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Link => "link",
        }
    }

    /// Formats this mode can produce
    pub fn allowed_formats(&self) -> &'static [OutputFormat] {
        match self {
            Self::Content => &[OutputFormat::Txt, OutputFormat::Md, OutputFormat::Html],
            Self::Link => &[OutputFormat::Txt, OutputFormat::Json],
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrawlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "content" => Ok(Self::Content),
            "link" | "links" => Ok(Self::Link),
            other => Err(format!(
                "invalid mode '{}' (expected content or link)",
                other
            )),
        }
    }
}

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Txt,
    Md,
    Html,
    Json,
}

impl OutputFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Html => "html",
            Self::Json => "json",
        }
    }

    /// Parses a comma- or space-separated format list
    ///
    /// An empty list yields `[Txt]`. Duplicates are dropped, order is kept.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, String> {
        let mut formats = Vec::new();
        for token in s.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.trim().is_empty() {
                continue;
            }
            let format = token.parse::<Self>()?;
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        if formats.is_empty() {
            formats.push(Self::Txt);
        }
        Ok(formats)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "md" | "markdown" => Ok(Self::Md),
            "html" | "htm" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            other => Err(format!("invalid format '{}'", other)),
        }
    }
}

/// HTTP Basic credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Authentication applied to the page request
///
/// The fields are independent; any combination is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub basic: Option<BasicAuth>,
}

impl AuthConfig {
    /// Returns true if no credential of any kind is configured
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.headers.is_empty() && self.basic.is_none()
    }

    /// Short, secret-free description for logs and summaries
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.cookies.is_empty() {
            parts.push(format!(
                "cookies [{}]",
                self.cookies.keys().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        if !self.headers.is_empty() {
            parts.push(format!(
                "headers [{}]",
                self.headers.keys().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        if let Some(basic) = &self.basic {
            parts.push(format!("basic auth as {}", basic.username));
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// One extraction intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    pub mode: CrawlMode,
    pub formats: Vec<OutputFormat>,
    pub scope: ScopeSelector,
    pub download_images: bool,
    pub link_type: LinkTypeFilter,
    pub exclude_anchors: bool,
    #[serde(skip)]
    pub auth: AuthConfig,
}

impl CrawlRequest {
    /// Creates a content-mode request producing plain text for the whole page
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: CrawlMode::Content,
            formats: vec![OutputFormat::Txt],
            scope: ScopeSelector::default(),
            download_images: false,
            link_type: LinkTypeFilter::All,
            exclude_anchors: false,
            auth: AuthConfig::default(),
        }
    }

    /// Checks the request before any network call
    ///
    /// Every problem is reported, not just the first.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The request can be executed
    /// * `Err(Vec<String>)` - One message per problem
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.url.trim().is_empty() {
            problems.push("URL is required".to_string());
        } else if let Err(e) = validate_http_url(&self.url) {
            problems.push(format!("Invalid URL '{}': {}", self.url, e));
        }

        if self.formats.is_empty() {
            problems.push("At least one output format is required".to_string());
        }

        let allowed = self.mode.allowed_formats();
        for format in &self.formats {
            if !allowed.contains(format) {
                problems.push(format!(
                    "Format '{}' is not available in {} mode (allowed: {})",
                    format,
                    self.mode,
                    allowed
                        .iter()
                        .map(OutputFormat::extension)
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }

        if let Some(basic) = &self.auth.basic {
            if basic.username.is_empty() || basic.password.is_empty() {
                problems.push("Basic auth requires both username and password".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}
