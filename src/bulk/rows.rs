//! Bulk CSV intake
//!
//! Each data row becomes a [`BulkRow`]. Rows are never rejected at parse
//! time: anything wrong with a row is collected into its `problems` and
//! reported later as that row's validation failure.

use super::auth::{AuthBlock, AuthMethod};
use crate::crawler::{AuthConfig, CrawlMode, CrawlRequest, OutputFormat};
use crate::extract::{LinkTypeFilter, ScopeSelector};
use crate::HarvestError;
use serde::Deserialize;
use std::io::Read;

/// One CSV record as written, before interpretation
#[derive(Debug, Default, Deserialize)]
struct RawRow {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    scope_class: Option<String>,
    #[serde(default)]
    scope_id: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    download_images: Option<String>,
    #[serde(default)]
    link_type: Option<String>,
    #[serde(default)]
    exclude_anchors: Option<String>,
    #[serde(default)]
    auth_enabled: Option<String>,
    #[serde(default)]
    auth_type: Option<String>,
    #[serde(default)]
    cookies: Option<String>,
    #[serde(default)]
    auth_headers: Option<String>,
    #[serde(default)]
    basic_auth_username: Option<String>,
    #[serde(default)]
    basic_auth_password: Option<String>,
}

/// One interpreted bulk row
#[derive(Debug, Clone, PartialEq)]
pub struct BulkRow {
    /// 1-based line in the file; the header is line 1
    pub row_number: usize,
    pub url: String,
    pub mode: CrawlMode,
    pub scope: ScopeSelector,
    pub formats: Vec<OutputFormat>,
    pub download_images: bool,
    pub link_type: LinkTypeFilter,
    pub exclude_anchors: bool,
    /// The row's own credentials, present only when `auth_enabled` is set
    pub auth: Option<AuthBlock>,
    /// Values that could not be interpreted
    pub problems: Vec<String>,
}

impl BulkRow {
    /// Builds the crawl request for this row
    ///
    /// # Arguments
    ///
    /// * `auth` - Credentials already resolved against the batch-wide block
    ///
    /// # Returns
    ///
    /// * `Ok(request)` - The row is valid
    /// * `Err(problems)` - Parse problems plus request validation problems
    pub fn to_request(&self, auth: AuthConfig) -> Result<CrawlRequest, Vec<String>> {
        let mut request = CrawlRequest::new(self.url.clone());
        request.mode = self.mode;
        request.formats = self.formats.clone();
        request.scope = self.scope.clone();
        request.download_images = self.download_images;
        request.link_type = self.link_type;
        request.exclude_anchors = self.exclude_anchors;
        request.auth = auth;

        let mut problems = self.problems.clone();
        if let Err(more) = request.validate() {
            problems.extend(more);
        }

        if problems.is_empty() {
            Ok(request)
        } else {
            Err(problems)
        }
    }
}

/// Interprets a CSV boolean; `true`, `yes`, `1` and `y` are true
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("true" | "yes" | "1" | "y")
    )
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RawRow {
    fn interpret(self, row_number: usize) -> BulkRow {
        let mut problems = Vec::new();

        let mode = self
            .mode
            .as_deref()
            .unwrap_or_default()
            .parse::<CrawlMode>()
            .unwrap_or_else(|e| {
                problems.push(e);
                CrawlMode::Content
            });

        let formats = OutputFormat::parse_list(self.format.as_deref().unwrap_or_default())
            .unwrap_or_else(|e| {
                problems.push(e);
                vec![OutputFormat::Txt]
            });

        let link_type = self
            .link_type
            .as_deref()
            .unwrap_or_default()
            .parse::<LinkTypeFilter>()
            .unwrap_or_else(|e| {
                problems.push(e);
                LinkTypeFilter::All
            });

        let auth = if parse_flag(self.auth_enabled.as_deref()) {
            let method = self
                .auth_type
                .as_deref()
                .unwrap_or_default()
                .parse::<AuthMethod>()
                .unwrap_or_else(|e| {
                    problems.push(e);
                    AuthMethod::Cookies
                });
            Some(AuthBlock {
                method,
                cookies: clean(self.cookies),
                auth_headers: clean(self.auth_headers),
                basic_auth_username: clean(self.basic_auth_username),
                basic_auth_password: clean(self.basic_auth_password),
            })
        } else {
            None
        };

        BulkRow {
            row_number,
            url: self.url.map(|u| u.trim().to_string()).unwrap_or_default(),
            mode,
            scope: ScopeSelector::new(self.scope_class, self.scope_id),
            formats,
            download_images: parse_flag(self.download_images.as_deref()),
            link_type,
            exclude_anchors: parse_flag(self.exclude_anchors.as_deref()),
            auth,
            problems,
        }
    }
}

/// Parses a bulk CSV
///
/// The file must have a `url` column and at least one data row. Unknown
/// columns are ignored and every value is trimmed.
///
/// # Examples
///
/// ```
/// use sumi_harvest::bulk::parse_bulk_csv;
///
/// let csv = "url,mode,format\nhttps://example.com,link,json\n";
/// let rows = parse_bulk_csv(csv.as_bytes()).unwrap();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].row_number, 2);
/// ```
pub fn parse_bulk_csv<R: Read>(reader: R) -> Result<Vec<BulkRow>, HarvestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let has_url = csv_reader.headers()?.iter().any(|h| h == "url");
    if !has_url {
        return Err(HarvestError::Bulk(
            "CSV must contain a 'url' column".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for (idx, record) in csv_reader.deserialize::<RawRow>().enumerate() {
        rows.push(record?.interpret(idx + 2));
    }

    if rows.is_empty() {
        return Err(HarvestError::Bulk("CSV file is empty".to_string()));
    }

    tracing::debug!("Parsed {} bulk rows", rows.len());
    Ok(rows)
}
