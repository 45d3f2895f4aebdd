//! Page preview ahead of an extraction
//!
//! A preview fetches the page once, writes nothing and reports what an
//! extraction would work with: the title, whether the scope resolves, the
//! most common class names and a few element counts.

use crate::config::FetcherConfig;
use crate::crawler::fetcher::{build_http_client, fetch_page, FetchedPage};
use crate::crawler::request::AuthConfig;
use crate::extract::{page_title, resolve_scope, serialize_text, ScopeSelector};
use crate::url::validate_http_url;
use crate::HarvestError;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashMap;

/// Most common class names reported
pub const MAX_PREVIEW_CLASSES: usize = 50;

/// Characters of scope text kept in a preview
pub const SCOPE_PREVIEW_CHARS: usize = 500;

/// Characters of page text kept in a preview
pub const PAGE_PREVIEW_CHARS: usize = 1000;

/// What a page looks like before extraction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePreview {
    pub url: String,
    pub final_url: String,
    pub status_code: u16,
    pub title: String,
    /// A scope was requested and matched
    pub has_scope_element: bool,
    pub scope_element: Option<ScopeElementInfo>,
    /// Class names by descending frequency, first occurrence breaking ties
    pub available_classes: Vec<ClassCount>,
    pub page_text_preview: String,
    pub statistics: PageStatistics,
}

/// The matched scope element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeElementInfo {
    pub tag: String,
    pub text_length: usize,
    pub has_children: bool,
    pub text_preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    pub name: String,
    pub count: usize,
}

/// Element counts over the whole document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageStatistics {
    pub total_elements: usize,
    pub total_links: usize,
    pub total_images: usize,
    pub total_paragraphs: usize,
    /// Length of the raw HTML in bytes
    pub content_length: usize,
    /// Length of the page text in characters
    pub text_length: usize,
}

/// Fetches a page and summarizes it without writing any output
///
/// # Arguments
///
/// * `config` - Fetcher settings
/// * `url` - Page to preview
/// * `auth` - Credentials sent with the request
/// * `scope` - Scope to look for; may be empty
///
/// # Returns
///
/// * `Ok(PagePreview)` - The page was fetched and parsed
/// * `Err(HarvestError)` - Invalid URL, fetch failure or empty body
pub async fn preview_page(
    config: &FetcherConfig,
    url: &str,
    auth: &AuthConfig,
    scope: &ScopeSelector,
) -> Result<PagePreview, HarvestError> {
    validate_http_url(url)?;
    let client = build_http_client(config, auth)?;
    let page = fetch_page(&client, url, auth.basic.as_ref(), config.max_retries).await?;

    if page.body.trim().is_empty() {
        return Err(HarvestError::EmptyContent {
            url: url.to_string(),
        });
    }

    tracing::info!("Previewing {} (HTTP {})", page.final_url, page.status_code);
    Ok(summarize_page(url, &page, scope))
}

/// Builds the preview of an already fetched page
pub fn summarize_page(url: &str, page: &FetchedPage, scope: &ScopeSelector) -> PagePreview {
    let document = Html::parse_document(&page.body);

    let scope_element = if scope.is_whole_document() {
        None
    } else {
        match resolve_scope(&document, &page.body, scope) {
            Ok(element) => Some(scope_info(element)),
            Err(missing) => {
                tracing::info!("Preview: {}", missing.selector);
                None
            }
        }
    };

    let body = select_first(&document, "body").unwrap_or_else(|| document.root_element());
    let page_text: String = body.text().map(str::trim).collect();

    PagePreview {
        url: url.to_string(),
        final_url: page.final_url.clone(),
        status_code: page.status_code,
        title: page_title(&document),
        has_scope_element: scope_element.is_some(),
        scope_element,
        available_classes: class_counts(&document),
        page_text_preview: truncate_chars(&page_text, PAGE_PREVIEW_CHARS),
        statistics: PageStatistics {
            total_elements: count(&document, "*"),
            total_links: count(&document, "a"),
            total_images: count(&document, "img"),
            total_paragraphs: count(&document, "p"),
            content_length: page.body.len(),
            text_length: page_text.chars().count(),
        },
    }
}

fn scope_info(element: ElementRef<'_>) -> ScopeElementInfo {
    let text = serialize_text(element);
    ScopeElementInfo {
        tag: element.value().name().to_string(),
        text_length: text.chars().count(),
        has_children: element.children().count() > 1,
        text_preview: truncate_chars(&text, SCOPE_PREVIEW_CHARS),
    }
}

fn class_counts(document: &Html) -> Vec<ClassCount> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for element in document.root_element().descendants().filter_map(ElementRef::wrap) {
        for class in element.value().classes() {
            let seen = counts.entry(class).or_insert(0);
            if *seen == 0 {
                order.push(class);
            }
            *seen += 1;
        }
    }

    let mut ranked: Vec<ClassCount> = order
        .into_iter()
        .map(|name| ClassCount {
            name: name.to_string(),
            count: counts.get(name).copied().unwrap_or_default(),
        })
        .collect();
    // Stable sort keeps first-seen order among equal counts
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(MAX_PREVIEW_CLASSES);
    ranked
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn count(document: &Html, css: &str) -> usize {
    Selector::parse(css)
        .map(|selector| document.select(&selector).count())
        .unwrap_or_default()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn page(body: &str) -> FetchedPage {
        FetchedPage {
            status_code: 200,
            content_type: "text/html".to_string(),
            final_url: "https://example.com/post".to_string(),
            body: body.to_string(),
            headers: BTreeMap::new(),
        }
    }

    const POST: &str = r#"<html><head><title>Post</title></head><body>
        <div class="card wide"><p>One</p></div>
        <div class="card"><p class="note">Two</p><a href="/x">x</a></div>
        <article class="main-content"><p>Body text</p><img src="a.png"></article>
    </body></html>"#;

    #[test]
    fn test_scope_found() {
        let selector = ScopeSelector::new(Some("main-content".to_string()), None);
        let preview = summarize_page("https://example.com/post", &page(POST), &selector);

        assert_eq!(preview.title, "Post");
        assert!(preview.has_scope_element);
        let scope = preview.scope_element.unwrap();
        assert_eq!(scope.tag, "article");
        assert_eq!(scope.text_preview, "Body text");
        assert!(scope.has_children);
    }

    #[test]
    fn test_missing_scope_is_reported_not_raised() {
        let selector = ScopeSelector::new(None, Some("nope".to_string()));
        let preview = summarize_page("https://example.com/post", &page(POST), &selector);
        assert!(!preview.has_scope_element);
        assert!(preview.scope_element.is_none());
    }

    #[test]
    fn test_classes_ranked_by_frequency() {
        let preview =
            summarize_page("https://example.com/post", &page(POST), &ScopeSelector::default());

        let names: Vec<&str> = preview
            .available_classes
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["card", "wide", "note", "main-content"]);
        assert_eq!(preview.available_classes[0].count, 2);
        assert!(!preview.has_scope_element);
    }

    #[test]
    fn test_statistics_and_text() {
        let preview =
            summarize_page("https://example.com/post", &page(POST), &ScopeSelector::default());

        assert_eq!(preview.statistics.total_links, 1);
        assert_eq!(preview.statistics.total_images, 1);
        assert_eq!(preview.statistics.total_paragraphs, 3);
        assert_eq!(preview.statistics.content_length, POST.len());
        assert_eq!(preview.page_text_preview, "OneTwoxBody text");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé...");
    }
}
