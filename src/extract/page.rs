use scraper::node::Element;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// An `<img>` found inside the scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// The `src` value, or `data-src` for lazily loaded images, as written
    pub src: String,
    pub alt: String,
    pub title: String,
}

/// Statistics recorded for a content-mode extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStatistics {
    pub word_count: usize,
    pub character_count: usize,
    pub image_count: usize,
    pub title: String,
}

/// Returns the page title
///
/// Falls back to the first `<h1>`, then to `"Untitled"`.
pub fn page_title(document: &Html) -> String {
    for css in ["title", "h1"] {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            return element.text().collect::<String>().trim().to_string();
        }
    }
    "Untitled".to_string()
}

/// Lists the images referenced inside the scope, in document order
pub fn image_references(scope: ElementRef<'_>) -> Vec<ImageReference> {
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    scope
        .select(&selector)
        .filter_map(|img| {
            let element = img.value();
            let src = image_source(element)?;

            Some(ImageReference {
                src: src.to_string(),
                alt: element.attr("alt").unwrap_or_default().to_string(),
                title: element.attr("title").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// The reference an `<img>` loads: `src`, or `data-src` when `src` is blank
pub(crate) fn image_source(element: &Element) -> Option<&str> {
    element
        .attr("src")
        .filter(|src| !src.trim().is_empty())
        .or_else(|| element.attr("data-src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
}

/// Computes content statistics from serialized text
pub fn content_statistics(text: &str, image_count: usize, title: &str) -> ContentStatistics {
    ContentStatistics {
        word_count: text.split_whitespace().count(),
        character_count: text.chars().count(),
        image_count,
        title: title.to_string(),
    }
}
