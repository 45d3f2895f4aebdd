//! DOM to Markdown conversion
//!
//! The scope is first reduced to clean markup (no scripts, styles or
//! `<head>`, images pointing at their downloaded files) and then handed
//! to `htmd`, which takes care of Markdown escaping.

use super::html::clean_markup;
use super::ImageMap;
use scraper::ElementRef;

/// Converts a DOM subtree to Markdown
///
/// # Arguments
///
/// * `scope` - The subtree to convert
/// * `images` - Downloaded image filenames keyed by original reference
///
/// # Example
///
/// ```
/// use scraper::Html;
/// use sumi_harvest::extract::{to_markdown, ImageMap};
///
/// let document = Html::parse_document("<h1>Hi</h1><p>A <strong>bold</strong> move</p>");
/// let markdown = to_markdown(document.root_element(), &ImageMap::new());
/// assert!(markdown.contains("A **bold** move"));
/// ```
pub fn to_markdown(scope: ElementRef<'_>, images: &ImageMap) -> String {
    let markup = clean_markup(scope, images);
    match htmd::convert(&markup) {
        Ok(markdown) => markdown.trim().to_string(),
        Err(e) => {
            tracing::warn!("Markdown conversion failed: {}", e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn markdown_of(html: &str) -> String {
        let document = Html::parse_document(html);
        to_markdown(document.root_element(), &ImageMap::new())
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let md = markdown_of("<h2>Section</h2><p>First para.</p><p>Second para.</p>");
        assert!(md.starts_with("## Section"));
        assert!(md.contains("First para.\n\nSecond para."));
    }

    #[test]
    fn test_links_and_emphasis() {
        let md = markdown_of(r#"<p>See <a href="/docs">the <strong>docs</strong></a> now</p>"#);
        assert_eq!(md, "See [the **docs**](/docs) now");
    }

    #[test]
    fn test_markdown_syntax_in_text_is_escaped() {
        let md = markdown_of("<p>Use 2*3*4 and snake_case_name or [x](y)</p>");
        assert!(md.contains(r"2\*3\*4"));
        assert!(md.contains("snake"));
    }

    #[test]
    fn test_image_rewritten_through_map() {
        let document = Html::parse_document(
            r#"<p><img src="https://cdn.example.com/a/logo.png" alt="Logo"><img src="other.png"></p>"#,
        );
        let mut images = ImageMap::new();
        images.insert(
            "https://cdn.example.com/a/logo.png".to_string(),
            "logo.png".to_string(),
        );

        let md = to_markdown(document.root_element(), &images);
        assert!(md.contains("![Logo](logo.png)"));
        assert!(md.contains("(other.png)"));
        assert!(!md.contains("cdn.example.com"));
    }

    #[test]
    fn test_scripts_and_head_skipped() {
        let md = markdown_of(
            "<html><head><title>T</title><style>p{}</style></head><body><script>x()</script><p>Body</p></body></html>",
        );
        assert_eq!(md, "Body");
    }

    #[test]
    fn test_inline_scope() {
        let document = Html::parse_document(r#"<span class="x">Just <b>this</b></span>"#);
        let selector = Selector::parse("span").unwrap();
        let scope = document.select(&selector).next().unwrap();
        assert_eq!(to_markdown(scope, &ImageMap::new()), "Just **this**");
    }
}
