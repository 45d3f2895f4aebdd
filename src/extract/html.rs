//! Styled standalone HTML output

use super::page::image_source;
use super::{is_stripped, ImageMap};
use scraper::{ElementRef, Node};

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Reading stylesheet embedded in every generated document
const READING_CSS: &str = r#"<style>
    body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
        line-height: 1.6;
        max-width: 800px;
        margin: 0 auto;
        padding: 20px;
        color: #333;
    }
    img {
        max-width: 100%;
        height: auto;
        display: block;
        margin: 20px 0;
    }
    h1, h2, h3, h4, h5, h6 {
        margin-top: 24px;
        margin-bottom: 16px;
        font-weight: 600;
        line-height: 1.25;
    }
    code {
        background-color: #f6f8fa;
        padding: 2px 6px;
        border-radius: 3px;
        font-family: 'Courier New', monospace;
    }
    pre {
        background-color: #f6f8fa;
        padding: 16px;
        border-radius: 6px;
        overflow-x: auto;
    }
    a {
        color: #0366d6;
        text-decoration: none;
    }
    a:hover {
        text-decoration: underline;
    }
</style>"#;

/// Renders the scope as a complete, styled HTML document
///
/// `script`, `style` and `noscript` elements are dropped, and every
/// `<img>` whose reference was downloaded points at the local file. When
/// the scope is the whole document its `<head>` content is kept and a
/// `<title>` is only added if the page has none.
///
/// # Arguments
///
/// * `scope` - The subtree to render
/// * `title` - Title used when the output has no `<title>` of its own
/// * `images` - Downloaded image filenames keyed by original reference
pub fn to_styled_html(scope: ElementRef<'_>, title: &str, images: &ImageMap) -> String {
    let mut head = String::new();
    let mut body = String::new();
    let mut has_title = false;
    let mut has_charset = false;

    if scope.value().name() == "html" {
        for section in scope.children().filter_map(ElementRef::wrap) {
            match section.value().name() {
                "head" => {
                    for child in section.children().filter_map(ElementRef::wrap) {
                        match child.value().name() {
                            "title" => has_title = true,
                            "meta" if child.value().attr("charset").is_some() => {
                                has_charset = true
                            }
                            _ => {}
                        }
                    }
                    serialize_children(section, images, &mut head);
                }
                "body" => serialize_children(section, images, &mut body),
                _ => serialize_element(section, images, &mut body),
            }
        }
    } else {
        serialize_element(scope, images, &mut body);
    }

    let mut document = String::from("<!DOCTYPE html>\n<html>\n<head>\n");
    if !has_charset {
        document.push_str("<meta charset=\"utf-8\">\n");
    }
    if !head.trim().is_empty() {
        document.push_str(head.trim());
        document.push('\n');
    }
    if !has_title {
        document.push_str(&format!("<title>{}</title>\n", escape_text(title)));
    }
    document.push_str(READING_CSS);
    document.push_str("\n</head>\n<body>\n");
    document.push_str(body.trim());
    document.push_str("\n</body>\n</html>\n");
    document
}

/// Serializes the visible part of a scope as bare HTML
///
/// Same cleanup as [`to_styled_html`] but without a document wrapper. A
/// whole-document scope contributes only its `<body>`.
pub(crate) fn clean_markup(scope: ElementRef<'_>, images: &ImageMap) -> String {
    let mut out = String::new();
    if scope.value().name() == "html" {
        for section in scope.children().filter_map(ElementRef::wrap) {
            match section.value().name() {
                "head" => {}
                "body" => serialize_children(section, images, &mut out),
                _ => serialize_element(section, images, &mut out),
            }
        }
    } else {
        serialize_element(scope, images, &mut out);
    }
    out
}

fn serialize_children(element: ElementRef<'_>, images: &ImageMap, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    serialize_element(child, images, out);
                }
            }
            _ => {}
        }
    }
}

fn serialize_element(element: ElementRef<'_>, images: &ImageMap, out: &mut String) {
    let value = element.value();
    let name = value.name();
    if is_stripped(name) {
        return;
    }

    let local_image = if name == "img" {
        image_source(value).and_then(|src| images.get(src))
    } else {
        None
    };

    out.push('<');
    out.push_str(name);
    for (attr, attr_value) in value.attrs() {
        if local_image.is_some() && attr == "src" {
            continue;
        }
        out.push_str(&format!(" {}=\"{}\"", attr, escape_attr(attr_value)));
    }
    if let Some(local) = local_image {
        out.push_str(&format!(" src=\"{}\"", escape_attr(local)));
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    serialize_children(element, images, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_fragment_wrapped_with_title_and_style() {
        let document = Html::parse_document(r#"<div class="post"><p>Hello &amp; bye</p></div>"#);
        let selector = Selector::parse(".post").unwrap();
        let scope = document.select(&selector).next().unwrap();

        let html = to_styled_html(scope, "My <Page>", &ImageMap::new());

        assert!(html.starts_with("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">"));
        assert!(html.contains("<title>My &lt;Page&gt;</title>"));
        assert!(html.contains("<style>"));
        assert!(html.contains("<div class=\"post\"><p>Hello &amp; bye</p></div>"));
    }

    #[test]
    fn test_full_document_keeps_existing_title() {
        let document = Html::parse_document(
            "<html><head><title>Original</title><script>x()</script></head><body><p>Body</p><noscript>no</noscript></body></html>",
        );

        let html = to_styled_html(document.root_element(), "Fallback", &ImageMap::new());

        assert!(html.contains("<title>Original</title>"));
        assert!(!html.contains("Fallback"));
        assert!(!html.contains("x()"));
        assert!(!html.contains("<noscript>"));
        assert!(html.contains("<body>\n<p>Body</p>\n</body>"));
    }

    #[test]
    fn test_images_rewritten() {
        let document = Html::parse_document(
            r#"<div><img src="/img/logo.png" alt="L"><img data-src="lazy.jpg"><img src="keep.gif"></div>"#,
        );
        let selector = Selector::parse("div").unwrap();
        let scope = document.select(&selector).next().unwrap();

        let mut images = ImageMap::new();
        images.insert("/img/logo.png".to_string(), "logo.png".to_string());
        images.insert("lazy.jpg".to_string(), "lazy.jpg".to_string());

        let html = to_styled_html(scope, "T", &images);

        assert!(html.contains(r#"<img alt="L" src="logo.png">"#));
        assert!(html.contains(r#"<img data-src="lazy.jpg" src="lazy.jpg">"#));
        assert!(html.contains(r#"<img src="keep.gif">"#));
    }

    #[test]
    fn test_clean_markup_drops_head_and_scripts() {
        let document = Html::parse_document(
            "<html><head><title>T</title></head><body><script>x()</script><p>Body</p></body></html>",
        );

        let markup = clean_markup(document.root_element(), &ImageMap::new());

        assert_eq!(markup, "<p>Body</p>");
    }
}
