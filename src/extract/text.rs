//! Plain-text serialization
//!
//! Block elements end up on their own lines when nested inside another
//! block; `span` elements outside a paragraph behave like blocks; every
//! other element is inline.

use super::is_stripped;
use scraper::{ElementRef, Node};

/// Elements rendered on their own line(s)
pub const BLOCK_ELEMENTS: &[&str] = &[
    "p",
    "div",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "section",
    "article",
    "header",
    "footer",
    "nav",
    "aside",
    "main",
    "blockquote",
    "pre",
    "ul",
    "ol",
    "li",
    "table",
    "tr",
    "td",
    "th",
    "dl",
    "dt",
    "dd",
    "form",
    "fieldset",
    "figure",
    "figcaption",
];

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

/// Serializes a DOM subtree to normalized plain text
///
/// `script`, `style` and `noscript` subtrees are skipped, and comments are
/// not text. The result never contains blank lines, and no line starts or
/// ends with whitespace.
///
/// # Example
///
/// ```
/// use scraper::Html;
/// use sumi_harvest::extract::serialize_text;
///
/// let document = Html::parse_document(
///     "<body><div><p>One <span>two</span></p><p>Three</p></div><span>meta</span></body>",
/// );
/// let text = serialize_text(document.root_element());
/// assert_eq!(text, "One two\nThree\nmeta");
/// ```
pub fn serialize_text(scope: ElementRef<'_>) -> String {
    let raw = walk(scope, false, false);

    raw.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn walk(element: ElementRef<'_>, in_block: bool, inside_p: bool) -> String {
    let mut parts: Vec<String> = Vec::new();

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child.value().name();
                if is_stripped(name) {
                    continue;
                }

                if is_block(name) {
                    let text = walk(child, true, name == "p");
                    if !text.is_empty() {
                        parts.push(text);
                        if in_block {
                            parts.push("\n".to_string());
                        }
                    }
                } else if name == "span" && !inside_p {
                    let text = walk(child, in_block, inside_p);
                    if !text.is_empty() {
                        parts.push(text);
                        parts.push("\n".to_string());
                    }
                } else {
                    let text = walk(child, in_block, inside_p);
                    if !text.is_empty() {
                        parts.push(text);
                    }
                }
            }
            // Comments, doctypes and processing instructions carry no text.
            _ => {}
        }
    }

    parts.join(" ")
}
