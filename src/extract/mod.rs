//! Extraction engine
//!
//! This module turns a parsed HTML document into output artifacts:
//! - Scope resolution (restrict extraction to one subtree by class or id)
//! - Plain-text serialization under block/inline layout rules
//! - Link collection, classification and filtering
//! - Markdown and styled HTML conversion with image path rewriting
//! - Page title, image references and content statistics
//!
//! Everything here is synchronous and works on borrowed `scraper` nodes.
//! Callers parse, extract owned results, and drop the document before
//! awaiting anything.

mod html;
mod links;
mod markdown;
mod page;
mod scope;
mod text;

use std::collections::BTreeMap;

pub use html::to_styled_html;
pub use links::{
    extract_links, filter_links, link_statistics, links_to_json, links_to_text, LinkRecord,
    LinkStatistics, LinkTypeFilter,
};
pub use markdown::to_markdown;
pub use page::{content_statistics, image_references, page_title, ContentStatistics, ImageReference};
pub use scope::{resolve_scope, ScopeNotFound, ScopeSelector, FRAMEWORK_MARKERS};
pub use text::{serialize_text, BLOCK_ELEMENTS};

/// Maps an image reference, exactly as written in the page, to the local
/// filename it was downloaded to
pub type ImageMap = BTreeMap<String, String>;

/// Elements whose subtrees never contribute to any output format
pub(crate) const STRIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript"];

/// Returns true if the element subtree is dropped before serialization
pub(crate) fn is_stripped(name: &str) -> bool {
    STRIPPED_ELEMENTS.contains(&name)
}
