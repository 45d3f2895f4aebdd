use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Markers in `<script>` markup that suggest client-side rendering
pub const FRAMEWORK_MARKERS: &[&str] = &["React", "Vue", "Angular", "botframework", "webchat"];

/// Number of sampled class names reported when a scope lookup fails
const MAX_REPORTED_CLASSES: usize = 20;

/// The subtree an extraction is restricted to
///
/// When both fields are set the id is tried first. When neither is set the
/// whole document is the scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSelector {
    pub class: Option<String>,
    pub id: Option<String>,
}

impl ScopeSelector {
    /// Builds a selector, treating blank strings as absent
    pub fn new(class: Option<String>, id: Option<String>) -> Self {
        let clean = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            class: clean(class),
            id: clean(id),
        }
    }

    /// Returns true if the whole document is the scope
    pub fn is_whole_document(&self) -> bool {
        self.class.is_none() && self.id.is_none()
    }

    /// Human-readable description, e.g. `class='content'`
    pub fn describe(&self) -> String {
        match (&self.class, &self.id) {
            (Some(class), _) => format!("class='{}'", class),
            (None, Some(id)) => format!("id='{}'", id),
            (None, None) => "full page".to_string(),
        }
    }
}

/// Diagnostic payload for a scope lookup that matched nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeNotFound {
    /// The selector as described by [`ScopeSelector::describe`]
    pub selector: String,

    /// The requested class name, if the lookup was by class
    pub class_name: Option<String>,

    /// The class name occurs somewhere in the raw HTML
    pub found_in_source: bool,

    /// Framework markers seen inside `<script>` elements
    pub framework_markers: Vec<String>,

    /// Up to 20 class names present in the document, sorted
    pub available_classes: Vec<String>,
}

impl fmt::Display for ScopeNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scoped element not found: {}", self.selector)?;

        if self.found_in_source {
            if let Some(class) = &self.class_name {
                write!(
                    f,
                    "\n⚠ Note: '{}' found in HTML source but not as a complete class attribute",
                    class
                )?;
                write!(f, "\n   This could mean:")?;
                write!(f, "\n   - The element is inside a <script> or <style> tag")?;
                write!(f, "\n   - The class is part of a longer class name")?;
                write!(f, "\n   - The content is loaded dynamically via JavaScript")?;
            }
        }

        if !self.framework_markers.is_empty() {
            write!(
                f,
                "\n⚠ Page appears to use JavaScript frameworks - content may be dynamically loaded"
            )?;
        }

        if !self.available_classes.is_empty() {
            write!(
                f,
                "\n\nAvailable classes in HTML: {}",
                self.available_classes.join(", ")
            )?;
        }

        Ok(())
    }
}

impl std::error::Error for ScopeNotFound {}

/// Resolves the extraction scope inside a parsed document
///
/// # Lookup Order
///
/// 1. Element whose `id` equals the requested id
/// 2. Element whose `class` attribute equals the requested class exactly
/// 3. Element whose class list contains the requested class as a token
/// 4. CSS selector `.class`
///
/// The first hit wins. Without a selector the root `<html>` element is
/// returned.
///
/// # Arguments
///
/// * `document` - The parsed document
/// * `raw_html` - The markup the document was parsed from, used for diagnostics
/// * `selector` - The requested scope
///
/// # Returns
///
/// * `Ok(ElementRef)` - The scope root
/// * `Err(ScopeNotFound)` - Nothing matched; carries diagnostics
///
/// # Example
///
/// ```
/// use scraper::Html;
/// use sumi_harvest::extract::{resolve_scope, ScopeSelector};
///
/// let html = r#"<div class="main body">Hi</div>"#;
/// let document = Html::parse_document(html);
/// let selector = ScopeSelector::new(Some("body".to_string()), None);
/// let scope = resolve_scope(&document, html, &selector).unwrap();
/// assert_eq!(scope.value().name(), "div");
/// ```
pub fn resolve_scope<'a>(
    document: &'a Html,
    raw_html: &str,
    selector: &ScopeSelector,
) -> Result<ElementRef<'a>, ScopeNotFound> {
    if selector.is_whole_document() {
        return Ok(document.root_element());
    }

    if let Some(id) = &selector.id {
        if let Some(element) = find_by_id(document, id) {
            return Ok(element);
        }
    }

    if let Some(class) = &selector.class {
        if let Some(element) = find_by_class(document, class) {
            return Ok(element);
        }
    }

    Err(diagnose(document, raw_html, selector))
}

fn find_by_id<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    all_elements(document).find(|element| element.value().id() == Some(id))
}

fn find_by_class<'a>(document: &'a Html, class: &str) -> Option<ElementRef<'a>> {
    // Exact attribute value
    if let Some(element) =
        all_elements(document).find(|element| element.value().attr("class") == Some(class))
    {
        return Some(element);
    }

    // Token in the class list
    if let Some(element) = all_elements(document).find(|element| {
        element
            .value()
            .attr("class")
            .map(|value| value.split_whitespace().any(|token| token == class))
            .unwrap_or(false)
    }) {
        return Some(element);
    }

    // CSS selector; unparseable class names simply do not match
    let css = Selector::parse(&format!(".{}", class)).ok()?;
    document.select(&css).next()
}

fn all_elements(document: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    document.root_element().descendants().filter_map(ElementRef::wrap)
}

fn diagnose(document: &Html, raw_html: &str, selector: &ScopeSelector) -> ScopeNotFound {
    let available_classes: Vec<String> = all_elements(document)
        .flat_map(|element| element.value().classes())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(MAX_REPORTED_CLASSES)
        .collect();

    let framework_markers = match Selector::parse("script") {
        Ok(script) => {
            let scripts: Vec<String> = document.select(&script).map(|s| s.html()).collect();
            FRAMEWORK_MARKERS
                .iter()
                .filter(|marker| scripts.iter().any(|s| s.contains(*marker)))
                .map(|marker| marker.to_string())
                .collect()
        }
        Err(_) => Vec::new(),
    };

    let found_in_source = selector
        .class
        .as_deref()
        .map(|class| raw_html.contains(class))
        .unwrap_or(false);

    tracing::debug!(
        "Scope {} not found ({} classes sampled, frameworks: {:?})",
        selector.describe(),
        available_classes.len(),
        framework_markers
    );

    ScopeNotFound {
        selector: selector.describe(),
        class_name: selector.class.clone(),
        found_in_source,
        framework_markers,
        available_classes,
    }
}
