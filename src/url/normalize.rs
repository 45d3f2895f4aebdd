use crate::UrlError;
use url::Url;

/// Prefixes of hrefs that never produce a link record
const SKIPPED_HREF_PREFIXES: &[&str] = &["#", "mailto:", "tel:", "javascript:"];

/// Validates a user-supplied target URL
///
/// Only absolute `http` and `https` URLs with a host are accepted.
///
/// # Arguments
///
/// * `url_str` - The URL string to validate
///
/// # Returns
///
/// * `Ok(Url)` - Parsed URL
/// * `Err(UrlError)` - The URL is malformed, uses another scheme, or has no host
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::validate_http_url;
///
/// assert!(validate_http_url("https://example.com/page").is_ok());
/// assert!(validate_http_url("ftp://example.com/file").is_err());
/// ```
pub fn validate_http_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingDomain),
    }
}

/// Returns true if an href can never become a link record
///
/// Empty hrefs, fragment-only hrefs and `mailto:`, `tel:` and `javascript:`
/// URIs are skipped.
pub fn is_skipped_href(href: &str) -> bool {
    let href = href.trim();
    href.is_empty()
        || SKIPPED_HREF_PREFIXES
            .iter()
            .any(|prefix| href.starts_with(prefix))
}

/// Resolves an href or image reference against the page URL
///
/// # Resolution Rules
///
/// | Input | Result |
/// |-------|--------|
/// | `//host/path` | base scheme + `:` + input |
/// | `http://…` / `https://…` | passed through unchanged |
/// | anything else | joined against the base URL |
///
/// # Arguments
///
/// * `href` - The raw attribute value
/// * `base` - The URL of the page the reference appeared on
///
/// # Returns
///
/// * `Some(String)` - The absolute URL
/// * `None` - The reference could not be joined against the base
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::resolve_reference;
/// use url::Url;
///
/// let base = Url::parse("https://example.com").unwrap();
/// assert_eq!(
///     resolve_reference("//cdn.x.com/i.jpg", &base).as_deref(),
///     Some("https://cdn.x.com/i.jpg")
/// );
/// assert_eq!(
///     resolve_reference("/a", &base).as_deref(),
///     Some("https://example.com/a")
/// );
/// ```
pub fn resolve_reference(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();

    if href.starts_with("//") {
        return Some(format!("{}:{}", base.scheme(), href));
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }

    base.join(href).ok().map(|url| url.to_string())
}

/// Removes the fragment (everything from the first `#`) from a URL string
///
/// The rest of the string is kept byte-for-byte so that fragment-less
/// entries compare equal to their stripped counterparts.
pub fn strip_fragment(url: &str) -> &str {
    match url.find('#') {
        Some(index) => &url[..index],
        None => url,
    }
}
