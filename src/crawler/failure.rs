//! Failure classification
//!
//! Every per-URL failure is turned into a [`FailureInfo`]: a kind from the
//! fixed taxonomy, a machine code, a readable reason, a retry hint and a
//! list of operator suggestions.

use crate::HarvestError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout, refused connection, redirect loop
    NetworkError,
    /// Non-2xx response
    HttpError,
    /// Malformed URL or request parameters
    ValidationError,
    /// Scope not found or nothing to extract
    ContentError,
    /// Response body could not be decoded
    ParsingError,
    /// Output could not be written
    PermissionError,
    /// Anything else
    UnknownError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::HttpError => "http_error",
            Self::ValidationError => "validation_error",
            Self::ContentError => "content_error",
            Self::ParsingError => "parsing_error",
            Self::PermissionError => "permission_error",
            Self::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified per-URL failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: ErrorKind,
    pub code: String,
    pub reason: String,
    pub retryable: bool,
    pub suggestions: Vec<String>,
}

impl FailureInfo {
    fn new(kind: ErrorKind, code: &str, reason: String, retryable: bool, suggestions: &[&str]) -> Self {
        Self {
            kind,
            code: code.to_string(),
            reason,
            retryable,
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Suggestions for an HTTP status code
pub fn http_error_suggestions(status: u16) -> Vec<String> {
    let suggestions: &[&str] = match status {
        400 => &[
            "Check if the URL is properly formatted",
            "Verify all required parameters are included",
            "Try accessing the URL directly in a browser",
        ],
        401 => &[
            "The page requires authentication",
            "Check if you have the necessary credentials",
            "This content may not be publicly accessible",
        ],
        403 => &[
            "Access to this resource is forbidden",
            "The website may be blocking automated access",
            "Try accessing the page in a browser to verify availability",
        ],
        404 => &[
            "Check if the URL is correct and complete",
            "Verify the page still exists on the website",
            "The page may have been moved or deleted",
        ],
        408 => &[
            "The request timed out",
            "Check your internet connection",
            "The server may be slow - try again later",
        ],
        429 => &[
            "Too many requests sent to the server",
            "Wait a few minutes before trying again",
            "The website may have rate limiting in place",
        ],
        500 => &[
            "The server encountered an internal error",
            "This is a server-side issue, not your fault",
            "Try again in a few minutes - the issue may be temporary",
        ],
        502 => &[
            "Bad gateway - the server received an invalid response",
            "This is a server infrastructure issue",
            "Wait a few minutes and try again",
        ],
        503 => &[
            "The service is temporarily unavailable",
            "The server may be down for maintenance",
            "Try again later when the service is restored",
        ],
        504 => &[
            "Gateway timeout - the server took too long to respond",
            "The website may be experiencing high traffic",
            "Try again in a few minutes",
        ],
        _ => &[
            "An unexpected HTTP error occurred",
            "Try accessing the URL in a browser to verify it works",
            "Contact the website administrator if the problem persists",
        ],
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}

/// Classifies an extraction error
///
/// # Arguments
///
/// * `error` - The error that ended the extraction
/// * `page_status` - HTTP status of the page response, when the page was fetched
pub fn classify_failure(error: &HarvestError, page_status: Option<u16>) -> FailureInfo {
    match error {
        HarvestError::Timeout { .. } => FailureInfo::new(
            ErrorKind::NetworkError,
            "TIMEOUT",
            "Connection timeout - Server took too long to respond".to_string(),
            true,
            &[
                "Check your internet connection",
                "Try again in a few moments",
                "The target server may be slow or experiencing issues",
            ],
        ),
        HarvestError::Connect { .. } => FailureInfo::new(
            ErrorKind::NetworkError,
            "CONNECTION_REFUSED",
            "Connection refused - Unable to reach the server".to_string(),
            true,
            &[
                "Verify the URL is correct",
                "Check your internet connection",
                "The server may be down or unreachable",
                "Try again in a few minutes",
            ],
        ),
        HarvestError::RedirectLimit { .. } => FailureInfo::new(
            ErrorKind::NetworkError,
            "TOO_MANY_REDIRECTS",
            "Too many redirects - The URL redirected too many times".to_string(),
            false,
            &[
                "The URL may be misconfigured",
                "Try accessing the final destination URL directly",
                "Contact the website administrator",
            ],
        ),
        HarvestError::HttpStatus { status, reason, .. } => FailureInfo {
            kind: ErrorKind::HttpError,
            code: status.to_string(),
            reason: format!("{} {}", status, reason),
            retryable: *status >= 500,
            suggestions: http_error_suggestions(*status),
        },
        HarvestError::UrlError(_) => FailureInfo::new(
            ErrorKind::ValidationError,
            "INVALID_URL",
            "Invalid URL format - Please check the URL syntax".to_string(),
            false,
            &[
                "Ensure the URL starts with http:// or https://",
                "Check for typos in the URL",
                "Verify the URL is complete and properly formatted",
            ],
        ),
        HarvestError::InvalidRequest(problems) => FailureInfo::new(
            ErrorKind::ValidationError,
            "VALIDATION_ERROR",
            format!("Validation error - {}", problems.join("; ")),
            false,
            &[
                "Check the input parameters",
                "Verify all required fields are provided correctly",
            ],
        ),
        HarvestError::ScopeNotFound(diagnostics) => {
            let fetched_ok = page_status == Some(200);
            let status_note = match page_status {
                Some(200) => "✓ Authentication successful".to_string(),
                Some(code) => format!("⚠ HTTP {}", code),
                None => "⚠ Page status unknown".to_string(),
            };
            let suggestions: &[&str] = if fetched_ok {
                &[
                    "✓ Page was fetched successfully with authentication",
                    "✗ The specified CSS class or ID does not exist on this page",
                    "Verify the class name or ID is correct",
                    "Try extracting without scope restrictions to see full page content",
                ]
            } else {
                &[
                    "Verify the class name or ID is correct",
                    "Check if the page structure has changed",
                    "If using authentication, verify credentials are correct",
                    "Try extracting without scope restrictions first",
                    "Inspect the page HTML to confirm the element exists",
                ]
            };
            FailureInfo::new(
                ErrorKind::ContentError,
                "ELEMENT_NOT_FOUND",
                format!("{} - {}", status_note, diagnostics),
                false,
                suggestions,
            )
        }
        HarvestError::EmptyContent { .. } => FailureInfo::new(
            ErrorKind::ContentError,
            "EMPTY_CONTENT",
            "Empty content - No extractable content found on the page".to_string(),
            false,
            &[
                "The page may be empty or contain only dynamic content",
                "Try a different URL",
                "Check if the page loads properly in a browser",
            ],
        ),
        HarvestError::Decode { .. } => FailureInfo::new(
            ErrorKind::ParsingError,
            "ENCODING_ERROR",
            "Text encoding error - Unable to decode page content".to_string(),
            true,
            &[
                "The page may use an unsupported encoding",
                "Try again - encoding detection may succeed on retry",
                "Contact support if this error persists",
            ],
        ),
        HarvestError::Io(io) => classify_io_error(io),
        other => FailureInfo::new(
            ErrorKind::UnknownError,
            "UNKNOWN",
            format!("Extraction failed - {}", other),
            true,
            &[
                "Try again in a few moments",
                "Check the URL is accessible in a browser",
                "Contact support if the problem persists",
            ],
        ),
    }
}

fn classify_io_error(error: &std::io::Error) -> FailureInfo {
    if error.kind() == std::io::ErrorKind::PermissionDenied {
        return FailureInfo::new(
            ErrorKind::PermissionError,
            "PERMISSION_DENIED",
            "Permission denied - Unable to write output files".to_string(),
            false,
            &[
                "Check output directory permissions",
                "Ensure you have write access to the output folder",
                "Try specifying a different output directory",
            ],
        );
    }

    if error.to_string().contains("No space left on device") {
        return FailureInfo::new(
            ErrorKind::PermissionError,
            "DISK_FULL",
            "Disk space full - Unable to save extracted content".to_string(),
            false,
            &[
                "Free up disk space on your device",
                "Delete unnecessary files",
                "Use a different output directory with more space",
            ],
        );
    }

    FailureInfo::new(
        ErrorKind::PermissionError,
        "FILE_SYSTEM_ERROR",
        format!("File system error - {}", error),
        false,
        &[
            "Check file system permissions",
            "Verify the output path is accessible",
            "Contact system administrator if needed",
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ScopeNotFound;

    fn url() -> String {
        "https://example.com".to_string()
    }

    #[test]
    fn test_timeout_is_retryable_network_error() {
        let info = classify_failure(&HarvestError::Timeout { url: url() }, None);
        assert_eq!(info.kind, ErrorKind::NetworkError);
        assert_eq!(info.code, "TIMEOUT");
        assert!(info.retryable);
    }

    #[test]
    fn test_redirect_loop_not_retryable() {
        let info = classify_failure(&HarvestError::RedirectLimit { url: url() }, None);
        assert_eq!(info.kind, ErrorKind::NetworkError);
        assert!(!info.retryable);
    }

    #[test]
    fn test_http_status_retry_only_for_5xx() {
        let not_found = HarvestError::HttpStatus {
            url: url(),
            status: 404,
            reason: "Not Found".to_string(),
        };
        let info = classify_failure(&not_found, Some(404));
        assert_eq!(info.kind, ErrorKind::HttpError);
        assert_eq!(info.code, "404");
        assert_eq!(info.reason, "404 Not Found");
        assert!(!info.retryable);
        assert_eq!(info.suggestions[0], "Check if the URL is correct and complete");

        let unavailable = HarvestError::HttpStatus {
            url: url(),
            status: 503,
            reason: "Service Unavailable".to_string(),
        };
        assert!(classify_failure(&unavailable, Some(503)).retryable);
    }

    #[test]
    fn test_unlisted_status_gets_default_suggestions() {
        let suggestions = http_error_suggestions(418);
        assert_eq!(suggestions[0], "An unexpected HTTP error occurred");
    }

    #[test]
    fn test_validation_errors() {
        let info = classify_failure(&HarvestError::UrlError(crate::UrlError::MissingDomain), None);
        assert_eq!(info.kind, ErrorKind::ValidationError);
        assert_eq!(info.code, "INVALID_URL");

        let info = classify_failure(
            &HarvestError::InvalidRequest(vec!["bad format".to_string()]),
            None,
        );
        assert_eq!(info.code, "VALIDATION_ERROR");
        assert!(info.reason.contains("bad format"));
        assert!(!info.retryable);
    }

    #[test]
    fn test_scope_not_found_notes_page_status() {
        let error = HarvestError::ScopeNotFound(ScopeNotFound {
            selector: "class='x'".to_string(),
            class_name: Some("x".to_string()),
            found_in_source: false,
            framework_markers: Vec::new(),
            available_classes: vec!["y".to_string()],
        });

        let info = classify_failure(&error, Some(200));
        assert_eq!(info.kind, ErrorKind::ContentError);
        assert_eq!(info.code, "ELEMENT_NOT_FOUND");
        assert!(info.reason.starts_with("✓ Authentication successful - Scoped element not found"));
        assert!(info.suggestions[0].contains("fetched successfully"));

        let info = classify_failure(&error, Some(203));
        assert!(info.reason.starts_with("⚠ HTTP 203"));
    }

    #[test]
    fn test_io_errors() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(classify_failure(&HarvestError::Io(denied), None).code, "PERMISSION_DENIED");

        let full = std::io::Error::new(std::io::ErrorKind::Other, "No space left on device");
        assert_eq!(classify_failure(&HarvestError::Io(full), None).code, "DISK_FULL");

        let other = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let info = classify_failure(&HarvestError::Io(other), None);
        assert_eq!(info.code, "FILE_SYSTEM_ERROR");
        assert_eq!(info.kind, ErrorKind::PermissionError);
    }

    #[test]
    fn test_decode_is_retryable_parsing_error() {
        let info = classify_failure(
            &HarvestError::Decode {
                url: url(),
                message: "invalid utf-8".to_string(),
            },
            Some(200),
        );
        assert_eq!(info.kind, ErrorKind::ParsingError);
        assert!(info.retryable);
    }
}
