//! Authentication blocks and row-over-global precedence
//!
//! Bulk rows and saved jobs carry credentials as raw strings: a cookie
//! string, a JSON object of headers, or a basic-auth pair, selected by an
//! explicit method. [`AuthBlock::to_auth_config`] turns one block into the
//! [`AuthConfig`] the fetcher consumes.

use crate::crawler::{AuthConfig, BasicAuth};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which field of an [`AuthBlock`] is used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    #[default]
    Cookies,
    Headers,
    Basic,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cookies => "cookies",
            Self::Headers => "headers",
            Self::Basic => "basic",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "cookies" | "cookie" => Ok(Self::Cookies),
            "headers" | "header" => Ok(Self::Headers),
            "basic" => Ok(Self::Basic),
            other => Err(format!(
                "invalid auth type '{}' (expected cookies, headers or basic)",
                other
            )),
        }
    }
}

/// Credentials as supplied by a CSV row, a bulk request or a saved job
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthBlock {
    #[serde(default, alias = "auth_method", alias = "auth_type")]
    pub method: AuthMethod,
    /// `k=v; k2=v2` or a JSON object
    #[serde(default)]
    pub cookies: Option<String>,
    /// JSON object of header names to values
    #[serde(default)]
    pub auth_headers: Option<String>,
    #[serde(default)]
    pub basic_auth_username: Option<String>,
    #[serde(default)]
    pub basic_auth_password: Option<String>,
}

impl fmt::Debug for AuthBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "***");
        f.debug_struct("AuthBlock")
            .field("method", &self.method)
            .field("cookies", &redact(&self.cookies))
            .field("auth_headers", &redact(&self.auth_headers))
            .field("basic_auth_username", &self.basic_auth_username)
            .field("basic_auth_password", &redact(&self.basic_auth_password))
            .finish()
    }
}

impl AuthBlock {
    /// Cookie-string block
    pub fn cookies(cookies: impl Into<String>) -> Self {
        Self {
            method: AuthMethod::Cookies,
            cookies: Some(cookies.into()),
            ..Self::default()
        }
    }

    /// JSON-headers block
    pub fn headers(json: impl Into<String>) -> Self {
        Self {
            method: AuthMethod::Headers,
            auth_headers: Some(json.into()),
            ..Self::default()
        }
    }

    /// Basic-auth block
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            method: AuthMethod::Basic,
            basic_auth_username: Some(username.into()),
            basic_auth_password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Builds the fetcher credentials for this block's method
    ///
    /// Only the field selected by `method` is read. Malformed header JSON
    /// is logged and ignored; a basic pair with a blank side is ignored.
    pub fn to_auth_config(&self) -> AuthConfig {
        let mut config = AuthConfig::default();

        match self.method {
            AuthMethod::Cookies => {
                if let Some(cookies) = non_blank(&self.cookies) {
                    config.cookies = parse_cookie_string(cookies);
                }
            }
            AuthMethod::Headers => {
                if let Some(json) = non_blank(&self.auth_headers) {
                    match parse_header_json(json) {
                        Ok(headers) => config.headers = headers,
                        Err(e) => tracing::warn!("Ignoring malformed auth headers: {}", e),
                    }
                }
            }
            AuthMethod::Basic => {
                if let (Some(username), Some(password)) = (
                    non_blank(&self.basic_auth_username),
                    non_blank(&self.basic_auth_password),
                ) {
                    config.basic = Some(BasicAuth {
                        username: username.to_string(),
                        password: password.to_string(),
                    });
                }
            }
        }

        config
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Renders a JSON value as a header or cookie value
fn json_scalar(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Parses a cookie string
///
/// Accepts a JSON object (`{"session": "abc"}`) or the browser form
/// `key1=value1; key2=value2`. Pairs without `=` are skipped.
///
/// # Examples
///
/// ```
/// use sumi_harvest::bulk::parse_cookie_string;
///
/// let cookies = parse_cookie_string("session=abc; theme=dark");
/// assert_eq!(cookies["session"], "abc");
/// assert_eq!(cookies["theme"], "dark");
/// ```
pub fn parse_cookie_string(input: &str) -> BTreeMap<String, String> {
    let trimmed = input.trim();

    if trimmed.starts_with('{') {
        if let Ok(map) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(trimmed) {
            return map
                .into_iter()
                .map(|(key, value)| (key, json_scalar(value)))
                .collect();
        }
    }

    trimmed
        .split(';')
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Parses a JSON object of header names to values
pub fn parse_header_json(input: &str) -> Result<BTreeMap<String, String>, serde_json::Error> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(input)?;
    Ok(map
        .into_iter()
        .map(|(key, value)| (key, json_scalar(value)))
        .collect())
}

/// Picks the credentials for one bulk row
///
/// A row's own enabled block is used in full, even when it yields no
/// credentials; otherwise the batch-wide block applies.
pub fn resolve_auth(row: Option<&AuthBlock>, global: Option<&AuthBlock>) -> AuthConfig {
    row.or(global)
        .map(AuthBlock::to_auth_config)
        .unwrap_or_default()
}
