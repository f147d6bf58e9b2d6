//! Most of the structs in `web` module and their implementations live here.
//! Includes structs that need to be validated, their parsing implementations and tests for those

use axum::http::{header, HeaderMap, Uri};
use lazy_regex::regex_is_match;
use serde_json::Value;

pub const WORDMARK_PATH: &str = "wordmark.svg";

// ###################################
// ->   STRUCTS
// ###################################
/// Validated Subscriber Email
///
/// Exactly one `@`, no whitespace anywhere and at least one `.` after the `@`.
/// Whitespace is the ECMAScript set, so U+FEFF counts and U+0085 does not.
/// Anything else the pattern lets through (consecutive dots, trailing dots, ...) is accepted as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidEmail(String);

impl AsRef<str> for ValidEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ValidEmail {
    pub fn parse<S>(value: S) -> Result<Self, DataParsingError>
    where
        S: AsRef<str>,
    {
        let value = value.as_ref();

        // `[^\s@]+@[^\s@]+\.[^\s@]+` with the ECMAScript whitespace set spelled out.
        // The Unicode `\s` differs: it has U+0085 and lacks U+FEFF.
        if regex_is_match!(
            r"^[^\t\n\x0B\x0C\r \x{A0}\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}\x{FEFF}@]+@[^\t\n\x0B\x0C\r \x{A0}\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}\x{FEFF}@]+\.[^\t\n\x0B\x0C\r \x{A0}\x{1680}\x{2000}-\x{200A}\x{2028}\x{2029}\x{202F}\x{205F}\x{3000}\x{FEFF}@]+$",
            value
        ) {
            Ok(ValidEmail(value.to_owned()))
        } else {
            Err(DataParsingError::EmailInvalid)
        }
    }
}

/// Reads the `email` field out of a subscribe request body.
/// Missing fields, non-string values and empty strings are all treated as "no email".
pub fn email_field(body: &Value) -> Result<&str, DataParsingError> {
    match body.get("email").and_then(Value::as_str) {
        Some(email) if !email.is_empty() => Ok(email),
        _ => Err(DataParsingError::EmailMissing),
    }
}

/// Scheme and host the request was addressed to, used to build absolute links back to the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    /// With `trust_forwarded` set, proxy headers win over the `Host` header,
    /// which wins over the request URI. Without it the proxy headers are ignored.
    /// Returns `None` if no host can be determined.
    pub fn from_request(headers: &HeaderMap, uri: &Uri, trust_forwarded: bool) -> Option<Self> {
        let forwarded = |name| {
            trust_forwarded
                .then(|| first_header_value(headers, name))
                .flatten()
        };

        let host = forwarded("x-forwarded-host")
            .or_else(|| first_header_value(headers, header::HOST.as_str()))
            .or_else(|| uri.authority().map(|auth| auth.as_str()))?
            .to_string();
        let scheme = forwarded("x-forwarded-proto")
            .or_else(|| uri.scheme_str())
            .unwrap_or("http")
            .to_ascii_lowercase();

        Some(Self { scheme, host })
    }

    pub fn asset_url(&self, asset_path: &str) -> String {
        format!("{}://{}/{asset_path}", self.scheme, self.host)
    }
}

/// Proxies may append to forwarding headers, the first entry is the client facing one.
fn first_header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.split(',').next())
        .map(str::trim)
        .filter(|val| !val.is_empty())
}

// ###################################
// ->   ERROR
// ###################################
#[derive(Debug, thiserror::Error)]
pub enum DataParsingError {
    #[error("email missing")]
    EmailMissing,
    #[error("email invalid")]
    EmailInvalid,
}
