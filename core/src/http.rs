// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP wire model: methods, headers, requests, responses, auth parameters.

use crate::charset;
use crate::error::Error;
use crate::error::Result;
use crate::url::HttpUrl;
use crate::value::TableType;
use crate::value::TableValue;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::hash_map::DefaultHasher;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::hash::Hash;
use std::hash::Hasher;

/// Sentinel prefixed to base64-encoded binary payloads in the row
/// representation, so consumers need not probe content for UTF-8 validity.
/// This prefix is a stable interface.
pub const BINARY_CONTENT_SENTINEL: &str = "BINARY_CONTENT_BASE64:";

/// OData protocol version. Detected from metadata or payload shape and
/// stamped onto requests so the right protocol headers go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ODataVersion {
    V2,
    V4,
}

impl Display for ODataVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::V2 => "V2".fmt(f),
            Self::V4 => "V4".fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        self.as_str().fmt(f)
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "TRACE" => Ok(Self::Trace),
            "CONNECT" => Ok(Self::Connect),
            other => Err(Error::invalid_input(format!("invalid HTTP method: '{other}'"))),
        }
    }
}

/// Insertion-ordered, case-insensitive multi-value header map.
///
/// Lookup folds ASCII case; iteration and the row representation preserve
/// the order headers were added in.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace all values for `name` with a single value. Keeps the position
    /// of the first occurrence when the header was already present.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let mut kept = false;
        self.entries.retain_mut(|(n, v)| {
            if n.eq_ignore_ascii_case(name) {
                if kept {
                    return false;
                }
                *v = value.clone();
                kept = true;
            }
            true
        });
        if !kept {
            self.entries.push((name.to_string(), value));
        }
    }

    /// First value for `name`, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Authentication parameters attached to outgoing requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthParams {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
}

impl AuthParams {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// `base64(username:password)` for Basic auth, if applicable.
    pub fn basic_credentials_base64(&self) -> Option<String> {
        match self {
            Self::Basic { username, password } => {
                Some(BASE64.encode(format!("{username}:{password}")))
            }
            _ => None,
        }
    }
}

impl Display for AuthParams {
    /// Credentials render as stars; safe for logs.
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::None => "None".fmt(f),
            Self::Basic { username, password } => {
                write!(f, "Basic:{}", "*".repeat(username.len() + password.len() + 1))
            }
            Self::Bearer { token } => write!(f, "Bearer:{}", "*".repeat(token.len())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: HttpUrl,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub content_type: String,
    pub odata_version: Option<ODataVersion>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: HttpUrl) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Vec::new(),
            content_type: "application/json".to_string(),
            odata_version: None,
        }
    }

    pub fn with_body(
        method: HttpMethod,
        url: HttpUrl,
        content_type: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: body.into(),
            content_type: content_type.into(),
            odata_version: None,
        }
    }

    /// Cache fingerprint: method, full URL, and a hash of the body.
    pub fn cache_key(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.body.hash(&mut hasher);
        format!("{}:{}:{}", self.method, self.url, hasher.finish())
    }

    /// Inject the `Authorization` header for the given parameters.
    pub fn apply_auth(&mut self, auth: &AuthParams) {
        match auth {
            AuthParams::None => {}
            AuthParams::Basic { .. } => {
                let encoded = auth
                    .basic_credentials_base64()
                    .unwrap_or_default();
                self.headers.set("Authorization", format!("Basic {encoded}"));
            }
            AuthParams::Bearer { token } => {
                self.headers.set("Authorization", format!("Bearer {token}"));
            }
        }
    }

    pub fn set_odata_version(&mut self, version: ODataVersion) {
        self.odata_version = Some(version);
    }

    /// Add the protocol headers for the request's OData version. Defaults to
    /// v4 headers when no version was stamped.
    pub fn add_odata_version_headers(&mut self) {
        match self.odata_version {
            Some(ODataVersion::V2) => {
                self.headers.set("DataServiceVersion", "2.0");
                self.headers.set("MaxDataServiceVersion", "2.0");
                self.headers.set("Accept", "application/json;odata=verbose");
            }
            _ => {
                self.headers.set("OData-Version", "4.0");
                self.headers.set("OData-MaxVersion", "4.0");
                self.headers
                    .set("Accept", "application/json;odata.metadata=minimal");
            }
        }
    }

    /// Header pairs with credential values replaced by stars, for logging.
    pub fn sanitized_headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case("authorization")
                    || name.eq_ignore_ascii_case("proxy-authorization")
                    || name.eq_ignore_ascii_case("cookie")
                {
                    (name.to_string(), "*".repeat(value.len()))
                } else {
                    (name.to_string(), value.to_string())
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub method: HttpMethod,
    pub url: HttpUrl,
    pub status: u16,
    pub content_type: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded to UTF-8 through the declared charset.
    pub fn text(&self) -> Result<String> {
        charset::decode(&self.content_type, &self.body)
    }

    /// Body length capped preview for logs, lossily decoded.
    pub fn body_preview(&self) -> String {
        const CAP: usize = 1024;
        let text = String::from_utf8_lossy(&self.body);
        if text.len() <= CAP {
            text.into_owned()
        } else {
            let mut end = CAP;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &text[..end])
        }
    }

    /// Column names of the row representation.
    pub fn row_names() -> Vec<String> {
        ["method", "status", "url", "headers", "content_type", "content"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Column types of the row representation.
    pub fn row_types() -> Vec<TableType> {
        vec![
            TableType::Text,
            TableType::Int32,
            TableType::Text,
            TableType::Struct(vec![]),
            TableType::Text,
            TableType::Text,
        ]
    }

    /// The row representation: method, status, url, headers as an ordered
    /// name→value struct, content type, and content. Binary content types
    /// are base64-encoded behind [`BINARY_CONTENT_SENTINEL`].
    pub fn to_row(&self) -> Vec<TableValue> {
        let content = if charset::is_binary_content_type(&self.content_type) {
            format!("{BINARY_CONTENT_SENTINEL}{}", BASE64.encode(&self.body))
        } else {
            self.text().unwrap_or_else(|_| String::from_utf8_lossy(&self.body).into_owned())
        };

        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), TableValue::Text(value.to_string())))
            .collect();

        vec![
            TableValue::Text(self.method.to_string()),
            TableValue::Int32(i32::from(self.status)),
            TableValue::Text(self.url.to_string()),
            TableValue::Struct(headers),
            TableValue::Text(self.content_type.clone()),
            TableValue::Text(content),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> HttpUrl {
        HttpUrl::parse(s).unwrap()
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.append("Content-Type", "application/json");
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.get("accept"), None);
    }

    #[test]
    fn header_set_collapses_values_in_place() {
        let mut headers = HeaderMap::new();
        headers.append("Accept", "a");
        headers.append("X-Other", "o");
        headers.append("accept", "b");
        headers.set("Accept", "c");
        let entries: Vec<_> = headers.iter().collect();
        assert_eq!(entries, vec![("Accept", "c"), ("X-Other", "o")]);
    }

    #[test]
    fn cache_key_is_stable() {
        let a = HttpRequest::with_body(HttpMethod::Post, url("https://h/x"), "text/plain", "body");
        let b = HttpRequest::with_body(HttpMethod::Post, url("https://h/x"), "text/plain", "body");
        assert_eq!(a.cache_key(), b.cache_key());

        let c = HttpRequest::with_body(HttpMethod::Post, url("https://h/x"), "text/plain", "other");
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn basic_auth_round_trips_through_base64() {
        use base64::engine::general_purpose::STANDARD;
        let auth = AuthParams::basic("user", "secret");
        let encoded = auth.basic_credentials_base64().unwrap();
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(decoded, b"user:secret");
    }

    #[test]
    fn auth_display_redacts_credentials() {
        let auth = AuthParams::bearer("tok123");
        assert_eq!(auth.to_string(), "Bearer:******");
    }

    #[test]
    fn v2_version_headers() {
        let mut req = HttpRequest::new(HttpMethod::Get, url("https://h/People"));
        req.set_odata_version(ODataVersion::V2);
        req.add_odata_version_headers();
        assert_eq!(req.headers.get("DataServiceVersion"), Some("2.0"));
        assert_eq!(req.headers.get("Accept"), Some("application/json;odata=verbose"));
    }

    #[test]
    fn v4_version_headers_are_the_default() {
        let mut req = HttpRequest::new(HttpMethod::Get, url("https://h/People"));
        req.add_odata_version_headers();
        assert_eq!(req.headers.get("OData-Version"), Some("4.0"));
        assert_eq!(
            req.headers.get("Accept"),
            Some("application/json;odata.metadata=minimal")
        );
    }

    #[test]
    fn binary_response_rows_carry_the_sentinel() {
        let response = HttpResponse {
            method: HttpMethod::Get,
            url: url("https://h/file"),
            status: 200,
            content_type: "application/pdf".to_string(),
            headers: HeaderMap::new(),
            body: vec![0x25, 0x50, 0x44, 0x46],
        };
        let row = response.to_row();
        match &row[5] {
            TableValue::Text(content) => {
                assert!(content.starts_with(BINARY_CONTENT_SENTINEL));
            }
            other => panic!("unexpected content value: {other:?}"),
        }
    }

    #[test]
    fn sanitized_headers_star_out_authorization() {
        let mut req = HttpRequest::new(HttpMethod::Get, url("https://h/x"));
        req.apply_auth(&AuthParams::bearer("secret"));
        let sanitized = req.sanitized_headers();
        assert_eq!(sanitized.len(), 1);
        assert!(sanitized[0].1.chars().all(|c| c == '*'));
    }
}
