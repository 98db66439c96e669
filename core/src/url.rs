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

//! A lossless URL value.
//!
//! OData next links and `@odata.context` references arrive as anything from
//! full absolute URLs to bare `EntitySet?$skiptoken=...` fragments, and the
//! pushdown planner rewrites query strings in place. General-purpose URL
//! types normalize too aggressively for that, so this is a plain
//! seven-component value: what was parsed is what [`Display`] prints.

use crate::error::Error;
use crate::error::Result;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

/// Scheme, userinfo, host, port, path, query, and fragment of a URL.
///
/// `query` and `fragment` are stored without their `?`/`#` markers. Equality
/// treats scheme and host case-insensitively; everything else is exact.
#[derive(Debug, Clone, Default)]
pub struct HttpUrl {
    scheme: String,
    username: String,
    password: String,
    host: String,
    port: String,
    path: String,
    query: String,
    fragment: String,
}

impl HttpUrl {
    /// Parse a URL or a bare path-query-fragment reference.
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` when an authority is present but empty, or the
    /// scheme is malformed.
    pub fn parse(input: &str) -> Result<Self> {
        let mut url = Self::default();
        let mut rest = input;

        if let Some(pos) = rest.find('#') {
            url.fragment = rest[pos + 1..].to_string();
            rest = &rest[..pos];
        }
        if let Some(pos) = rest.find('?') {
            url.query = rest[pos + 1..].to_string();
            rest = &rest[..pos];
        }

        if let Some(pos) = rest.find("://") {
            let scheme = &rest[..pos];
            if scheme.is_empty() || !is_valid_scheme(scheme) {
                return Err(Error::invalid_input(format!(
                    "malformed URL scheme in '{input}'"
                )));
            }
            url.scheme = scheme.to_string();
            rest = &rest[pos + 3..];

            let (authority, path) = match rest.find('/') {
                Some(slash) => (&rest[..slash], &rest[slash..]),
                None => (rest, ""),
            };

            let host_port = match authority.rfind('@') {
                Some(at) => {
                    let userinfo = &authority[..at];
                    match userinfo.split_once(':') {
                        Some((user, pass)) => {
                            url.username = user.to_string();
                            url.password = pass.to_string();
                        }
                        None => url.username = userinfo.to_string(),
                    }
                    &authority[at + 1..]
                }
                None => authority,
            };

            match host_port.rsplit_once(':') {
                Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                    url.host = host.to_string();
                    url.port = port.to_string();
                }
                _ => url.host = host_port.to_string(),
            }

            if url.host.is_empty() {
                return Err(Error::invalid_input(format!("URL '{input}' has no host")));
            }
            url.path = path.to_string();
        } else {
            // No scheme: a bare path reference (next links are often these).
            url.path = rest.to_string();
        }

        Ok(url)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query string without the leading `?`.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn set_fragment(&mut self, fragment: impl Into<String>) {
        self.fragment = fragment.into();
    }

    /// `scheme://host[:port]`.
    pub fn scheme_host_port(&self) -> String {
        if self.port.is_empty() {
            format!("{}://{}", self.scheme, self.host)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        }
    }

    /// Path (defaulting to `/`) plus the query string.
    pub fn path_query(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        if self.query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", self.query)
        }
    }

    /// The final path segment, with any trailing slash stripped first.
    pub fn last_path_segment(&self) -> &str {
        let path = self.path.trim_end_matches('/');
        match path.rfind('/') {
            Some(pos) => &path[pos + 1..],
            None => path,
        }
    }

    /// A copy with the last path segment removed.
    pub fn pop_path(&self) -> Self {
        let mut popped = self.clone();
        let path = self.path.trim_end_matches('/');
        popped.path = match path.rfind('/') {
            Some(0) | None => String::new(),
            Some(pos) => path[..pos].to_string(),
        };
        popped
    }

    /// Resolve `reference` against `base`.
    ///
    /// A reference carrying a scheme is returned as-is. Otherwise the base's
    /// scheme, authority, host, and port are kept; a leading `/` resets the
    /// path to the base root, a bare path appends to the full base path with
    /// any overlapping boundary segments deduplicated (so a next link
    /// `People?$skiptoken=X` on `.../Svc/People` stays at the entity set,
    /// while a service-document ref `People` on `.../Svc` lands under it),
    /// and a non-empty query or fragment replaces the base's.
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` when an absolute reference fails to parse.
    pub fn merge_with_base_if_relative(base: &Self, reference: &str) -> Result<Self> {
        if reference.is_empty() {
            return Ok(base.clone());
        }
        if reference.contains("://") {
            return Self::parse(reference);
        }

        let parsed = Self::parse(reference)?;
        let mut merged = base.clone();

        if !parsed.path.is_empty() {
            if parsed.path.starts_with('/') {
                merged.path = normalize_path(&parsed.path);
            } else {
                merged.path = merge_paths(&base.path, &parsed.path);
            }
        }
        if !parsed.query.is_empty() {
            merged.query = parsed.query;
        }
        if !parsed.fragment.is_empty() {
            merged.fragment = parsed.fragment;
        }

        Ok(merged)
    }
}

impl Display for HttpUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if !self.scheme.is_empty() {
            write!(f, "{}://", self.scheme)?;
            if !self.username.is_empty() {
                write!(f, "{}", self.username)?;
                if !self.password.is_empty() {
                    write!(f, ":{}", self.password)?;
                }
                write!(f, "@")?;
            }
            write!(f, "{}", self.host)?;
            if !self.port.is_empty() {
                write!(f, ":{}", self.port)?;
            }
        }
        write!(f, "{}", self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

impl PartialEq for HttpUrl {
    fn eq(&self, other: &Self) -> bool {
        self.scheme.eq_ignore_ascii_case(&other.scheme)
            && self.host.eq_ignore_ascii_case(&other.host)
            && self.username == other.username
            && self.password == other.password
            && self.port == other.port
            && self.path == other.path
            && self.query == other.query
            && self.fragment == other.fragment
    }
}

impl Eq for HttpUrl {}

impl std::str::FromStr for HttpUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Append `rel` to `base`, dropping the longest run of segments that ends
/// `base` and begins `rel` (a relative next link usually repeats the entity
/// set segment).
fn merge_paths(base: &str, rel: &str) -> String {
    let base_segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    let rel_segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();

    let max_overlap = base_segments.len().min(rel_segments.len());
    let overlap = (0..=max_overlap)
        .rev()
        .find(|&k| base_segments[base_segments.len() - k..] == rel_segments[..k])
        .unwrap_or(0);

    let joined: Vec<&str> = base_segments
        .iter()
        .chain(rel_segments[overlap..].iter())
        .copied()
        .collect();
    normalize_path(&format!("/{}", joined.join("/")))
}

/// Collapse `.` and `..` segments. Keeps a leading slash when present.
fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_components() {
        let url =
            HttpUrl::parse("https://user:pw@services.odata.org:8443/V4/TripPin/People?$top=5#frag")
                .unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.username(), "user");
        assert_eq!(url.password(), "pw");
        assert_eq!(url.host(), "services.odata.org");
        assert_eq!(url.port(), "8443");
        assert_eq!(url.path(), "/V4/TripPin/People");
        assert_eq!(url.query(), "$top=5");
        assert_eq!(url.fragment(), "frag");
    }

    #[test]
    fn round_trips_through_display() {
        for input in [
            "https://services.odata.org/V4/TripPin/People",
            "http://host:1234/a/b?x=1&y=2",
            "https://u:p@host/path#frag",
            "https://host/path?$filter=Age%20ge%2040",
        ] {
            let url = HttpUrl::parse(input).unwrap();
            assert_eq!(url.to_string(), input);
            assert_eq!(HttpUrl::parse(&url.to_string()).unwrap(), url);
        }
    }

    #[test]
    fn equality_ignores_scheme_and_host_case() {
        let a = HttpUrl::parse("HTTPS://Services.OData.org/People").unwrap();
        let b = HttpUrl::parse("https://services.odata.org/People").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_host() {
        assert!(HttpUrl::parse("https:///path").is_err());
    }

    #[test]
    fn merge_keeps_absolute_references() {
        let base = HttpUrl::parse("https://a.example/svc/People").unwrap();
        let merged =
            HttpUrl::merge_with_base_if_relative(&base, "https://b.example/other").unwrap();
        assert_eq!(merged.to_string(), "https://b.example/other");
    }

    #[test]
    fn merge_resolves_sibling_references() {
        let base = HttpUrl::parse("https://services.odata.org/TripPin/People").unwrap();
        let merged =
            HttpUrl::merge_with_base_if_relative(&base, "People?$skiptoken=XYZ").unwrap();
        assert_eq!(merged.host(), "services.odata.org");
        assert_eq!(merged.path(), "/TripPin/People");
        assert_eq!(merged.query(), "$skiptoken=XYZ");
    }

    #[test]
    fn merge_leading_slash_resets_to_root() {
        let base = HttpUrl::parse("https://host/a/b/c").unwrap();
        let merged = HttpUrl::merge_with_base_if_relative(&base, "/x/y?q=1").unwrap();
        assert_eq!(merged.to_string(), "https://host/x/y?q=1");
    }

    #[test]
    fn merge_keeps_base_query_when_reference_has_none() {
        let base = HttpUrl::parse("https://host/svc?$format=json").unwrap();
        let merged = HttpUrl::merge_with_base_if_relative(&base, "#part").unwrap();
        assert_eq!(merged.query(), "$format=json");
        assert_eq!(merged.fragment(), "part");
    }

    #[test]
    fn merge_collapses_dot_segments() {
        let base = HttpUrl::parse("https://host/svc/sub/Entity").unwrap();
        let merged = HttpUrl::merge_with_base_if_relative(&base, "../Other").unwrap();
        assert_eq!(merged.path(), "/svc/sub/Other");
    }

    #[test]
    fn merge_appends_service_document_refs() {
        let base = HttpUrl::parse("https://services.odata.org/TripPinRESTierService").unwrap();
        let merged = HttpUrl::merge_with_base_if_relative(&base, "People").unwrap();
        assert_eq!(merged.path(), "/TripPinRESTierService/People");
    }

    #[test]
    fn pop_path_drops_last_segment() {
        let url = HttpUrl::parse("https://host/a/b/c").unwrap();
        assert_eq!(url.pop_path().path(), "/a/b");
        assert_eq!(url.pop_path().pop_path().path(), "/a");
        assert_eq!(url.pop_path().pop_path().pop_path().path(), "");
    }

    #[test]
    fn last_path_segment_ignores_trailing_slash() {
        let url = HttpUrl::parse("https://host/svc/People/").unwrap();
        assert_eq!(url.last_path_segment(), "People");
    }
}
