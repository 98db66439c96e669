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

use std::error::Error as StdError;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

/// How much of a response body an [`Error::Http`] keeps.
const BODY_PREVIEW_CAP: usize = 1024;

/// Errors surfaced by the odata-bridge stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Misuse at bind time: missing parameters, malformed URLs, invalid
    /// secrets, non-ODP URLs handed to the ODP surface.
    InvalidInput(String),
    /// Transport failure after retries were exhausted.
    Io(String),
    /// HTTP status outside 2xx after retries were exhausted. Carries the
    /// status and a capped body preview.
    Http { status: u16, body: String },
    /// EDM XML or OData JSON failed to parse or validate.
    Parse(String),
    /// A type reference in a metadata document did not bind.
    UnresolvedType(String),
    /// An EDM primitive with no table-type counterpart.
    UnsupportedPrimitive(String),
    /// A filter variant that cannot be translated to OData query options.
    /// Raised only for structural misuse; translatable-but-rejected filters
    /// are dropped and logged instead.
    UnsupportedFilter(String),
    /// OAuth2 token acquisition or refresh failed.
    Auth(String),
    /// A subscription operation violated the repository's invariants.
    StateConflict(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an [`Error::Http`] with the body preview capped.
    pub fn http(status: u16, body: impl AsRef<str>) -> Self {
        let body = body.as_ref();
        let mut end = body.len().min(BODY_PREVIEW_CAP);
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        Self::Http {
            status,
            body: body[..end].to_string(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Http { status, body } => {
                write!(f, "HTTP request failed with status {status}: {body}")
            }
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::UnresolvedType(name) => write!(f, "unresolved type: {name}"),
            Self::UnsupportedPrimitive(name) => write!(f, "unsupported primitive type: {name}"),
            Self::UnsupportedFilter(msg) => write!(f, "unsupported filter: {msg}"),
            Self::Auth(msg) => write!(f, "authentication error: {msg}"),
            Self::StateConflict(msg) => write!(f, "subscription state conflict: {msg}"),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_caps_body_preview() {
        let long = "x".repeat(4096);
        let err = Error::http(503, &long);
        match err {
            Error::Http { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body.len(), 1024);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn http_error_keeps_short_bodies() {
        let err = Error::http(404, "not found");
        assert_eq!(
            err.to_string(),
            "HTTP request failed with status 404: not found"
        );
    }
}
