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

//! Core model shared by the odata-bridge crates.
//!
//! This crate holds everything the other layers agree on without pulling in
//! a concrete HTTP stack:
//!
//! - [`HttpUrl`]: a lossless seven-component URL value with the relative
//!   merge rules OData next links depend on
//! - [`HttpRequest`] / [`HttpResponse`] / [`HeaderMap`]: the wire model the
//!   transport trait moves around
//! - [`HttpTransport`]: the blocking transport seam; implemented by the
//!   `odata-bridge-http` crate and scripted by `odata-bridge-mock` in tests
//! - [`TableType`] / [`TableValue`] / [`DataChunk`]: the typed row model a
//!   host engine consumes
//! - [`KeyValueSecret`] / [`SecretStore`]: the credential contract a host
//!   fulfils
//! - [`Error`]: the one error enum every layer speaks

/// Character set decoding for HTTP payloads.
pub mod charset;

/// The error enum shared across the workspace.
pub mod error;

/// HTTP request/response model, header map, auth parameters.
pub mod http;

/// Key/value secret contract.
pub mod secret;

/// Tracing subscriber setup.
pub mod trace;

/// Blocking HTTP transport trait.
pub mod transport;

/// Lossless URL value and parser.
pub mod url;

/// Table types, table values, and output chunks.
pub mod value;

#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use http::{AuthParams, HeaderMap, HttpMethod, HttpRequest, HttpResponse, ODataVersion};
#[doc(inline)]
pub use secret::{KeyValueSecret, MemorySecretStore, SecretStore};
#[doc(inline)]
pub use transport::HttpTransport;
#[doc(inline)]
pub use url::HttpUrl;
#[doc(inline)]
pub use value::{DataChunk, TableType, TableValue};
