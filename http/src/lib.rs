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

//! Blocking HTTP stack for odata-bridge.
//!
//! [`ReqwestTransport`] implements the core
//! [`HttpTransport`](odata_bridge_core::HttpTransport) trait on top of
//! `reqwest::blocking` with retries and backoff; [`HttpCache`] and
//! [`CachingHttpClient`] add fingerprint-keyed response caching with a
//! background sweeper; [`AuthResolver`] turns secrets or call-site overrides
//! into per-request auth headers, going through the OAuth2
//! [`CredentialManager`] for token-based secret kinds.

/// Auth parameter resolution.
pub mod auth;

/// Response cache and caching client wrapper.
pub mod cache;

/// OAuth2 token lifecycle.
pub mod oauth2;

/// reqwest-based transport with retries.
pub mod transport;

#[doc(inline)]
pub use auth::AuthResolver;
#[doc(inline)]
pub use cache::CachingHttpClient;
#[doc(inline)]
pub use cache::HttpCache;
#[doc(inline)]
pub use oauth2::CredentialManager;
#[doc(inline)]
pub use transport::HttpParams;
#[doc(inline)]
pub use transport::ReqwestTransport;
