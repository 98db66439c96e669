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

//! Generic HTTP row functions: `http_get`, `http_head`, `http_post`,
//! `http_put`, `http_patch`, `http_delete`.
//!
//! Each call produces one row, {method, status, url, headers,
//! content_type, content}, via the core response row representation.
//! Options cover extra headers, content type, accept, auth overrides, and a
//! per-call timeout (which runs the request on a dedicated transport).

use crate::client::ClientContext;
use odata_bridge_core::HttpMethod;
use odata_bridge_core::HttpRequest;
use odata_bridge_core::HttpTransport;
use odata_bridge_core::HttpUrl;
use odata_bridge_core::Result;
use odata_bridge_core::TableType;
use odata_bridge_core::TableValue;
use odata_bridge_http::auth::auth_from_override;
use odata_bridge_http::auth::AuthTypeOverride;
use odata_bridge_http::HttpParams;
use odata_bridge_http::ReqwestTransport;
use std::time::Duration;

/// Options shared by all HTTP row functions.
#[derive(Debug, Clone, Default)]
pub struct HttpCallOptions {
    /// Extra request headers, applied in order.
    pub headers: Vec<(String, String)>,
    /// Request body content type (bodied methods only).
    pub content_type: Option<String>,
    /// `Accept` header shorthand.
    pub accept: Option<String>,
    /// Call-site auth override (`user:pass` or a token).
    pub auth: Option<String>,
    /// Disambiguates the `auth` value.
    pub auth_type: Option<AuthTypeOverride>,
    /// Per-call timeout in seconds; runs on a dedicated transport.
    pub timeout: Option<u64>,
}

/// Column names of the one-row result.
pub fn response_row_names() -> Vec<String> {
    odata_bridge_core::HttpResponse::row_names()
}

/// Column types of the one-row result.
pub fn response_row_types() -> Vec<TableType> {
    odata_bridge_core::HttpResponse::row_types()
}

/// Perform one HTTP request and return its row representation.
pub fn http_request_row(
    context: &ClientContext,
    method: HttpMethod,
    url: &str,
    body: Option<Vec<u8>>,
    options: &HttpCallOptions,
) -> Result<Vec<TableValue>> {
    let parsed = HttpUrl::parse(url)?;
    let content_type = options
        .content_type
        .clone()
        .unwrap_or_else(|| "application/json".to_string());

    let mut request = match body {
        Some(body) => HttpRequest::with_body(method, parsed, content_type, body),
        None => HttpRequest::new(method, parsed),
    };

    for (name, value) in &options.headers {
        request.headers.set(name, value.clone());
        if name.eq_ignore_ascii_case("content-type") {
            request.content_type = value.clone();
        }
    }
    if let Some(accept) = &options.accept {
        request.headers.set("Accept", accept.clone());
    }
    if let Some(auth) = &options.auth {
        let params = auth_from_override(auth, options.auth_type)?;
        request.apply_auth(&params);
    }

    let response = match options.timeout {
        Some(seconds) => {
            let transport = ReqwestTransport::with_params(
                HttpParams::from_env().timeout(Duration::from_secs(seconds)),
            )?;
            transport.send(&request)?
        }
        None => context.transport.send(&request)?,
    };

    Ok(response.to_row())
}

/// `http_get(url)`.
pub fn http_get(
    context: &ClientContext,
    url: &str,
    options: &HttpCallOptions,
) -> Result<Vec<TableValue>> {
    http_request_row(context, HttpMethod::Get, url, None, options)
}

/// `http_head(url)`.
pub fn http_head(
    context: &ClientContext,
    url: &str,
    options: &HttpCallOptions,
) -> Result<Vec<TableValue>> {
    http_request_row(context, HttpMethod::Head, url, None, options)
}

/// `http_post(url, body [, content_type])`.
pub fn http_post(
    context: &ClientContext,
    url: &str,
    body: impl Into<Vec<u8>>,
    options: &HttpCallOptions,
) -> Result<Vec<TableValue>> {
    http_request_row(context, HttpMethod::Post, url, Some(body.into()), options)
}

/// `http_put(url, body [, content_type])`.
pub fn http_put(
    context: &ClientContext,
    url: &str,
    body: impl Into<Vec<u8>>,
    options: &HttpCallOptions,
) -> Result<Vec<TableValue>> {
    http_request_row(context, HttpMethod::Put, url, Some(body.into()), options)
}

/// `http_patch(url, body [, content_type])`.
pub fn http_patch(
    context: &ClientContext,
    url: &str,
    body: impl Into<Vec<u8>>,
    options: &HttpCallOptions,
) -> Result<Vec<TableValue>> {
    http_request_row(context, HttpMethod::Patch, url, Some(body.into()), options)
}

/// `http_delete(url)`.
pub fn http_delete(
    context: &ClientContext,
    url: &str,
    options: &HttpCallOptions,
) -> Result<Vec<TableValue>> {
    http_request_row(context, HttpMethod::Delete, url, None, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use odata_bridge_mock::MockTransport;
    use std::sync::Arc;

    #[test]
    fn get_produces_one_row() {
        let mock = Arc::new(MockTransport::new());
        mock.on_json("https://host/data", r#"{"ok":true}"#);
        let context = ClientContext::new(mock);

        let row = http_get(&context, "https://host/data", &HttpCallOptions::default()).unwrap();
        assert_eq!(row.len(), 6);
        assert_eq!(row[0], TableValue::Text("GET".to_string()));
        assert_eq!(row[1], TableValue::Int32(200));
        assert_eq!(row[5], TableValue::Text(r#"{"ok":true}"#.to_string()));
    }

    #[test]
    fn post_sends_body_and_headers() {
        let mock = Arc::new(MockTransport::new());
        mock.on_json("https://host/submit", "{}");
        let transport: Arc<dyn HttpTransport> = mock.clone();
        let context = ClientContext::new(transport);

        let options = HttpCallOptions {
            headers: vec![("X-Extra".to_string(), "1".to_string())],
            content_type: Some("text/plain".to_string()),
            auth: Some("user:pw".to_string()),
            ..Default::default()
        };
        http_post(&context, "https://host/submit", "payload", &options).unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body, b"payload");
        assert_eq!(request.content_type, "text/plain");
        assert_eq!(request.headers.get("X-Extra"), Some("1"));
        assert!(request
            .headers
            .get("Authorization")
            .unwrap()
            .starts_with("Basic "));
    }
}
