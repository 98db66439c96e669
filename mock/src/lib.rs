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

//! Scripted [`HttpTransport`] for tests.
//!
//! Routes are registered per URL (full URL or path-plus-query); each route
//! holds a queue of canned responses, consumed in order with the last one
//! repeating. Unrouted requests answer 404, which conveniently exercises
//! the metadata-discovery fallbacks. Every request is recorded for
//! assertions on URLs and headers.

use odata_bridge_core::HeaderMap;
use odata_bridge_core::HttpRequest;
use odata_bridge_core::HttpResponse;
use odata_bridge_core::HttpTransport;
use odata_bridge_core::Result;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A canned response body with status, content type, and extra headers.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CannedResponse {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "application/json".to_string(),
            headers: Vec::new(),
            body: body.into().into_bytes(),
        }
    }

    pub fn xml(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "application/xml".to_string(),
            headers: Vec::new(),
            body: body.into().into_bytes(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            headers: Vec::new(),
            body: body.into().into_bytes(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Scripted transport with a request log.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<CannedResponse>>>,
    log: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for a URL. Repeated registrations for the same
    /// URL queue up and are served in order; the last response repeats.
    pub fn on(&self, url: impl Into<String>, response: CannedResponse) {
        let mut routes = self.routes.lock().expect("mock routes poisoned");
        routes.entry(url.into()).or_default().push_back(response);
    }

    /// Shorthand for a 200 `application/json` response.
    pub fn on_json(&self, url: impl Into<String>, body: impl Into<String>) {
        self.on(url, CannedResponse::json(body));
    }

    /// Shorthand for a 200 `application/xml` response.
    pub fn on_xml(&self, url: impl Into<String>, body: impl Into<String>) {
        self.on(url, CannedResponse::xml(body));
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().expect("mock log poisoned").clone()
    }

    /// URLs of all requests seen so far.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| request.url.to_string())
            .collect()
    }

    fn route_for(&self, request: &HttpRequest) -> Option<CannedResponse> {
        let mut routes = self.routes.lock().expect("mock routes poisoned");
        let full = request.url.to_string();
        let key = if routes.contains_key(&full) {
            full
        } else {
            request.url.path_query()
        };
        let queue = routes.get_mut(&key)?;

        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.log
            .lock()
            .expect("mock log poisoned")
            .push(request.clone());

        let canned = self.route_for(request).unwrap_or_else(|| CannedResponse {
            status: 404,
            content_type: "text/plain".to_string(),
            headers: Vec::new(),
            body: b"no route registered".to_vec(),
        });

        let mut headers = HeaderMap::new();
        headers.append("Content-Type", canned.content_type.clone());
        for (name, value) in &canned.headers {
            headers.append(name, value);
        }

        Ok(HttpResponse {
            method: request.method,
            url: request.url.clone(),
            status: canned.status,
            content_type: canned.content_type,
            headers,
            body: canned.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odata_bridge_core::HttpMethod;
    use odata_bridge_core::HttpUrl;

    fn get(url: &str) -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, HttpUrl::parse(url).unwrap())
    }

    #[test]
    fn routes_match_full_urls_and_path_query() {
        let mock = MockTransport::new();
        mock.on_json("https://host/svc/People", r#"{"value":[]}"#);
        mock.on_json("/other?x=1", r#"{"value":[1]}"#);

        assert_eq!(
            mock.send(&get("https://host/svc/People")).unwrap().status,
            200
        );
        assert_eq!(mock.send(&get("https://host/other?x=1")).unwrap().status, 200);
    }

    #[test]
    fn unrouted_requests_answer_404() {
        let mock = MockTransport::new();
        let response = mock.send(&get("https://host/nope")).unwrap();
        assert_eq!(response.status, 404);
    }

    #[test]
    fn queued_responses_are_served_in_order_and_the_last_repeats() {
        let mock = MockTransport::new();
        mock.on("https://host/x", CannedResponse::json("1"));
        mock.on("https://host/x", CannedResponse::json("2"));

        assert_eq!(mock.send(&get("https://host/x")).unwrap().body, b"1");
        assert_eq!(mock.send(&get("https://host/x")).unwrap().body, b"2");
        assert_eq!(mock.send(&get("https://host/x")).unwrap().body, b"2");
    }

    #[test]
    fn the_request_log_records_urls() {
        let mock = MockTransport::new();
        mock.on_json("https://host/a", "{}");
        mock.send(&get("https://host/a")).unwrap();
        assert_eq!(mock.requested_urls(), vec!["https://host/a".to_string()]);
    }
}
