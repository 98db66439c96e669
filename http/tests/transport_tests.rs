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

//! Transport integration tests against a wiremock server. The transport is
//! blocking, so requests run inside `spawn_blocking` on a multi-threaded
//! runtime.

use odata_bridge_core::AuthParams;
use odata_bridge_core::Error;
use odata_bridge_core::HttpMethod;
use odata_bridge_core::HttpRequest;
use odata_bridge_core::HttpTransport;
use odata_bridge_core::HttpUrl;
use odata_bridge_http::HttpParams;
use odata_bridge_http::ReqwestTransport;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

async fn send_blocking(
    transport: ReqwestTransport,
    request: HttpRequest,
) -> Result<odata_bridge_core::HttpResponse, Error> {
    tokio::task::spawn_blocking(move || transport.send(&request))
        .await
        .expect("transport task panicked")
}

fn get_request(server: &MockServer, path: &str) -> HttpRequest {
    let url = HttpUrl::parse(&format!("{}{path}", server.uri())).unwrap();
    HttpRequest::new(HttpMethod::Get, url)
}

#[tokio::test(flavor = "multi_thread")]
async fn get_returns_body_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/svc/People"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"value":[]}"#, "application/json")
                .insert_header("X-Custom", "yes"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = tokio::task::spawn_blocking(|| ReqwestTransport::with_params(HttpParams::new()))
        .await
        .expect("transport task panicked")
        .unwrap();
    let response = send_blocking(transport, get_request(&server, "/svc/People"))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.content_type.starts_with("application/json"));
    assert_eq!(response.headers.get("X-Custom"), Some("yes"));
    assert_eq!(response.body, br#"{"value":[]}"#);
}

#[tokio::test(flavor = "multi_thread")]
async fn basic_auth_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("authorization", "Basic dXNlcjpzZWNyZXQ="))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = tokio::task::spawn_blocking(|| ReqwestTransport::with_params(HttpParams::new()))
        .await
        .expect("transport task panicked")
        .unwrap();
    let mut request = get_request(&server, "/secure");
    request.apply_auth(&AuthParams::basic("user", "secret"));

    let response = send_blocking(transport, request).await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_statuses_are_retried_until_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(3)
        .mount(&server)
        .await;

    let params = HttpParams::new().retries(3).retry_wait_ms(1).retry_backoff(1.0);
    let transport = tokio::task::spawn_blocking(move || ReqwestTransport::with_params(params))
        .await
        .expect("transport task panicked")
        .unwrap();

    let result = send_blocking(transport, get_request(&server, "/flaky")).await;
    match result {
        Err(Error::Http { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected exhausted retries, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn non_transient_errors_are_returned_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = tokio::task::spawn_blocking(|| ReqwestTransport::with_params(HttpParams::new()))
        .await
        .expect("transport task panicked")
        .unwrap();
    let response = send_blocking(transport, get_request(&server, "/missing"))
        .await
        .unwrap();
    assert_eq!(response.status, 404);
}

#[tokio::test(flavor = "multi_thread")]
async fn post_sends_the_body_with_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201).set_body_raw("{}", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = tokio::task::spawn_blocking(|| ReqwestTransport::with_params(HttpParams::new()))
        .await
        .expect("transport task panicked")
        .unwrap();
    let url = HttpUrl::parse(&format!("{}/submit", server.uri())).unwrap();
    let request =
        HttpRequest::with_body(HttpMethod::Post, url, "application/json", r#"{"a":1}"#);

    let response = send_blocking(transport, request).await.unwrap();
    assert_eq!(response.status, 201);
}
