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

use odata_bridge_core::Error;
use odata_bridge_core::HeaderMap;
use odata_bridge_core::HttpRequest;
use odata_bridge_core::HttpResponse;
use odata_bridge_core::HttpTransport;
use odata_bridge_core::Result;
use std::time::Duration;

/// Statuses retried with backoff: request timeout, teapot, rate limiting,
/// and upstream unavailability.
const TRANSIENT_STATUSES: [u16; 5] = [408, 418, 429, 503, 504];

/// Configuration for [`ReqwestTransport`].
///
/// Environment overrides: `ODATA_BRIDGE_TIMEOUT_SECS`,
/// `ODATA_BRIDGE_RETRIES`, `ODATA_BRIDGE_RETRY_WAIT_MS`,
/// `ODATA_BRIDGE_RETRY_BACKOFF`.
#[derive(Debug, Clone)]
pub struct HttpParams {
    /// Read/write timeout per request.
    pub timeout: Duration,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Total attempts, including the first.
    pub retries: u32,
    /// Base retry wait.
    pub retry_wait_ms: u64,
    /// Exponential backoff factor.
    pub retry_backoff: f64,
    /// TCP keep-alive interval.
    pub tcp_keepalive: Option<Duration>,
    /// Connection pool idle timeout.
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
    /// Server TLS certificate verification. On unless explicitly disabled.
    pub verify_tls: bool,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retries: 3,
            retry_wait_ms: 100,
            retry_backoff: 4.0,
            tcp_keepalive: Some(Duration::from_secs(60)),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 10,
            max_redirects: 10,
            verify_tls: true,
            user_agent: "odata-bridge/0.1".to_string(),
        }
    }
}

impl HttpParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut params = Self::default();
        if let Some(secs) = env_parse::<u64>("ODATA_BRIDGE_TIMEOUT_SECS") {
            params.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_parse::<u32>("ODATA_BRIDGE_RETRIES") {
            params.retries = retries.max(1);
        }
        if let Some(wait) = env_parse::<u64>("ODATA_BRIDGE_RETRY_WAIT_MS") {
            params.retry_wait_ms = wait;
        }
        if let Some(backoff) = env_parse::<f64>("ODATA_BRIDGE_RETRY_BACKOFF") {
            params.retry_backoff = backoff;
        }
        params
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    #[must_use]
    pub const fn retry_wait_ms(mut self, wait_ms: u64) -> Self {
        self.retry_wait_ms = wait_ms;
        self
    }

    #[must_use]
    pub const fn retry_backoff(mut self, backoff: f64) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Disable server certificate verification. Only for endpoints with
    /// self-signed certificates under the caller's control.
    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.verify_tls = !accept;
        self
    }

    #[must_use]
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Wait before attempt `n` (1-based): `retry_wait_ms * backoff^(n-2)`,
    /// starting from the second retry.
    pub fn sleep_for_attempt(&self, n: u32) -> Duration {
        let millis = (self.retry_wait_ms as f64) * self.retry_backoff.powi(n as i32 - 2);
        Duration::from_millis(millis as u64)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Blocking transport on `reqwest`, with redirects, keep-alive,
/// decompression, and retry-with-backoff on transient failures.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    params: HttpParams,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// `Error::Io` when the underlying client cannot be constructed.
    pub fn new() -> Result<Self> {
        Self::with_params(HttpParams::from_env())
    }

    pub fn with_params(params: HttpParams) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .use_rustls_tls()
            .timeout(params.timeout)
            .connect_timeout(params.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(params.max_redirects))
            .pool_max_idle_per_host(params.pool_max_idle_per_host)
            .user_agent(params.user_agent.clone());

        if let Some(keepalive) = params.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }
        if let Some(idle) = params.pool_idle_timeout {
            builder = builder.pool_idle_timeout(idle);
        }
        if !params.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Io(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, params })
    }

    pub fn params(&self) -> &HttpParams {
        &self.params
    }

    fn execute_once(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| Error::invalid_input(format!("invalid method: {e}")))?;

        let mut builder = self.client.request(method, request.url.to_string());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            if !request.headers.contains("Content-Type") {
                builder = builder.header("Content-Type", &request.content_type);
            }
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .map_err(|e| Error::Io(format!("{} {}: {e}", request.method, request.url)))?;

        let status = response.status().as_u16();
        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        let content_type = headers.get("Content-Type").unwrap_or_default().to_string();
        let body = response
            .bytes()
            .map_err(|e| Error::Io(format!("reading body from {}: {e}", request.url)))?
            .to_vec();

        Ok(HttpResponse {
            method: request.method,
            url: request.url.clone(),
            status,
            content_type,
            headers,
            body,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        tracing::info!(
            target: "http.transport",
            "{} {} ({} byte body)",
            request.method,
            request.url,
            request.body.len()
        );
        tracing::debug!(
            target: "http.transport",
            "request headers: {:?}",
            request.sanitized_headers()
        );

        let mut tries: u32 = 0;
        loop {
            tries += 1;
            let last_error = match self.execute_once(request) {
                Ok(response) if !TRANSIENT_STATUSES.contains(&response.status) => {
                    tracing::info!(
                        target: "http.transport",
                        "{} {} -> {} ({} bytes)",
                        request.method,
                        request.url,
                        response.status,
                        response.body.len()
                    );
                    tracing::debug!(
                        target: "http.transport",
                        "response preview: {}",
                        response.body_preview()
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    tracing::warn!(
                        target: "http.transport",
                        "transient status {} from {} (attempt {tries})",
                        response.status,
                        request.url
                    );
                    Error::http(response.status, response.body_preview())
                }
                Err(error) => {
                    tracing::warn!(
                        target: "http.transport",
                        "transport failure for {} (attempt {tries}): {error}",
                        request.url
                    );
                    error
                }
            };

            if tries >= self.params.retries {
                return Err(last_error);
            }
            if tries > 1 {
                std::thread::sleep(self.params.sleep_for_attempt(tries));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_follows_the_formula() {
        let params = HttpParams::new().retry_wait_ms(100).retry_backoff(4.0);
        assert_eq!(params.sleep_for_attempt(2), Duration::from_millis(100));
        assert_eq!(params.sleep_for_attempt(3), Duration::from_millis(400));
        assert_eq!(params.sleep_for_attempt(4), Duration::from_millis(1600));
    }

    #[test]
    fn tls_verification_is_on_by_default() {
        assert!(HttpParams::default().verify_tls);
        assert!(!HttpParams::default().accept_invalid_certs(true).verify_tls);
    }

    #[test]
    fn transient_statuses_match_the_retry_set() {
        for status in [408, 418, 429, 503, 504] {
            assert!(TRANSIENT_STATUSES.contains(&status));
        }
        assert!(!TRANSIENT_STATUSES.contains(&500));
        assert!(!TRANSIENT_STATUSES.contains(&404));
    }
}
