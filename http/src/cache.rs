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

//! Response caching.
//!
//! [`HttpCache`] maps request fingerprints to responses with absolute
//! expiries; a single background sweeper removes expired entries every ten
//! seconds and shuts down cooperatively when the cache is dropped.
//! [`CachingHttpClient`] wraps any transport with cache lookups, inserting
//! 2xx responses only.

use odata_bridge_core::HttpRequest;
use odata_bridge_core::HttpResponse;
use odata_bridge_core::HttpTransport;
use odata_bridge_core::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct CacheEntry {
    response: HttpResponse,
    expiry: Instant,
}

#[derive(Default)]
struct Shutdown {
    stopped: Mutex<bool>,
    signal: Condvar,
}

/// Fingerprint-keyed response cache with background eviction.
///
/// All access goes through a single mutex; entries are deep-copied out so
/// callers never alias cached state.
pub struct HttpCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    shutdown: Arc<Shutdown>,
    sweeper: Option<JoinHandle<()>>,
}

impl HttpCache {
    pub fn new() -> Self {
        let entries: Arc<Mutex<HashMap<String, CacheEntry>>> = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = Arc::new(Shutdown::default());

        let sweeper_entries = Arc::clone(&entries);
        let sweeper_shutdown = Arc::clone(&shutdown);
        let sweeper = std::thread::spawn(move || loop {
            let stopped = sweeper_shutdown
                .stopped
                .lock()
                .expect("HTTP cache shutdown lock poisoned");
            let (stopped, _) = sweeper_shutdown
                .signal
                .wait_timeout_while(stopped, SWEEP_INTERVAL, |stopped| !*stopped)
                .expect("HTTP cache shutdown lock poisoned");
            if *stopped {
                break;
            }
            drop(stopped);

            let now = Instant::now();
            let mut entries = sweeper_entries.lock().expect("HTTP cache poisoned");
            entries.retain(|_, entry| entry.expiry > now);
        });

        Self {
            entries,
            shutdown,
            sweeper: Some(sweeper),
        }
    }

    /// Deep copy of the unexpired cached response for this request.
    pub fn get(&self, request: &HttpRequest) -> Option<HttpResponse> {
        let entries = self.entries.lock().expect("HTTP cache poisoned");
        entries
            .get(&request.cache_key())
            .filter(|entry| entry.expiry > Instant::now())
            .map(|entry| entry.response.clone())
    }

    /// Insert a response with `expiry = now + ttl`.
    pub fn put(&self, request: &HttpRequest, response: &HttpResponse, ttl: Duration) {
        let entry = CacheEntry {
            response: response.clone(),
            expiry: Instant::now() + ttl,
        };
        let mut entries = self.entries.lock().expect("HTTP cache poisoned");
        entries.insert(request.cache_key(), entry);
    }

    pub fn contains(&self, request: &HttpRequest) -> bool {
        self.get(request).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("HTTP cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HttpCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HttpCache {
    fn drop(&mut self) {
        {
            let mut stopped = self
                .shutdown
                .stopped
                .lock()
                .expect("HTTP cache shutdown lock poisoned");
            *stopped = true;
        }
        self.shutdown.signal.notify_one();
        if let Some(sweeper) = self.sweeper.take() {
            let _ = sweeper.join();
        }
    }
}

/// Transport wrapper that serves cache hits and inserts 2xx responses.
pub struct CachingHttpClient<T: HttpTransport> {
    transport: T,
    cache: Arc<HttpCache>,
    ttl: Duration,
}

impl<T: HttpTransport> CachingHttpClient<T> {
    /// Default time-to-live for cached responses.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

    pub fn new(transport: T, cache: Arc<HttpCache>) -> Self {
        Self::with_ttl(transport, cache, Self::DEFAULT_TTL)
    }

    pub fn with_ttl(transport: T, cache: Arc<HttpCache>, ttl: Duration) -> Self {
        Self {
            transport,
            cache,
            ttl,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: HttpTransport> HttpTransport for CachingHttpClient<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        if let Some(cached) = self.cache.get(request) {
            tracing::debug!(target: "http.cache", "cache hit for {}", request.url);
            return Ok(cached);
        }

        let response = self.transport.send(request)?;
        if response.is_success() {
            self.cache.put(request, &response, self.ttl);
        }
        Ok(response)
    }
}
