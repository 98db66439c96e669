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

use crate::error::Result;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use std::sync::Arc;

/// Blocking HTTP transport.
///
/// One method, so the whole stack can be driven by a real client
/// (`odata-bridge-http`), a caching wrapper, or a scripted mock
/// (`odata-bridge-mock`) without the callers noticing.
///
/// Implementations retry transient failures internally; a returned response
/// may still carry a non-2xx status, which callers interpret.
pub trait HttpTransport: Send + Sync {
    /// Send the request and block until a response or terminal error.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).send(request)
    }
}
