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

//! OData service and entity-set clients.
//!
//! Both clients share [`ODataClientCore`]: a caching transport, the target
//! URL, auth parameters, the detected protocol version, and the metadata
//! context URL once known. [`ODataEntitySetClient`] pages through an entity
//! set by following next links; [`ODataServiceClient`] reads the service
//! document and enumerates entity sets.

use crate::content::is_json_content_type;
use crate::content::EntitySetContent;
use crate::content::EntitySetReference;
use crate::content::ServiceContent;
use odata_bridge_core::AuthParams;
use odata_bridge_core::Error;
use odata_bridge_core::HttpMethod;
use odata_bridge_core::HttpRequest;
use odata_bridge_core::HttpResponse;
use odata_bridge_core::HttpTransport;
use odata_bridge_core::HttpUrl;
use odata_bridge_core::ODataVersion;
use odata_bridge_core::Result;
use odata_bridge_core::TableType;
use odata_bridge_edm::project_entity_type;
use odata_bridge_edm::Edmx;
use odata_bridge_edm::EdmCache;
use odata_bridge_edm::ResolvedType;
use odata_bridge_http::CachingHttpClient;
use odata_bridge_http::HttpCache;
use std::sync::Arc;

/// How many path levels above the service URL are probed for `$metadata`.
const METADATA_SEARCH_DEPTH: usize = 3;

/// The shared pieces a client stack needs: the transport and the two
/// process-wide caches. Cheap to clone.
#[derive(Clone)]
pub struct ClientContext {
    pub transport: Arc<dyn HttpTransport>,
    pub http_cache: Arc<HttpCache>,
    pub edm_cache: Arc<EdmCache>,
}

impl ClientContext {
    /// Fresh caches around a transport.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            http_cache: Arc::new(HttpCache::new()),
            edm_cache: Arc::new(EdmCache::new()),
        }
    }
}

/// State shared by the service and entity-set clients.
pub struct ODataClientCore {
    http: CachingHttpClient<Arc<dyn HttpTransport>>,
    edm_cache: Arc<EdmCache>,
    url: HttpUrl,
    auth: AuthParams,
    version: Option<ODataVersion>,
    metadata_context_url: Option<String>,
}

impl ODataClientCore {
    fn new(context: &ClientContext, url: HttpUrl, auth: AuthParams) -> Self {
        Self {
            http: CachingHttpClient::new(
                Arc::clone(&context.transport),
                Arc::clone(&context.http_cache),
            ),
            edm_cache: Arc::clone(&context.edm_cache),
            url,
            auth,
            version: None,
            metadata_context_url: None,
        }
    }

    /// GET with auth and version headers; non-200 statuses fail.
    fn do_http_get(&self, url: &HttpUrl) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(HttpMethod::Get, url.clone());
        request.apply_auth(&self.auth);
        if let Some(version) = self.version {
            request.set_odata_version(version);
        }
        request.add_odata_version_headers();

        let response = self.http.send(&request)?;
        if response.status != 200 {
            return Err(Error::http(response.status, response.body_preview()));
        }
        Ok(response)
    }

    /// Fetch and cache metadata for `metadata_url`, walking up the path
    /// when the conventional location does not answer.
    fn fetch_metadata(&self, metadata_url: &str) -> Result<Arc<Edmx>> {
        if let Some(cached) = self.edm_cache.get(metadata_url) {
            return Ok(cached);
        }

        let parsed = HttpUrl::parse(metadata_url)?;
        let mut last_error = None;
        for candidate in metadata_candidates(&parsed) {
            match self.try_fetch_metadata(&candidate) {
                Ok(edmx) => {
                    tracing::info!(
                        target: "odata.client",
                        "loaded metadata from {candidate}"
                    );
                    return Ok(self.edm_cache.set(metadata_url, edmx));
                }
                Err(error) => {
                    tracing::debug!(
                        target: "odata.client",
                        "metadata candidate {candidate} failed: {error}"
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::parse("no metadata candidates to try")))
    }

    fn try_fetch_metadata(&self, url: &HttpUrl) -> Result<Edmx> {
        let response = self.do_http_get(url)?;
        Edmx::parse(&response.text()?)
    }

    fn record_context_url(&mut self, context: Option<String>) {
        let Some(context) = context else { return };
        let stripped = context.split_once('#').map_or(context.as_str(), |(b, _)| b);
        if stripped.is_empty() {
            return;
        }
        match HttpUrl::merge_with_base_if_relative(&self.url, stripped) {
            Ok(merged) => {
                let resolved = merged.to_string();
                if self.metadata_context_url.as_deref() != Some(&resolved) {
                    tracing::debug!(
                        target: "odata.client",
                        "metadata context URL from response: {resolved}"
                    );
                    self.metadata_context_url = Some(resolved);
                }
            }
            Err(error) => {
                tracing::debug!(
                    target: "odata.client",
                    "ignoring unusable @odata.context '{stripped}': {error}"
                );
            }
        }
    }
}

/// Candidate `$metadata` URLs: the conventional location, then up to three
/// parent levels.
fn metadata_candidates(url: &HttpUrl) -> Vec<HttpUrl> {
    let mut candidates = vec![url.clone()];
    let mut current = url.clone();
    for _ in 0..METADATA_SEARCH_DEPTH {
        let path = current.path().trim_end_matches('/');
        let Some(service_path) = path.strip_suffix("/$metadata") else {
            break;
        };
        let parent = match service_path.rfind('/') {
            Some(0) | None => String::new(),
            Some(pos) => service_path[..pos].to_string(),
        };
        let mut next = current.clone();
        next.set_path(format!("{parent}/$metadata"));
        next.set_query("");
        if next == current {
            break;
        }
        candidates.push(next.clone());
        current = next;
    }
    candidates
}

/// Synthesize a `$metadata` URL from an entity-set URL: query dropped, last
/// path segment replaced, preferring the prefix just above a `/V2/` or
/// `/V4/` marker when one is present.
fn fallback_metadata_url(url: &HttpUrl) -> String {
    let mut base = url.clone();
    base.set_query("");
    let path = base.path().to_string();

    let service_root = ["/V2/", "/V4/"]
        .iter()
        .find_map(|marker| {
            path.find(marker).map(|pos| {
                match path[pos + marker.len()..].find('/') {
                    Some(slash) => path[..pos + marker.len() + slash].to_string(),
                    None => path.clone(),
                }
            })
        })
        .unwrap_or_else(|| match path.rfind('/') {
            Some(pos) if pos > 0 => path[..pos].to_string(),
            _ => String::new(),
        });

    base.set_path(format!("{service_root}/$metadata"));
    base.to_string()
}

/// One fetched entity-set page.
#[derive(Debug, Clone)]
pub struct EntitySetResponse {
    pub content: EntitySetContent,
}

impl EntitySetResponse {
    pub fn version(&self) -> ODataVersion {
        self.content.version()
    }

    pub fn next_url(&self) -> Option<String> {
        self.content.next_url()
    }

    pub fn delta_url(&self) -> Option<String> {
        self.content.delta_url()
    }

    pub fn total_count(&self) -> Option<u64> {
        self.content.total_count()
    }
}

/// Client for one entity-set URL: pages of rows, schema from metadata.
pub struct ODataEntitySetClient {
    core: ODataClientCore,
    entity_set_name: Option<String>,
    current: Option<EntitySetResponse>,
}

impl ODataEntitySetClient {
    pub fn new(context: &ClientContext, url: HttpUrl, auth: AuthParams) -> Self {
        Self {
            core: ODataClientCore::new(context, url, auth),
            entity_set_name: None,
            current: None,
        }
    }

    pub fn url(&self) -> &HttpUrl {
        &self.core.url
    }

    pub fn auth(&self) -> &AuthParams {
        &self.core.auth
    }

    pub fn version(&self) -> Option<ODataVersion> {
        self.core.version
    }

    /// Record the protocol version directly, skipping metadata fetches.
    pub fn set_version(&mut self, version: ODataVersion) {
        self.core.version = Some(version);
    }

    /// Store a metadata context URL (used by services whose data URL has no
    /// `$metadata` sibling).
    pub fn set_metadata_context_url(&mut self, url: impl Into<String>) {
        self.core.metadata_context_url = Some(url.into());
    }

    /// Override the entity-set name derived from the URL path.
    pub fn set_entity_set_name(&mut self, name: impl Into<String>) {
        self.entity_set_name = Some(name.into());
    }

    /// The stored metadata context URL, without computing a fallback.
    pub fn stored_metadata_context_url(&self) -> Option<&str> {
        self.core.metadata_context_url.as_deref()
    }

    /// The entity-set name override, if one was set.
    pub fn entity_set_name_override(&self) -> Option<&str> {
        self.entity_set_name.as_deref()
    }

    /// Entity-set name: the override when set, else the final URL path
    /// segment.
    pub fn entity_set_name(&self) -> Result<String> {
        if let Some(name) = &self.entity_set_name {
            return Ok(name.clone());
        }
        let segment = self.core.url.last_path_segment();
        if segment.is_empty() {
            return Err(Error::invalid_input(format!(
                "entity set URL '{}' has no path segment",
                self.core.url
            )));
        }
        Ok(segment.to_string())
    }

    /// The page currently cached, if any.
    pub fn current(&self) -> Option<&EntitySetResponse> {
        self.current.as_ref()
    }

    /// Fetch a page. The first call issues a GET on the client URL and
    /// caches the response; repeated calls return the cached page. With
    /// `get_next`, the URL advances along the cached page's next link first;
    /// `None` means pagination is complete.
    pub fn get(&mut self, get_next: bool) -> Result<Option<&EntitySetResponse>> {
        if !get_next && self.current.is_some() {
            return Ok(self.current.as_ref());
        }

        if self.core.version.is_none() {
            self.detect_version()?;
        }

        if get_next {
            match self.current.as_ref().and_then(EntitySetResponse::next_url) {
                Some(next) => {
                    self.core.url =
                        HttpUrl::merge_with_base_if_relative(&self.core.url, &next)?;
                    tracing::debug!(
                        target: "odata.client",
                        "following next link to {}", self.core.url
                    );
                }
                None => return Ok(None),
            }
        }

        let response = self.core.do_http_get(&self.core.url.clone())?;
        if !is_json_content_type(&response.content_type) {
            return Err(Error::parse(format!(
                "unsupported OData content type: '{}'",
                response.content_type
            )));
        }

        let content = EntitySetContent::parse(&response.text()?)?;
        if self.core.version.is_none() {
            // The payload shape is a more reliable signal than metadata.
            self.core.version = Some(content.version());
            tracing::debug!(
                target: "odata.client",
                "detected OData version {} from response",
                content.version()
            );
        }

        self.core.record_context_url(content.metadata_context_url());
        self.current = Some(EntitySetResponse { content });
        Ok(self.current.as_ref())
    }

    /// Ensure the protocol version is known, fetching metadata when needed.
    pub fn detect_version(&mut self) -> Result<ODataVersion> {
        if let Some(version) = self.core.version {
            return Ok(version);
        }
        let metadata_url = self.metadata_context_url();
        let edmx = self.core.fetch_metadata(&metadata_url)?;
        let version = edmx.version();
        self.core.version = Some(version);
        tracing::info!(target: "odata.client", "detected OData version {version} from metadata");
        Ok(version)
    }

    /// The parsed metadata document for this entity set.
    pub fn metadata(&mut self) -> Result<Arc<Edmx>> {
        let metadata_url = self.metadata_context_url();
        let edmx = self.core.fetch_metadata(&metadata_url)?;
        if self.core.version.is_none() {
            self.core.version = Some(edmx.version());
        }
        Ok(edmx)
    }

    /// Metadata URL resolution order: stored context URL, `@odata.context`
    /// of the cached response, then the synthesized fallback.
    pub fn metadata_context_url(&mut self) -> String {
        if let Some(stored) = &self.core.metadata_context_url {
            return stored.clone();
        }

        if let Some(context) = self
            .current
            .as_ref()
            .and_then(|response| response.content.metadata_context_url())
        {
            self.core.record_context_url(Some(context));
            if let Some(stored) = &self.core.metadata_context_url {
                return stored.clone();
            }
        }

        let fallback = fallback_metadata_url(&self.core.url);
        tracing::debug!(target: "odata.client", "using fallback metadata URL {fallback}");
        self.core.metadata_context_url = Some(fallback.clone());
        fallback
    }

    /// The projected output schema of this entity set.
    pub fn result_schema(&mut self) -> Result<Vec<(String, TableType)>> {
        let edmx = self.metadata()?;
        let entity_set_name = self.entity_set_name()?;
        let entity_set = edmx.find_entity_set(&entity_set_name)?;
        let entity = match edmx.resolve_type(&entity_set.entity_type_name)? {
            ResolvedType::Entity(entity) => entity,
            other => {
                return Err(Error::parse(format!(
                    "entity set '{entity_set_name}' is not backed by an entity type: {other:?}"
                )))
            }
        };
        project_entity_type(&edmx, entity)
    }

    pub fn result_names(&mut self) -> Result<Vec<String>> {
        Ok(self
            .result_schema()?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    pub fn result_types(&mut self) -> Result<Vec<TableType>> {
        Ok(self
            .result_schema()?
            .into_iter()
            .map(|(_, column_type)| column_type)
            .collect())
    }
}

/// The service document response.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub content: ServiceContent,
}

/// Client for a service root URL.
pub struct ODataServiceClient {
    core: ODataClientCore,
    current: Option<ServiceResponse>,
}

impl ODataServiceClient {
    pub fn new(context: &ClientContext, url: HttpUrl, auth: AuthParams) -> Self {
        Self {
            core: ODataClientCore::new(context, url, auth),
            current: None,
        }
    }

    pub fn url(&self) -> &HttpUrl {
        &self.core.url
    }

    /// Fetch (once) and return the service document.
    pub fn get(&mut self) -> Result<&ServiceResponse> {
        if self.current.is_none() {
            let response = self.core.do_http_get(&self.core.url.clone())?;
            let content = ServiceContent::parse(&response.text()?)?;
            self.core.record_context_url(content.metadata_context_url());
            self.current = Some(ServiceResponse { content });
        }
        Ok(self.current.as_ref().expect("just fetched"))
    }

    /// Entity-set references with URLs resolved against the service root.
    pub fn entity_sets(&mut self) -> Result<Vec<EntitySetReference>> {
        let service_url = self.core.url.clone();
        let references = self.get()?.content.entity_sets()?;
        references
            .into_iter()
            .map(|reference| {
                let absolute =
                    HttpUrl::merge_with_base_if_relative(&service_url, &reference.url)?;
                Ok(EntitySetReference {
                    name: reference.name,
                    url: absolute.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_candidates_walk_up_three_levels() {
        let url = HttpUrl::parse("https://host/a/b/c/$metadata").unwrap();
        let candidates: Vec<String> = metadata_candidates(&url)
            .iter()
            .map(HttpUrl::to_string)
            .collect();
        assert_eq!(
            candidates,
            vec![
                "https://host/a/b/c/$metadata",
                "https://host/a/b/$metadata",
                "https://host/a/$metadata",
                "https://host/$metadata",
            ]
        );
    }

    #[test]
    fn fallback_prefers_version_markers() {
        let url = HttpUrl::parse("https://services.odata.org/V2/Northwind/Northwind.svc/Products")
            .unwrap();
        assert_eq!(
            fallback_metadata_url(&url),
            "https://services.odata.org/V2/Northwind/$metadata"
        );
    }

    #[test]
    fn fallback_trims_the_entity_segment() {
        let url = HttpUrl::parse("https://host/TripPin/People?$top=5").unwrap();
        assert_eq!(fallback_metadata_url(&url), "https://host/TripPin/$metadata");
    }
}
