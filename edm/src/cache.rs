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

//! Process-wide cache of parsed metadata documents.
//!
//! Metadata is fetched once per URL and shared. The cache is an explicit
//! value handed around in an `Arc` rather than a global; whoever builds the
//! client stack decides its extent.

use crate::edmx::Edmx;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

/// Mutex-protected map from metadata URL (fragment stripped) to parsed
/// document. Read-mostly; writers overwrite.
#[derive(Debug, Default)]
pub struct EdmCache {
    inner: Mutex<HashMap<String, Arc<Edmx>>>,
}

impl EdmCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached document for a metadata URL, if present.
    pub fn get(&self, url: &str) -> Option<Arc<Edmx>> {
        let inner = self.inner.lock().expect("EDM cache poisoned");
        inner.get(Self::key(url)).cloned()
    }

    /// Cache a document, replacing any previous entry for the URL. Returns
    /// the shared handle.
    pub fn set(&self, url: &str, edmx: Edmx) -> Arc<Edmx> {
        let entry = Arc::new(edmx);
        let mut inner = self.inner.lock().expect("EDM cache poisoned");
        inner.insert(Self::key(url).to_string(), Arc::clone(&entry));
        entry
    }

    /// Drop the entry for a URL.
    pub fn evict(&self, url: &str) {
        let mut inner = self.inner.lock().expect("EDM cache poisoned");
        inner.remove(Self::key(url));
    }

    fn key(url: &str) -> &str {
        url.split_once('#').map_or(url, |(base, _)| base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odata_bridge_core::ODataVersion;

    fn sample() -> Edmx {
        Edmx::parse(
            r#"<edmx:Edmx Version="4.0">
                 <edmx:DataServices><Schema Namespace="S"/></edmx:DataServices>
               </edmx:Edmx>"#,
        )
        .unwrap()
    }

    #[test]
    fn get_set_round_trip() {
        let cache = EdmCache::new();
        assert!(cache.get("https://host/svc/$metadata").is_none());

        cache.set("https://host/svc/$metadata", sample());
        let hit = cache.get("https://host/svc/$metadata").unwrap();
        assert_eq!(hit.version(), ODataVersion::V4);
    }

    #[test]
    fn fragment_is_ignored_in_the_key() {
        let cache = EdmCache::new();
        cache.set("https://host/svc/$metadata#People", sample());
        assert!(cache.get("https://host/svc/$metadata").is_some());
        assert!(cache.get("https://host/svc/$metadata#Other").is_some());
    }

    #[test]
    fn evict_removes_the_entry() {
        let cache = EdmCache::new();
        cache.set("https://host/svc/$metadata", sample());
        cache.evict("https://host/svc/$metadata");
        assert!(cache.get("https://host/svc/$metadata").is_none());
    }
}
