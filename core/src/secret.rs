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

//! Key/value secret contract.
//!
//! Secret persistence is host-defined; this crate only states what the
//! bridge needs: typed key/value secrets, looked up by name or by URL-scope
//! prefix, and writable back for OAuth2 token caching. A mutex-protected
//! in-memory store ships for tests and embedders without a secret backend.
//!
//! Recognized kinds: `http_basic` (username, password), `http_bearer`
//! (token), `microsoft_entra` and `datasphere` (OAuth2, see the http crate).

use crate::error::Error;
use crate::error::Result;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;

/// A named, typed bag of string key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueSecret {
    name: String,
    kind: String,
    /// URL prefixes this secret applies to.
    scope: Vec<String>,
    values: BTreeMap<String, String>,
}

impl KeyValueSecret {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            scope: Vec::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    #[must_use]
    pub fn with_scope(mut self, prefix: impl Into<String>) -> Self {
        self.scope.push(prefix.into());
        self
    }

    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Like [`get`](Self::get) but failing with `InvalidInput` when absent
    /// or empty.
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::invalid_input(format!(
                "secret '{}' is missing required key '{key}'",
                self.name
            ))),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Whether any scope prefix matches the given URL.
    pub fn matches_url(&self, url: &str) -> bool {
        self.scope.iter().any(|prefix| url.starts_with(prefix.as_str()))
    }
}

/// Host-provided secret storage.
pub trait SecretStore: Send + Sync {
    /// Secret by exact name.
    fn get_by_name(&self, name: &str) -> Option<KeyValueSecret>;

    /// Secret of the given kind whose scope prefix matches `url`. When
    /// several match, the longest prefix wins.
    fn lookup_for_url(&self, url: &str, kind: &str) -> Option<KeyValueSecret>;

    /// Persist updated values (token refresh writes back through this).
    fn update(&self, secret: &KeyValueSecret) -> Result<()>;
}

/// Mutex-protected in-memory store.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    inner: Mutex<HashMap<String, KeyValueSecret>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, secret: KeyValueSecret) {
        let mut inner = self.inner.lock().expect("secret store poisoned");
        inner.insert(secret.name().to_string(), secret);
    }
}

impl SecretStore for MemorySecretStore {
    fn get_by_name(&self, name: &str) -> Option<KeyValueSecret> {
        let inner = self.inner.lock().expect("secret store poisoned");
        inner.get(name).cloned()
    }

    fn lookup_for_url(&self, url: &str, kind: &str) -> Option<KeyValueSecret> {
        let inner = self.inner.lock().expect("secret store poisoned");
        inner
            .values()
            .filter(|secret| secret.kind() == kind && secret.matches_url(url))
            .max_by_key(|secret| {
                secret
                    .scope()
                    .iter()
                    .filter(|prefix| url.starts_with(prefix.as_str()))
                    .map(String::len)
                    .max()
                    .unwrap_or(0)
            })
            .cloned()
    }

    fn update(&self, secret: &KeyValueSecret) -> Result<()> {
        self.insert(secret.clone());
        Ok(())
    }
}
