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

//! Auth parameter resolution.
//!
//! Requests get their [`AuthParams`] either from a call-site override
//! (`auth` plus optional `auth_type`) or from a secret-store lookup by URL.
//! Basic and bearer secrets map directly; the OAuth2 kinds go through the
//! [`CredentialManager`] to produce a bearer token.

use crate::oauth2::CredentialManager;
use odata_bridge_core::AuthParams;
use odata_bridge_core::Error;
use odata_bridge_core::HttpTransport;
use odata_bridge_core::KeyValueSecret;
use odata_bridge_core::Result;
use odata_bridge_core::SecretStore;
use std::sync::Arc;

/// Call-site `auth_type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTypeOverride {
    Basic,
    Digest,
    Bearer,
}

impl std::str::FromStr for AuthTypeOverride {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BASIC" => Ok(Self::Basic),
            "DIGEST" => Ok(Self::Digest),
            "BEARER" => Ok(Self::Bearer),
            other => Err(Error::invalid_input(format!(
                "invalid auth_type '{other}' (expected BASIC, DIGEST, or BEARER)"
            ))),
        }
    }
}

/// Build [`AuthParams`] from an `auth` argument and optional `auth_type`.
///
/// Without a type, `user:password` strings become basic credentials and
/// anything else a bearer token.
pub fn auth_from_override(auth: &str, auth_type: Option<AuthTypeOverride>) -> Result<AuthParams> {
    match auth_type {
        Some(AuthTypeOverride::Basic) => match auth.split_once(':') {
            Some((username, password)) => Ok(AuthParams::basic(username, password)),
            None => Err(Error::invalid_input(
                "BASIC auth requires 'username:password'",
            )),
        },
        Some(AuthTypeOverride::Bearer) => Ok(AuthParams::bearer(auth)),
        Some(AuthTypeOverride::Digest) => Err(Error::invalid_input(
            "DIGEST authentication is not supported",
        )),
        None => match auth.split_once(':') {
            Some((username, password)) => Ok(AuthParams::basic(username, password)),
            None => Ok(AuthParams::bearer(auth)),
        },
    }
}

/// Resolves auth parameters from the secret store.
pub struct AuthResolver {
    store: Arc<dyn SecretStore>,
    credentials: CredentialManager,
}

impl AuthResolver {
    pub fn new(store: Arc<dyn SecretStore>, transport: Arc<dyn HttpTransport>) -> Self {
        let credentials = CredentialManager::new(transport, Arc::clone(&store));
        Self { store, credentials }
    }

    /// Auth parameters for a request URL: the first matching secret among
    /// `http_basic`, `http_bearer`, `microsoft_entra`, and `datasphere`
    /// wins; no match means no auth.
    pub fn resolve_for_url(&self, url: &str) -> Result<AuthParams> {
        if let Some(secret) = self.store.lookup_for_url(url, "http_basic") {
            return Ok(AuthParams::basic(
                secret.require("username")?,
                secret.require("password")?,
            ));
        }
        if let Some(secret) = self.store.lookup_for_url(url, "http_bearer") {
            return Ok(AuthParams::bearer(secret.require("token")?));
        }
        if let Some(secret) = self.store.lookup_for_url(url, "microsoft_entra") {
            return self.bearer_from_oauth2(&secret);
        }
        if let Some(secret) = self.store.lookup_for_url(url, "datasphere") {
            return self.bearer_from_oauth2(&secret);
        }
        Ok(AuthParams::None)
    }

    /// Auth parameters for a named secret.
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` when the secret does not exist or has an
    /// unrecognized kind.
    pub fn resolve_named(&self, name: &str) -> Result<AuthParams> {
        let secret = self
            .store
            .get_by_name(name)
            .ok_or_else(|| Error::invalid_input(format!("no secret named '{name}'")))?;

        match secret.kind() {
            "http_basic" => Ok(AuthParams::basic(
                secret.require("username")?,
                secret.require("password")?,
            )),
            "http_bearer" => Ok(AuthParams::bearer(secret.require("token")?)),
            "microsoft_entra" | "datasphere" => self.bearer_from_oauth2(&secret),
            other => Err(Error::invalid_input(format!(
                "secret '{name}' has unrecognized kind '{other}'"
            ))),
        }
    }

    fn bearer_from_oauth2(&self, secret: &KeyValueSecret) -> Result<AuthParams> {
        let token = self.credentials.get_token(secret)?;
        Ok(AuthParams::bearer(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odata_bridge_core::HttpRequest;
    use odata_bridge_core::HttpResponse;
    use odata_bridge_core::MemorySecretStore;

    struct NoTransport;

    impl HttpTransport for NoTransport {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            Err(Error::Io(format!("unexpected request to {}", request.url)))
        }
    }

    fn resolver(store: MemorySecretStore) -> AuthResolver {
        AuthResolver::new(Arc::new(store), Arc::new(NoTransport))
    }

    #[test]
    fn override_defaults_split_on_colon() {
        assert_eq!(
            auth_from_override("u:p", None).unwrap(),
            AuthParams::basic("u", "p")
        );
        assert_eq!(
            auth_from_override("sometoken", None).unwrap(),
            AuthParams::bearer("sometoken")
        );
    }

    #[test]
    fn explicit_basic_requires_colon() {
        assert!(auth_from_override("token", Some(AuthTypeOverride::Basic)).is_err());
        assert_eq!(
            auth_from_override("u:p", Some(AuthTypeOverride::Basic)).unwrap(),
            AuthParams::basic("u", "p")
        );
    }

    #[test]
    fn digest_is_rejected() {
        assert!(auth_from_override("u:p", Some(AuthTypeOverride::Digest)).is_err());
    }

    #[test]
    fn url_resolution_prefers_basic_then_bearer() {
        let store = MemorySecretStore::new();
        store.insert(
            KeyValueSecret::new("basic", "http_basic")
                .with_scope("https://host/")
                .with_value("username", "u")
                .with_value("password", "p"),
        );
        store.insert(
            KeyValueSecret::new("bearer", "http_bearer")
                .with_scope("https://host/")
                .with_value("token", "t"),
        );

        let resolver = resolver(store);
        assert_eq!(
            resolver.resolve_for_url("https://host/svc").unwrap(),
            AuthParams::basic("u", "p")
        );
    }

    #[test]
    fn unmatched_urls_resolve_to_no_auth() {
        let resolver = resolver(MemorySecretStore::new());
        assert_eq!(
            resolver.resolve_for_url("https://host/svc").unwrap(),
            AuthParams::None
        );
    }

    #[test]
    fn named_lookup_reports_missing_secrets() {
        let resolver = resolver(MemorySecretStore::new());
        assert!(resolver.resolve_named("absent").is_err());
    }

    #[test]
    fn stored_oauth2_token_is_served_without_a_request() {
        let store = MemorySecretStore::new();
        let future = time::OffsetDateTime::now_utc().unix_timestamp() + 86400;
        store.insert(
            KeyValueSecret::new("entra", "microsoft_entra")
                .with_scope("https://graph.microsoft.com/")
                .with_value("tenant_id", "tenant")
                .with_value("client_id", "client")
                .with_value("client_secret", "secret")
                .with_value("access_token", "cached-token")
                .with_value("expires_at", future.to_string()),
        );

        let resolver = resolver(store);
        assert_eq!(
            resolver
                .resolve_for_url("https://graph.microsoft.com/v1.0/me")
                .unwrap(),
            AuthParams::bearer("cached-token")
        );
    }
}
