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

//! OAuth2 token lifecycle.
//!
//! Two secret kinds carry OAuth2 credentials: `microsoft_entra`
//! (tenant-derived login.microsoftonline.com endpoints) and `datasphere`
//! (tenant plus data-center-derived hana.ondemand.com endpoints).
//! [`CredentialManager::get_token`] serves a stored access token while it
//! has more than five minutes of validity left, refreshes with a stored
//! refresh token when possible, and otherwise runs the configured grant:
//! client credentials, or authorization code with PKCE on a localhost
//! loopback. Fresh tokens are persisted back into the secret store.

use odata_bridge_core::Error;
use odata_bridge_core::HttpMethod;
use odata_bridge_core::HttpRequest;
use odata_bridge_core::HttpResponse;
use odata_bridge_core::HttpTransport;
use odata_bridge_core::HttpUrl;
use odata_bridge_core::KeyValueSecret;
use odata_bridge_core::Result;
use odata_bridge_core::SecretStore;
use rand::Rng;
use serde::Deserialize;
use sha2::Digest;
use sha2::Sha256;
use std::io::Read;
use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use time::OffsetDateTime;

/// Tokens with less remaining validity than this are refreshed eagerly.
const EXPIRY_SKEW_SECS: i64 = 300;

/// Unreserved characters permitted in PKCE verifiers (RFC 7636).
const PKCE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

const PKCE_VERIFIER_LEN: usize = 128;
const STATE_TOKEN_LEN: usize = 32;

const DEFAULT_LOOPBACK_REDIRECT: &str = "http://localhost:65000";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// Random PKCE code verifier: 128 characters from the unreserved alphabet.
pub fn generate_pkce_verifier() -> String {
    random_string(PKCE_VERIFIER_LEN)
}

/// PKCE code challenge: base64url without padding over SHA-256 of the
/// verifier (method `S256`).
pub fn pkce_challenge(verifier: &str) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Random OAuth2 state parameter.
pub fn generate_state_token() -> String {
    random_string(STATE_TOKEN_LEN)
}

fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| PKCE_ALPHABET[rng.gen_range(0..PKCE_ALPHABET.len())] as char)
        .collect()
}

/// Token endpoint for a Microsoft Entra tenant.
pub fn entra_token_url(tenant_id: &str) -> String {
    format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token")
}

/// Authorization endpoint for a Microsoft Entra tenant.
pub fn entra_authorize_url(tenant_id: &str) -> String {
    format!("https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/authorize")
}

/// Token endpoint for a Datasphere tenant.
pub fn datasphere_token_url(tenant_name: &str, data_center: &str) -> String {
    format!("https://{tenant_name}.authentication.{data_center}.hana.ondemand.com/oauth/token")
}

/// Authorization endpoint for a Datasphere tenant.
pub fn datasphere_authorize_url(tenant_name: &str, data_center: &str) -> String {
    format!("https://{tenant_name}.authentication.{data_center}.hana.ondemand.com/oauth/authorize")
}

/// Acquires, refreshes, and persists OAuth2 tokens for the recognized
/// secret kinds.
pub struct CredentialManager {
    transport: Arc<dyn HttpTransport>,
    store: Arc<dyn SecretStore>,
}

impl CredentialManager {
    pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<dyn SecretStore>) -> Self {
        Self { transport, store }
    }

    /// A valid access token for the secret, running a grant if needed.
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` for malformed secrets, `Error::Auth` when the
    /// grant fails.
    pub fn get_token(&self, secret: &KeyValueSecret) -> Result<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();

        if let (Some(token), Some(expires_at)) =
            (secret.get("access_token"), secret.get("expires_at"))
        {
            if !token.is_empty() {
                if let Ok(expires_at) = expires_at.parse::<i64>() {
                    if expires_at > now + EXPIRY_SKEW_SECS {
                        tracing::debug!(
                            target: "http.oauth2",
                            "reusing stored access token for secret '{}'",
                            secret.name()
                        );
                        return Ok(token.to_string());
                    }
                }
            }
        }

        let token_url = self.token_url_for(secret)?;

        let refreshed = secret
            .get("refresh_token")
            .filter(|token| !token.is_empty())
            .and_then(|refresh_token| {
                match self.refresh_grant(&token_url, secret, refresh_token) {
                    Ok(tokens) => Some(tokens),
                    Err(error) => {
                        tracing::warn!(
                            target: "http.oauth2",
                            "refresh grant failed for secret '{}', falling back: {error}",
                            secret.name()
                        );
                        None
                    }
                }
            });

        let tokens = match refreshed {
            Some(tokens) => tokens,
            None => self.primary_grant(&token_url, secret)?,
        };

        let mut updated = secret.clone();
        updated.set("access_token", tokens.access_token.clone());
        if let Some(refresh_token) = &tokens.refresh_token {
            updated.set("refresh_token", refresh_token.clone());
        }
        let expires_at = now + tokens.expires_in.unwrap_or(3600);
        updated.set("expires_at", expires_at.to_string());
        if let Some(token_type) = &tokens.token_type {
            updated.set("token_type", token_type.clone());
        }
        if let Some(scope) = &tokens.scope {
            updated.set("scope", scope.clone());
        }
        self.store.update(&updated)?;

        Ok(tokens.access_token)
    }

    fn token_url_for(&self, secret: &KeyValueSecret) -> Result<String> {
        match secret.kind() {
            "microsoft_entra" => Ok(entra_token_url(secret.require("tenant_id")?)),
            "datasphere" => Ok(datasphere_token_url(
                secret.require("tenant_name")?,
                secret.require("data_center")?,
            )),
            other => Err(Error::invalid_input(format!(
                "secret kind '{other}' does not carry OAuth2 credentials"
            ))),
        }
    }

    fn authorize_url_for(&self, secret: &KeyValueSecret) -> Result<String> {
        match secret.kind() {
            "microsoft_entra" => Ok(entra_authorize_url(secret.require("tenant_id")?)),
            "datasphere" => Ok(datasphere_authorize_url(
                secret.require("tenant_name")?,
                secret.require("data_center")?,
            )),
            other => Err(Error::invalid_input(format!(
                "secret kind '{other}' does not carry OAuth2 credentials"
            ))),
        }
    }

    fn primary_grant(&self, token_url: &str, secret: &KeyValueSecret) -> Result<TokenResponse> {
        let default_grant = match secret.kind() {
            "datasphere" => "authorization_code",
            _ => "client_credentials",
        };
        match secret.get("grant_type").unwrap_or(default_grant) {
            "client_credentials" => self.client_credentials_grant(token_url, secret),
            "authorization_code" => self.authorization_code_grant(token_url, secret),
            other => Err(Error::invalid_input(format!(
                "unsupported grant_type '{other}' in secret '{}'",
                secret.name()
            ))),
        }
    }

    fn client_credentials_grant(
        &self,
        token_url: &str,
        secret: &KeyValueSecret,
    ) -> Result<TokenResponse> {
        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", secret.require("client_id")?.to_string()),
            ("client_secret", secret.require("client_secret")?.to_string()),
        ];
        if let Some(scope) = secret.get("scope").filter(|s| !s.is_empty()) {
            form.push(("scope", scope.to_string()));
        }
        self.request_token(token_url, &form)
    }

    fn refresh_grant(
        &self,
        token_url: &str,
        secret: &KeyValueSecret,
        refresh_token: &str,
    ) -> Result<TokenResponse> {
        let form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("client_id", secret.require("client_id")?.to_string()),
            ("client_secret", secret.require("client_secret")?.to_string()),
        ];
        self.request_token(token_url, &form)
    }

    /// Authorization-code grant with PKCE. Directs the user to the
    /// authorization URL, receives the code on a localhost loopback
    /// listener, verifies the state parameter, and exchanges the code.
    fn authorization_code_grant(
        &self,
        token_url: &str,
        secret: &KeyValueSecret,
    ) -> Result<TokenResponse> {
        let client_id = secret.require("client_id")?;
        let redirect_uri = secret
            .get("redirect_uri")
            .filter(|uri| !uri.is_empty())
            .unwrap_or(DEFAULT_LOOPBACK_REDIRECT);

        let verifier = generate_pkce_verifier();
        let challenge = pkce_challenge(&verifier);
        let state = generate_state_token();

        let mut authorize = url::Url::parse(&self.authorize_url_for(secret)?)
            .map_err(|e| Error::invalid_input(format!("authorize URL: {e}")))?;
        authorize
            .query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &state);
        if let Some(scope) = secret.get("scope").filter(|s| !s.is_empty()) {
            authorize.query_pairs_mut().append_pair("scope", scope);
        }

        tracing::info!(
            target: "http.oauth2",
            "open this URL in a browser to authorize: {authorize}"
        );

        let (code, returned_state) = wait_for_loopback_code(redirect_uri)?;
        if returned_state != state {
            return Err(Error::Auth(
                "authorization callback state parameter mismatch".to_string(),
            ));
        }

        let form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code),
            ("client_id", client_id.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("code_verifier", verifier),
        ];
        self.request_token(token_url, &form)
    }

    fn request_token(&self, token_url: &str, form: &[(&str, String)]) -> Result<TokenResponse> {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in form {
            serializer.append_pair(key, value);
        }
        let body = serializer.finish();

        let mut request = HttpRequest::with_body(
            HttpMethod::Post,
            HttpUrl::parse(token_url)?,
            "application/x-www-form-urlencoded",
            body.into_bytes(),
        );
        request.headers.set("Accept", "application/json");

        let response = self.transport.send(&request)?;
        if !response.is_success() {
            return Err(auth_error_from_response(&response));
        }

        serde_json::from_slice::<TokenResponse>(&response.body)
            .map_err(|e| Error::Auth(format!("malformed token response: {e}")))
    }
}

fn auth_error_from_response(response: &HttpResponse) -> Error {
    let detail = serde_json::from_slice::<TokenErrorResponse>(&response.body)
        .ok()
        .and_then(|body| body.error_description.or(body.error))
        .unwrap_or_else(|| response.body_preview());
    Error::Auth(format!(
        "token endpoint returned status {}: {detail}",
        response.status
    ))
}

/// Listen on the loopback redirect URI for one authorization callback and
/// return (code, state).
fn wait_for_loopback_code(redirect_uri: &str) -> Result<(String, String)> {
    let parsed = url::Url::parse(redirect_uri)
        .map_err(|e| Error::invalid_input(format!("redirect_uri: {e}")))?;
    let port = parsed.port().unwrap_or(80);
    let listener = TcpListener::bind(("127.0.0.1", port))
        .map_err(|e| Error::Io(format!("binding loopback listener on port {port}: {e}")))?;

    let (mut stream, _) = listener
        .accept()
        .map_err(|e| Error::Io(format!("accepting authorization callback: {e}")))?;

    let mut buffer = [0u8; 8192];
    let read = stream
        .read(&mut buffer)
        .map_err(|e| Error::Io(format!("reading authorization callback: {e}")))?;
    let request = String::from_utf8_lossy(&buffer[..read]);

    let query = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|target| target.split_once('?'))
        .map(|(_, query)| query.to_string())
        .ok_or_else(|| Error::Auth("authorization callback carried no query".to_string()))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error_description" | "error" if code.is_none() => {
                let _ = stream.write_all(b"HTTP/1.1 200 OK\r\n\r\nAuthorization failed.");
                return Err(Error::Auth(format!("authorization was denied: {value}")));
            }
            _ => {}
        }
    }

    let _ = stream.write_all(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
          <html><body>Authorization complete. You can close this window.</body></html>",
    );

    match (code, state) {
        (Some(code), Some(state)) => Ok((code, state)),
        _ => Err(Error::Auth(
            "authorization callback was missing code or state".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_uses_the_unreserved_alphabet() {
        let verifier = generate_pkce_verifier();
        assert_eq!(verifier.len(), 128);
        assert!(verifier.bytes().all(|b| PKCE_ALPHABET.contains(&b)));
    }

    #[test]
    fn challenge_is_sha256_base64url() {
        // RFC 7636 appendix B reference vector.
        let challenge = pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn state_tokens_differ() {
        let a = generate_state_token();
        let b = generate_state_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn tenant_derived_urls() {
        assert_eq!(
            entra_token_url("my-tenant"),
            "https://login.microsoftonline.com/my-tenant/oauth2/v2.0/token"
        );
        assert_eq!(
            datasphere_token_url("acme", "eu10"),
            "https://acme.authentication.eu10.hana.ondemand.com/oauth/token"
        );
    }
}
