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

//! Wire-level ODP helpers.
//!
//! An initial load announces change tracking with `Prefer:
//! odata.track-changes`; the server echoes `Preference-Applied` when it
//! subscribed. The final page carries a delta link whose `!deltatoken`
//! query option is the cursor for the next delta fetch.

use odata_bridge_client::content::EntitySetContent;
use odata_bridge_core::HttpRequest;
use odata_bridge_core::HttpResponse;
use odata_bridge_core::HttpUrl;

pub const PREFER_HEADER: &str = "Prefer";
pub const TRACK_CHANGES_PREFERENCE: &str = "odata.track-changes";
pub const PREFERENCE_APPLIED_HEADER: &str = "Preference-Applied";

/// Ask the server to open a change-tracking subscription (initial load).
pub fn request_track_changes(request: &mut HttpRequest) {
    request.headers.set(PREFER_HEADER, TRACK_CHANGES_PREFERENCE);
}

/// Whether the server acknowledged the track-changes preference.
pub fn preference_applied(response: &HttpResponse) -> bool {
    response
        .headers
        .get(PREFERENCE_APPLIED_HEADER)
        .is_some_and(|value| value.contains(TRACK_CHANGES_PREFERENCE))
}

/// Append a delta token to an entity-set URL for a delta fetch.
pub fn apply_delta_token(url: &HttpUrl, delta_token: &str) -> HttpUrl {
    let mut with_token = url.clone();
    let option = format!("!deltatoken='{delta_token}'");
    if with_token.query().is_empty() {
        with_token.set_query(option);
    } else {
        with_token.set_query(format!("{}&{option}", with_token.query()));
    }
    with_token
}

/// Extract the delta token from a delta link URL.
pub fn delta_token_from_url(delta_url: &str) -> Option<String> {
    let (_, after) = delta_url.split_once("!deltatoken=")?;
    let after = after.split(['&', '#']).next().unwrap_or(after);
    Some(after.trim_matches('\'').to_string())
}

/// Extract the delta token a response page offers, if any.
pub fn delta_token_from_content(content: &EntitySetContent) -> Option<String> {
    content
        .delta_url()
        .as_deref()
        .and_then(delta_token_from_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use odata_bridge_core::HeaderMap;
    use odata_bridge_core::HttpMethod;

    fn url(s: &str) -> HttpUrl {
        HttpUrl::parse(s).unwrap()
    }

    #[test]
    fn track_changes_preference_round_trip() {
        let mut request = HttpRequest::new(HttpMethod::Get, url("https://h/EntityOfX"));
        request_track_changes(&mut request);
        assert_eq!(request.headers.get("Prefer"), Some("odata.track-changes"));

        let mut headers = HeaderMap::new();
        headers.append("Preference-Applied", "odata.track-changes");
        let response = HttpResponse {
            method: HttpMethod::Get,
            url: url("https://h/EntityOfX"),
            status: 200,
            content_type: "application/json".to_string(),
            headers,
            body: Vec::new(),
        };
        assert!(preference_applied(&response));
    }

    #[test]
    fn delta_tokens_apply_and_parse() {
        let with_token = apply_delta_token(&url("https://h/EntityOfX"), "D20250101");
        assert_eq!(with_token.query(), "!deltatoken='D20250101'");

        let appended = apply_delta_token(&url("https://h/EntityOfX?$top=10"), "D2");
        assert_eq!(appended.query(), "$top=10&!deltatoken='D2'");

        assert_eq!(
            delta_token_from_url("https://h/EntityOfX?!deltatoken='D20250101'").as_deref(),
            Some("D20250101")
        );
        assert_eq!(delta_token_from_url("https://h/EntityOfX"), None);
    }

    #[test]
    fn delta_tokens_surface_from_payloads() {
        let content = EntitySetContent::parse(
            r#"{"d":{"results":[],"__delta":"https://h/EntityOfX?!deltatoken='T9'"}}"#,
        )
        .unwrap();
        assert_eq!(delta_token_from_content(&content).as_deref(), Some("T9"));
    }
}
