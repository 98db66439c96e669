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
use odata_bridge_core::Result;
use time::macros::format_description;
use time::OffsetDateTime;
use time::PrimitiveDateTime;

/// Subscription status values as persisted.
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_TERMINATED: &str = "terminated";
pub const STATUS_EXPIRED: &str = "expired";
pub const STATUS_ERROR: &str = "error";

/// One ODP subscription row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdpSubscription {
    /// `YYYYMMDD_HHMMSS_` + cleaned URL.
    pub subscription_id: String,
    pub service_url: String,
    pub entity_set_name: String,
    pub secret_name: String,
    /// Empty until the initial load completes.
    pub delta_token: String,
    pub created_at: OffsetDateTime,
    pub last_updated: OffsetDateTime,
    /// One of the `STATUS_*` constants.
    pub subscription_status: String,
    /// Whether the server acknowledged `Prefer: odata.track-changes`.
    pub preference_applied: bool,
}

impl OdpSubscription {
    /// Fresh active subscription with a generated id.
    pub fn new(
        service_url: impl Into<String>,
        entity_set_name: impl Into<String>,
        secret_name: impl Into<String>,
    ) -> Self {
        let service_url = service_url.into();
        let now = OffsetDateTime::now_utc();
        Self {
            subscription_id: generate_subscription_id(&service_url, now),
            service_url,
            entity_set_name: entity_set_name.into(),
            secret_name: {
                let name = secret_name.into();
                if name.is_empty() {
                    "default".to_string()
                } else {
                    name
                }
            },
            delta_token: String::new(),
            created_at: now,
            last_updated: now,
            subscription_status: STATUS_ACTIVE.to_string(),
            preference_applied: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscription_status == STATUS_ACTIVE
    }
}

/// Operations recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdpOperation {
    InitialLoad,
    DeltaFetch,
    Terminate,
}

impl OdpOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitialLoad => "initial_load",
            Self::DeltaFetch => "delta_fetch",
            Self::Terminate => "terminate",
        }
    }
}

/// One audit row. `audit_id` is store-assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OdpAuditEntry {
    pub audit_id: i64,
    pub subscription_id: String,
    pub operation_type: String,
    pub request_timestamp: OffsetDateTime,
    pub response_timestamp: Option<OffsetDateTime>,
    pub request_url: String,
    pub http_status_code: Option<u16>,
    pub rows_fetched: i64,
    pub package_size_bytes: i64,
    pub delta_token_before: String,
    pub delta_token_after: String,
    pub error_message: String,
    pub duration_ms: Option<i64>,
}

impl OdpAuditEntry {
    pub fn new(subscription_id: impl Into<String>, operation: OdpOperation) -> Self {
        Self {
            audit_id: 0,
            subscription_id: subscription_id.into(),
            operation_type: operation.as_str().to_string(),
            request_timestamp: OffsetDateTime::now_utc(),
            response_timestamp: None,
            request_url: String::new(),
            http_status_code: None,
            rows_fetched: 0,
            package_size_bytes: 0,
            delta_token_before: String::new(),
            delta_token_after: String::new(),
            error_message: String::new(),
            duration_ms: None,
        }
    }
}

/// `YYYYMMDD_HHMMSS_` + cleaned URL.
pub fn generate_subscription_id(service_url: &str, now: OffsetDateTime) -> String {
    let stamp_format = format_description!("[year][month][day]_[hour][minute][second]");
    let stamp = now
        .format(&stamp_format)
        .unwrap_or_else(|_| "00000000_000000".to_string());
    format!("{stamp}_{}", clean_url_for_id(service_url))
}

/// Strip the scheme and replace everything outside `[A-Za-z0-9_]` with
/// underscores.
pub fn clean_url_for_id(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// ODP entity sets are conventionally named `EntityOf…` or `FactsOf…`; URLs
/// without such a segment are not ODP services.
pub fn is_valid_odp_url(url: &str) -> bool {
    let path = url
        .split_once("://")
        .map_or(url, |(_, rest)| rest)
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    path.split('/')
        .any(|segment| segment.starts_with("EntityOf") || segment.starts_with("FactsOf"))
}

/// Require an ODP URL and return its entity-set segment.
pub fn odp_entity_set_name(url: &str) -> Result<String> {
    let path = url
        .split_once("://")
        .map_or(url, |(_, rest)| rest)
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    path.split('/')
        .find(|segment| segment.starts_with("EntityOf") || segment.starts_with("FactsOf"))
        .map(str::to_string)
        .ok_or_else(|| {
            Error::invalid_input(format!(
                "'{url}' is not an ODP URL (no EntityOf*/FactsOf* segment)"
            ))
        })
}

const TIMESTAMP_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Render a timestamp the way the subscription tables store it.
pub fn timestamp_to_string(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| "1970-01-01 00:00:00".to_string())
}

/// Parse a stored timestamp (UTC assumed).
pub fn timestamp_from_string(text: &str) -> Result<OffsetDateTime> {
    PrimitiveDateTime::parse(text, &TIMESTAMP_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| Error::parse(format!("invalid stored timestamp '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn subscription_ids_stamp_and_clean() {
        let id = generate_subscription_id(
            "https://host:443/sap/opu/odata/EntityOfOrders",
            datetime!(2025-02-03 04:05:06 UTC),
        );
        assert_eq!(id, "20250203_040506_host_443_sap_opu_odata_EntityOfOrders");
    }

    #[test]
    fn odp_urls_need_their_marker_segment() {
        assert!(is_valid_odp_url("https://h/sap/EntityOfSalesOrder"));
        assert!(is_valid_odp_url("https://h/FactsOfRevenue?$top=1"));
        assert!(!is_valid_odp_url("https://h/svc/People"));

        assert_eq!(
            odp_entity_set_name("https://h/sap/EntityOfSalesOrder").unwrap(),
            "EntityOfSalesOrder"
        );
        assert!(odp_entity_set_name("https://h/svc/People").is_err());
    }

    #[test]
    fn timestamps_round_trip() {
        let moment = datetime!(2025-06-07 08:09:10 UTC);
        let text = timestamp_to_string(moment);
        assert_eq!(text, "2025-06-07 08:09:10");
        assert_eq!(timestamp_from_string(&text).unwrap(), moment);
    }

    #[test]
    fn empty_secret_names_default() {
        let subscription = OdpSubscription::new("https://h/EntityOfX", "EntityOfX", "");
        assert_eq!(subscription.secret_name, "default");
        assert!(subscription.is_active());
        assert!(subscription.delta_token.is_empty());
    }
}
