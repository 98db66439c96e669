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

//! OData JSON payloads.
//!
//! Version auto-detection from payload shape, row extraction for both wire
//! formats, pagination/count/context/delta link handling, and typed value
//! deserialization against a table schema.
//!
//! v4 entity sets look like
//! `{"@odata.context":…, "value":[…], "@odata.nextLink":…, "@odata.count":…}`;
//! v2 wraps everything in `d`, either as a bare array or as
//! `{"d":{"results":[…], "__next":…, "__count":…}}`. Next/count/delta
//! markers are accepted at the root and under `d`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use odata_bridge_core::Error;
use odata_bridge_core::ODataVersion;
use odata_bridge_core::Result;
use odata_bridge_core::TableType;
use odata_bridge_core::TableValue;
use rust_decimal::Decimal;
use serde_json::Value;

pub mod json_path;
mod value;

pub use value::deserialize_json_value;

/// Whether a content type declares JSON.
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("application/json")
}

/// Detect the protocol version from a payload's top-level shape.
pub fn detect_version(root: &Value) -> ODataVersion {
    let Some(object) = root.as_object() else {
        return ODataVersion::V4;
    };

    if object.get("value").is_some_and(Value::is_array) {
        return ODataVersion::V4;
    }

    if let Some(d) = object.get("d") {
        if d.is_array() {
            return ODataVersion::V2;
        }
        if let Some(d_object) = d.as_object() {
            if d_object.get("results").is_some_and(Value::is_array)
                || d_object.get("__metadata").is_some_and(Value::is_object)
            {
                return ODataVersion::V2;
            }
            // A 'd' wrapper with unknown innards is still v2.
            return ODataVersion::V2;
        }
    }

    if object.get("@odata.context").is_some() {
        return ODataVersion::V4;
    }

    ODataVersion::V4
}

/// One parsed entity-set response payload.
#[derive(Debug, Clone)]
pub struct EntitySetContent {
    root: Value,
    version: ODataVersion,
}

impl EntitySetContent {
    /// Parse a JSON payload, auto-detecting the version.
    pub fn parse(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| Error::parse(format!("OData response JSON: {e}")))?;
        let version = detect_version(&root);
        Ok(Self { root, version })
    }

    pub fn version(&self) -> ODataVersion {
        self.version
    }

    /// Override the detected version (callers that already know better).
    pub fn set_version(&mut self, version: ODataVersion) {
        self.version = version;
    }

    /// The row array for the detected version.
    ///
    /// # Errors
    ///
    /// `Error::Parse` when the payload lacks the version's row container.
    pub fn rows_json(&self) -> Result<&Vec<Value>> {
        match self.version {
            ODataVersion::V2 => {
                let d = self
                    .root
                    .get("d")
                    .ok_or_else(|| Error::parse("no 'd' wrapper in OData v2 response"))?;
                if let Some(rows) = d.as_array() {
                    return Ok(rows);
                }
                d.get("results")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        Error::parse(
                            "'d' element is neither an array nor contains a 'results' array",
                        )
                    })
            }
            ODataVersion::V4 => self
                .root
                .get("value")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::parse("no 'value' array in OData v4 response")),
        }
    }

    /// Next-page link: v4 `@odata.nextLink`, v2 `__next`. May be relative.
    pub fn next_url(&self) -> Option<String> {
        self.link_marker("@odata.nextLink", "__next")
    }

    /// Delta link carrying the next change-tracking token, when the server
    /// offers one: v4 `@odata.deltaLink`, v2 `__delta`.
    pub fn delta_url(&self) -> Option<String> {
        self.link_marker("@odata.deltaLink", "__delta")
    }

    fn link_marker(&self, v4_key: &str, v2_key: &str) -> Option<String> {
        for key in [v4_key, v2_key] {
            if let Some(link) = self.root.get(key).and_then(Value::as_str) {
                return Some(link.to_string());
            }
            if let Some(link) = self
                .root
                .get("d")
                .and_then(|d| d.get(key))
                .and_then(Value::as_str)
            {
                return Some(link.to_string());
            }
        }
        None
    }

    /// Server-reported total count: v4 `@odata.count`, v2 `__count`
    /// (typically a string, under `d`).
    pub fn total_count(&self) -> Option<u64> {
        let candidates = [
            self.root.get("@odata.count"),
            self.root.get("d").and_then(|d| d.get("__count")),
            self.root.get("__count"),
        ];
        candidates.into_iter().flatten().find_map(|value| {
            value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        })
    }

    /// The `@odata.context` URL, fragment included, when present.
    pub fn metadata_context_url(&self) -> Option<String> {
        self.root
            .get("@odata.context")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Materialize all rows against an explicit output schema.
    ///
    /// Missing properties become NULL; per-field deserialization failures
    /// log and become NULL rather than aborting the row.
    pub fn to_rows(
        &self,
        names: &[String],
        types: &[TableType],
    ) -> Result<Vec<Vec<TableValue>>> {
        let json_rows = self.rows_json()?;
        let mut rows = Vec::with_capacity(json_rows.len());

        for json_row in json_rows {
            let mut row = Vec::with_capacity(names.len());
            for (name, column_type) in names.iter().zip(types.iter()) {
                let cell = match json_row.get(name) {
                    None => TableValue::Null,
                    Some(value) => match deserialize_json_value(value, column_type) {
                        Ok(cell) => cell,
                        Err(error) => {
                            tracing::error!(
                                target: "odata.content",
                                "failed to deserialize column '{name}': {error}"
                            );
                            TableValue::Null
                        }
                    },
                };
                row.push(cell);
            }
            rows.push(row);
        }

        Ok(rows)
    }

    /// Column names of the first row, metadata keys (`__*`) excluded, in
    /// object order. Used when a service's schema must be inferred from
    /// data.
    pub fn first_row_column_names(&self) -> Vec<String> {
        self.rows_json()
            .ok()
            .and_then(|rows| rows.first())
            .and_then(Value::as_object)
            .map(|object| {
                object
                    .keys()
                    .filter(|key| !key.starts_with("__"))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One entry of a service document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySetReference {
    pub name: String,
    pub url: String,
}

/// A parsed service document listing entity sets.
#[derive(Debug, Clone)]
pub struct ServiceContent {
    content: EntitySetContent,
}

impl ServiceContent {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            content: EntitySetContent::parse(text)?,
        })
    }

    pub fn version(&self) -> ODataVersion {
        self.content.version()
    }

    pub fn metadata_context_url(&self) -> Option<String> {
        self.content.metadata_context_url()
    }

    /// The entity-set references. Entries whose `kind` is present and not
    /// `EntitySet` (singletons, function imports) are skipped.
    pub fn entity_sets(&self) -> Result<Vec<EntitySetReference>> {
        let rows = self.content.rows_json()?;
        let mut references = Vec::with_capacity(rows.len());

        for row in rows {
            if let Some(kind) = row.get("kind").and_then(Value::as_str) {
                if kind != "EntitySet" {
                    continue;
                }
            }
            let name = row
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::parse("service document entry without 'name'"))?;
            let url = row
                .get("url")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::parse("service document entry without 'url'"))?;
            references.push(EntitySetReference {
                name: name.to_string(),
                url: url.to_string(),
            });
        }

        Ok(references)
    }
}

/// Decode an OData binary property (base64 in JSON); malformed base64 is
/// kept as raw bytes.
pub(crate) fn decode_binary(text: &str) -> Vec<u8> {
    BASE64
        .decode(text)
        .unwrap_or_else(|_| text.as_bytes().to_vec())
}

/// Parse a decimal from a JSON number or string.
pub(crate) fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => number.to_string().parse().ok(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_value_array_is_detected() {
        let root: Value = serde_json::from_str(r#"{"value":[{"a":1}]}"#).unwrap();
        assert_eq!(detect_version(&root), ODataVersion::V4);
    }

    #[test]
    fn v2_shapes_are_detected() {
        for payload in [
            r#"{"d":[{"a":1}]}"#,
            r#"{"d":{"results":[{"a":1}]}}"#,
            r#"{"d":{"__metadata":{"uri":"x"}}}"#,
            r#"{"d":{"something":"else"}}"#,
        ] {
            let root: Value = serde_json::from_str(payload).unwrap();
            assert_eq!(detect_version(&root), ODataVersion::V2, "payload: {payload}");
        }
    }

    #[test]
    fn context_marker_means_v4() {
        let root: Value =
            serde_json::from_str(r#"{"@odata.context":"$metadata#People"}"#).unwrap();
        assert_eq!(detect_version(&root), ODataVersion::V4);
    }

    #[test]
    fn unknown_shapes_default_to_v4() {
        let root: Value = serde_json::from_str(r#"{"unrelated":true}"#).unwrap();
        assert_eq!(detect_version(&root), ODataVersion::V4);
    }

    #[test]
    fn v4_rows_and_links() {
        let content = EntitySetContent::parse(
            r#"{"@odata.context":"$metadata#People",
                "value":[{"UserName":"rw"},{"UserName":"sm"}],
                "@odata.nextLink":"People?$skip=2",
                "@odata.count":42}"#,
        )
        .unwrap();
        assert_eq!(content.version(), ODataVersion::V4);
        assert_eq!(content.rows_json().unwrap().len(), 2);
        assert_eq!(content.next_url().as_deref(), Some("People?$skip=2"));
        assert_eq!(content.total_count(), Some(42));
        assert_eq!(
            content.metadata_context_url().as_deref(),
            Some("$metadata#People")
        );
    }

    #[test]
    fn v2_nested_next_and_count_are_found() {
        let content = EntitySetContent::parse(
            r#"{"d":{"results":[{"Id":1}],
                   "__next":"People?$skiptoken=P50",
                   "__count":"80"}}"#,
        )
        .unwrap();
        assert_eq!(content.version(), ODataVersion::V2);
        assert_eq!(content.rows_json().unwrap().len(), 1);
        assert_eq!(content.next_url().as_deref(), Some("People?$skiptoken=P50"));
        assert_eq!(content.total_count(), Some(80));
    }

    #[test]
    fn v2_bare_array_rows() {
        let content = EntitySetContent::parse(r#"{"d":[{"Id":1},{"Id":2}]}"#).unwrap();
        assert_eq!(content.rows_json().unwrap().len(), 2);
        assert!(content.next_url().is_none());
    }

    #[test]
    fn delta_links_are_surfaced() {
        let v4 = EntitySetContent::parse(
            r#"{"value":[],"@odata.deltaLink":"Entity?!deltatoken='D1'"}"#,
        )
        .unwrap();
        assert_eq!(
            v4.delta_url().as_deref(),
            Some("Entity?!deltatoken='D1'")
        );

        let v2 = EntitySetContent::parse(
            r#"{"d":{"results":[],"__delta":"Entity?!deltatoken='D2'"}}"#,
        )
        .unwrap();
        assert_eq!(v2.delta_url().as_deref(), Some("Entity?!deltatoken='D2'"));
    }

    #[test]
    fn to_rows_fills_missing_columns_with_null() {
        let content =
            EntitySetContent::parse(r#"{"value":[{"UserName":"rw","Age":42},{"UserName":"sm"}]}"#)
                .unwrap();
        let names = vec!["UserName".to_string(), "Age".to_string()];
        let types = vec![TableType::Text, TableType::Int32];
        let rows = content.to_rows(&names, &types).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1], TableValue::Int32(42));
        assert_eq!(rows[1][1], TableValue::Null);
    }

    #[test]
    fn bad_cells_degrade_to_null() {
        let content =
            EntitySetContent::parse(r#"{"value":[{"Age":"not-a-number"}]}"#).unwrap();
        let rows = content
            .to_rows(&["Age".to_string()], &[TableType::Int32])
            .unwrap();
        assert_eq!(rows[0][0], TableValue::Null);
    }

    #[test]
    fn first_row_column_names_skip_metadata_keys() {
        let content = EntitySetContent::parse(
            r#"{"d":{"results":[{"__metadata":{"uri":"x"},"Id":1,"Name":"a"}]}}"#,
        )
        .unwrap();
        let names = content.first_row_column_names();
        assert_eq!(names, vec!["Id".to_string(), "Name".to_string()]);
    }

    #[test]
    fn service_documents_list_entity_sets() {
        let service = ServiceContent::parse(
            r#"{"@odata.context":"$metadata",
                "value":[
                  {"name":"People","kind":"EntitySet","url":"People"},
                  {"name":"Me","kind":"Singleton","url":"Me"},
                  {"name":"Airlines","url":"Airlines"}]}"#,
        )
        .unwrap();
        let sets = service.entity_sets().unwrap();
        assert_eq!(
            sets,
            vec![
                EntitySetReference {
                    name: "People".to_string(),
                    url: "People".to_string()
                },
                EntitySetReference {
                    name: "Airlines".to_string(),
                    url: "Airlines".to_string()
                },
            ]
        );
    }
}
