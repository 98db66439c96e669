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

//! The read bind state: one table-function invocation's scan over an
//! entity set.
//!
//! Bind probes the service and settles the output schema; init activates
//! the engine's columns and filters and rewrites the URL through the
//! pushdown planner; each scan call drains buffered rows into one output
//! chunk, fetching follow-up pages as needed. Progress comes from the
//! server's total count when it reports one.

use crate::client::ClientContext;
use crate::client::ODataEntitySetClient;
use crate::content::EntitySetContent;
use crate::pushdown::PredicatePushdownHelper;
use crate::pushdown::ResultModifier;
use crate::pushdown::TableFilterSet;
use crate::pushdown::ROW_ID_COLUMN;
use odata_bridge_core::AuthParams;
use odata_bridge_core::DataChunk;
use odata_bridge_core::HttpMethod;
use odata_bridge_core::HttpRequest;
use odata_bridge_core::HttpTransport;
use odata_bridge_core::HttpUrl;
use odata_bridge_core::ODataVersion;
use odata_bridge_core::Result;
use odata_bridge_core::TableType;
use odata_bridge_core::TableValue;
use std::collections::VecDeque;

/// Services whose data URL is not co-located with a `$metadata` sibling;
/// the first page is probed before bind.
fn needs_first_page_probe(url: &str) -> bool {
    url.contains("datasphere") || url.contains("hcs.cloud.sap")
}

/// `/V2/` demo-service layout: metadata often missing, columns inferred
/// from data.
fn is_v2_marker_url(url: &str) -> bool {
    url.contains("/V2/")
}

/// Per-invocation scan state.
pub struct ODataReadBindData {
    context: ClientContext,
    client: ODataEntitySetClient,
    pushdown: Option<PredicatePushdownHelper>,
    /// Column names inferred from a first-page probe, when metadata alone
    /// was not trusted.
    extracted_column_names: Vec<String>,
    all_names: Vec<String>,
    all_types: Vec<TableType>,
    schema_resolved: bool,
    active_column_ids: Vec<usize>,
    activated_to_original: Vec<usize>,
    row_buffer: VecDeque<Vec<TableValue>>,
    first_page_cached: bool,
    has_next_page: bool,
    progress_total: Option<u64>,
    progress_rows_emitted: u64,
}

impl ODataReadBindData {
    /// Bind to an entity-set URL.
    ///
    /// Datasphere-pattern and `/V2/` URLs get a pre-bind GET of the first
    /// page: the `@odata.context` (when present) is stored for metadata
    /// access, and column names are inferred from the first row. A response
    /// that turns out to be a service document (`{name, url}` columns) is
    /// discarded in favor of metadata.
    pub fn from_entity_set_root(
        context: &ClientContext,
        entity_set_url: &str,
        auth: AuthParams,
    ) -> Result<Self> {
        let url = HttpUrl::parse(entity_set_url)?;
        let mut client = ODataEntitySetClient::new(context, url.clone(), auth.clone());

        let is_datasphere = needs_first_page_probe(entity_set_url);
        let is_v2 = is_v2_marker_url(entity_set_url);
        if is_v2 {
            client.set_version(ODataVersion::V2);
            tracing::debug!(target: "odata.read", "set version V2 from URL marker");
        }

        let mut extracted_column_names = Vec::new();
        if is_datasphere || is_v2 {
            match probe_first_page(context, &url, &auth) {
                Ok(Some(content)) => {
                    if let Some(context_url) = content.metadata_context_url() {
                        let stripped = context_url
                            .split_once('#')
                            .map_or(context_url.as_str(), |(base, _)| base);
                        if is_datasphere && !stripped.is_empty() {
                            if let Ok(merged) =
                                HttpUrl::merge_with_base_if_relative(&url, stripped)
                            {
                                client.set_metadata_context_url(merged.to_string());
                            }
                            if let Some(name) = entity_set_name_from_context(&context_url) {
                                client.set_entity_set_name(name);
                            }
                        }
                    }

                    extracted_column_names = content.first_row_column_names();

                    // A service document lists {name, url}; fall back to
                    // metadata and pick the entity name from its entries.
                    if extracted_column_names == ["name", "url"] {
                        tracing::debug!(
                            target: "odata.read",
                            "probe hit a service document, deferring to metadata"
                        );
                        extracted_column_names.clear();
                        if let Some(name) = entity_name_from_service_document(&content, &url) {
                            client.set_entity_set_name(name);
                        }
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        target: "odata.read",
                        "first-page probe failed, falling back to metadata: {error}"
                    );
                }
            }
        }

        Ok(Self {
            context: context.clone(),
            client,
            pushdown: None,
            extracted_column_names,
            all_names: Vec::new(),
            all_types: Vec::new(),
            schema_resolved: false,
            active_column_ids: Vec::new(),
            activated_to_original: Vec::new(),
            row_buffer: VecDeque::new(),
            first_page_cached: false,
            has_next_page: false,
            progress_total: None,
            progress_rows_emitted: 0,
        })
    }

    /// Settle `all_names`/`all_types`, aligning inferred columns with
    /// metadata types by name. A material size mismatch decouples the
    /// reader from the metadata: everything becomes text.
    fn resolve_schema(&mut self) -> Result<()> {
        if self.schema_resolved {
            return Ok(());
        }

        if self.extracted_column_names.is_empty() {
            let schema = self.client.result_schema()?;
            self.all_names = schema.iter().map(|(name, _)| name.clone()).collect();
            self.all_types = schema.into_iter().map(|(_, ty)| ty).collect();
            self.schema_resolved = true;
            return Ok(());
        }

        self.all_names = self.extracted_column_names.clone();
        match self.client.result_schema() {
            Ok(schema) if schema.len() == self.all_names.len() => {
                self.all_types = self
                    .all_names
                    .iter()
                    .map(|name| {
                        schema
                            .iter()
                            .find(|(metadata_name, _)| metadata_name == name)
                            .map(|(_, ty)| ty.clone())
                            .unwrap_or(TableType::Text)
                    })
                    .collect();
            }
            Ok(schema) => {
                tracing::info!(
                    target: "odata.read",
                    "metadata column count ({}) differs from inferred ({}); using text columns",
                    schema.len(),
                    self.all_names.len()
                );
                self.all_types = vec![TableType::Text; self.all_names.len()];
            }
            Err(error) => {
                tracing::info!(
                    target: "odata.read",
                    "metadata unavailable ({error}); using text columns for inferred schema"
                );
                self.all_types = vec![TableType::Text; self.all_names.len()];
            }
        }
        self.schema_resolved = true;
        Ok(())
    }

    /// Output column names; `all` ignores activation.
    pub fn result_names(&mut self, all: bool) -> Result<Vec<String>> {
        self.resolve_schema()?;
        if all || self.active_column_ids.is_empty() {
            return Ok(self.all_names.clone());
        }
        Ok(self
            .active_column_ids
            .iter()
            .filter(|&&id| id != ROW_ID_COLUMN)
            .filter_map(|&id| self.all_names.get(id).cloned())
            .collect())
    }

    /// Output column types; `all` ignores activation.
    pub fn result_types(&mut self, all: bool) -> Result<Vec<TableType>> {
        self.resolve_schema()?;
        if all || self.active_column_ids.is_empty() {
            return Ok(self.all_types.clone());
        }
        Ok(self
            .active_column_ids
            .iter()
            .filter(|&&id| id != ROW_ID_COLUMN)
            .filter_map(|&id| self.all_types.get(id).cloned())
            .collect())
    }

    /// Projection pushdown: the engine's activated column ids (original
    /// schema indexes, row-id sentinel allowed).
    pub fn activate_columns(&mut self, column_ids: &[usize]) -> Result<()> {
        tracing::debug!(target: "odata.read", "activating columns {column_ids:?}");
        self.active_column_ids = column_ids.to_vec();
        self.activated_to_original = column_ids.to_vec();

        self.resolve_schema()?;
        let names = self.all_names.clone();
        let mapping = self.activated_to_original.clone();
        let helper = self.pushdown_helper()?;
        helper.set_column_name_resolver(move |activated| {
            mapping
                .get(activated)
                .and_then(|&original| names.get(original))
                .cloned()
        });
        helper.consume_column_selection(column_ids);
        Ok(())
    }

    /// Filter pushdown; filters are keyed by activated column index.
    pub fn add_filters(&mut self, filters: &TableFilterSet) -> Result<()> {
        if filters.is_empty() {
            return Ok(());
        }
        self.pushdown_helper()?.consume_filters(filters);
        Ok(())
    }

    pub fn add_result_modifiers(&mut self, modifiers: &[ResultModifier]) -> Result<()> {
        if modifiers.is_empty() {
            return Ok(());
        }
        self.pushdown_helper()?.consume_result_modifiers(modifiers);
        Ok(())
    }

    /// Direct access to the planner (named `top`/`skip` options go through
    /// here at bind time).
    pub fn pushdown_helper(&mut self) -> Result<&mut PredicatePushdownHelper> {
        if self.pushdown.is_none() {
            self.resolve_schema()?;
            let mut helper = PredicatePushdownHelper::new(self.all_names.clone());
            let schema: Vec<(String, TableType)> = self
                .all_names
                .iter()
                .cloned()
                .zip(self.all_types.iter().cloned())
                .collect();
            helper.set_complex_columns_from_schema(&schema);
            if let Some(version) = self.client.version() {
                helper.set_version(version);
            }
            self.pushdown = Some(helper);
        }
        Ok(self.pushdown.as_mut().expect("just created"))
    }

    /// Rewrite the client URL with the accumulated query options. The
    /// protocol version and metadata state carry over to the new client so
    /// no metadata is re-fetched.
    pub fn update_url_from_pushdown(&mut self) -> Result<()> {
        let base_url = self.client.url().clone();
        let updated_url = self.pushdown_helper()?.apply_to_url(&base_url);
        tracing::debug!(target: "odata.read", "scan URL: {updated_url}");

        let mut replacement = ODataEntitySetClient::new(
            &self.context,
            updated_url,
            self.client.auth().clone(),
        );
        if let Some(version) = self.client.version() {
            replacement.set_version(version);
        }
        if let Some(context_url) = self.client.stored_metadata_context_url() {
            replacement.set_metadata_context_url(context_url);
        }
        if let Some(name) = self.client.entity_set_name_override() {
            replacement.set_entity_set_name(name);
        }
        self.client = replacement;
        Ok(())
    }

    /// Fetch and buffer the first page. Called once per scan; later calls
    /// are no-ops.
    pub fn prefetch_first_page(&mut self) -> Result<()> {
        if self.first_page_cached {
            return Ok(());
        }
        tracing::debug!(target: "odata.read", "prefetching first page");

        let names = self.result_names(false)?;
        let types = self.result_types(false)?;

        let Some(response) = self.client.get(false)? else {
            self.first_page_cached = true;
            self.has_next_page = false;
            return Ok(());
        };

        if response.version() == ODataVersion::V4 {
            if let Some(total) = response.total_count() {
                self.progress_total = Some(total);
                tracing::info!(target: "odata.read", "service reported {total} total rows");
            }
        }

        let rows = response.content.to_rows(&names, &types)?;
        let has_next = response.next_url().is_some();
        self.row_buffer.extend(rows);
        self.has_next_page = has_next;
        self.first_page_cached = true;
        Ok(())
    }

    /// Deliver up to one chunk of rows, fetching pages until the chunk can
    /// fill or pagination ends. Returns the number of rows emitted.
    pub fn fetch_next(&mut self, output: &mut DataChunk) -> Result<usize> {
        if !self.first_page_cached {
            self.prefetch_first_page()?;
        }

        let names = self.result_names(false)?;
        let types = self.result_types(false)?;
        let target = output.capacity();

        while self.row_buffer.len() < target && self.has_next_page {
            let Some(response) = self.client.get(true)? else {
                self.has_next_page = false;
                break;
            };
            if response.version() == ODataVersion::V4 && self.progress_total.is_none() {
                self.progress_total = response.total_count();
            }
            let rows = response.content.to_rows(&names, &types)?;
            let has_next = response.next_url().is_some();
            self.row_buffer.extend(rows);
            self.has_next_page = has_next;
        }

        output.reset();
        let to_emit = self.row_buffer.len().min(target);
        for _ in 0..to_emit {
            let row = self.row_buffer.pop_front().expect("buffer checked");
            let mut out_row = Vec::with_capacity(output.column_count());
            for column in 0..output.column_count() {
                out_row.push(row.get(column).cloned().unwrap_or(TableValue::Null));
            }
            output.push_row(out_row);
        }

        self.progress_rows_emitted += to_emit as u64;
        if let Some(total) = self.progress_total {
            tracing::debug!(
                target: "odata.read",
                "progress {:.1}% ({}/{total})",
                self.progress_fraction(),
                self.progress_rows_emitted
            );
        }
        Ok(to_emit)
    }

    /// Whether another scan call could produce rows.
    pub fn has_more(&self) -> bool {
        !self.row_buffer.is_empty() || !self.first_page_cached || self.has_next_page
    }

    /// Percentage of the scan completed, or -1 when the server never
    /// reported a total. Buffered rows count as seen.
    pub fn progress_fraction(&self) -> f64 {
        let Some(total) = self.progress_total else {
            return -1.0;
        };
        if total == 0 {
            return -1.0;
        }
        let seen = self.progress_rows_emitted + self.row_buffer.len() as u64;
        (100.0 * seen as f64 / total as f64).min(100.0)
    }

    pub fn client(&self) -> &ODataEntitySetClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut ODataEntitySetClient {
        &mut self.client
    }
}

/// Plain GET of the entity-set URL, no OData version headers, to peek at
/// the payload shape.
fn probe_first_page(
    context: &ClientContext,
    url: &HttpUrl,
    auth: &AuthParams,
) -> Result<Option<EntitySetContent>> {
    let mut request = HttpRequest::new(HttpMethod::Get, url.clone());
    request.apply_auth(auth);
    request.headers.set("Accept", "application/json");

    let response = context.transport.send(&request)?;
    if response.status != 200 {
        tracing::warn!(
            target: "odata.read",
            "first-page probe answered {}",
            response.status
        );
        return Ok(None);
    }
    Ok(Some(EntitySetContent::parse(&response.text()?)?))
}

/// `$metadata#EntitySet(...)`-style context fragments name the entity set.
fn entity_set_name_from_context(context_url: &str) -> Option<String> {
    let fragment = context_url.split_once('#')?.1;
    let name = fragment.split_once('(').map_or(fragment, |(head, _)| head);
    let name = name.strip_suffix("/$entity").unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}

/// Pick the entity name out of a service document: the entry matching the
/// URL's last path segment, else the first entry.
fn entity_name_from_service_document(
    content: &EntitySetContent,
    url: &HttpUrl,
) -> Option<String> {
    let hint = url.last_path_segment();
    let rows = content.rows_json().ok()?;

    let mut first = None;
    for row in rows {
        let name = row.get("name").and_then(serde_json::Value::as_str);
        let row_url = row.get("url").and_then(serde_json::Value::as_str);
        if !hint.is_empty() && (name == Some(hint) || row_url == Some(hint)) {
            return name.or(row_url).map(str::to_string);
        }
        if first.is_none() {
            first = name.map(str::to_string);
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_fragments_yield_entity_names() {
        assert_eq!(
            entity_set_name_from_context("https://h/svc/$metadata#People"),
            Some("People".to_string())
        );
        assert_eq!(
            entity_set_name_from_context("$metadata#People('rw')/$entity"),
            Some("People".to_string())
        );
        assert_eq!(entity_set_name_from_context("no-fragment"), None);
    }

    #[test]
    fn probe_marker_urls() {
        assert!(needs_first_page_probe("https://x.datasphere.example/assets"));
        assert!(needs_first_page_probe("https://t.eu10.hcs.cloud.sap/api"));
        assert!(!needs_first_page_probe("https://services.odata.org/TripPin"));
        assert!(is_v2_marker_url("https://services.odata.org/V2/Northwind"));
    }
}
