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

//! Predicate, projection, and limit pushdown.
//!
//! The host engine hands over activated column ids, a table filter tree,
//! and limit/offset; the planner renders them into OData query options and
//! rewrites the entity-set URL. Filters that cannot be translated are
//! dropped (and logged) so they run engine-side; only structural misuse
//! raises.

use odata_bridge_core::HttpUrl;
use odata_bridge_core::ODataVersion;
use odata_bridge_core::Result;
use odata_bridge_core::TableType;
use rust_decimal::Decimal;

/// Column id the engine uses for its synthetic row-id column.
pub const ROW_ID_COLUMN: usize = usize::MAX;

/// Column names some servers reject inside `$select`; projected complex
/// types extend this set at runtime.
const COMPLEX_FIELD_NAMES: [&str; 4] = ["Emails", "AddressInfo", "HomeAddress", "Features"];

/// Longest constant an OData filter literal may carry before the filter is
/// dropped (URL length protection).
const MAX_FILTER_CONSTANT_LEN: usize = 1000;

/// Constant in a pushed-down comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterConstant {
    Text(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl CompareOp {
    fn odata_operator(self) -> &'static str {
        match self {
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::LessThan => "lt",
            Self::LessThanOrEqual => "le",
            Self::GreaterThan => "gt",
            Self::GreaterThanOrEqual => "ge",
        }
    }
}

/// A scalar filter on one column, as the engine pushes it down.
#[derive(Debug, Clone, PartialEq)]
pub enum TableFilter {
    Comparison {
        op: CompareOp,
        constant: FilterConstant,
    },
    IsNull,
    IsNotNull,
    And(Vec<TableFilter>),
    Or(Vec<TableFilter>),
    /// Best-effort wrapper; unwraps to the inner filter.
    Optional(Box<TableFilter>),
}

/// Filters keyed by activated column index.
#[derive(Debug, Clone, Default)]
pub struct TableFilterSet {
    pub filters: Vec<(usize, TableFilter)>,
}

impl TableFilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: usize, filter: TableFilter) -> Self {
        self.filters.push((column, filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Result modifiers the engine may push down.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultModifier {
    Limit { limit: Option<u64>, offset: Option<u64> },
    OrderBy { expression: String },
}

/// Renders pushdown state into OData query options.
pub struct PredicatePushdownHelper {
    all_column_names: Vec<String>,
    complex_column_names: Vec<String>,
    column_name_resolver: Option<Box<dyn Fn(usize) -> Option<String> + Send>>,
    select_clause: Option<String>,
    filter_clause: Option<String>,
    top_clause: Option<String>,
    skip_clause: Option<String>,
    expand_clause: Option<String>,
    inline_count_enabled: bool,
    skip_token: Option<String>,
    version: ODataVersion,
}

impl PredicatePushdownHelper {
    pub fn new(all_column_names: Vec<String>) -> Self {
        tracing::debug!(
            target: "pushdown",
            "planner created over {} columns",
            all_column_names.len()
        );
        Self {
            all_column_names,
            complex_column_names: Vec::new(),
            column_name_resolver: None,
            select_clause: None,
            filter_clause: None,
            top_clause: None,
            skip_clause: None,
            expand_clause: None,
            inline_count_enabled: false,
            skip_token: None,
            version: ODataVersion::V4,
        }
    }

    /// Names whose projected types are complex (lists/structs); these
    /// suppress `$select` like the well-known field names do.
    pub fn set_complex_columns_from_schema(&mut self, schema: &[(String, TableType)]) {
        self.complex_column_names = schema
            .iter()
            .filter(|(_, column_type)| column_type.is_complex())
            .map(|(name, _)| name.clone())
            .collect();
    }

    /// Bridge activated column indexes back to schema names.
    pub fn set_column_name_resolver(
        &mut self,
        resolver: impl Fn(usize) -> Option<String> + Send + 'static,
    ) {
        self.column_name_resolver = Some(Box::new(resolver));
    }

    pub fn set_version(&mut self, version: ODataVersion) {
        self.version = version;
    }

    pub fn version(&self) -> ODataVersion {
        self.version
    }

    pub fn enable_inline_count(&mut self, enable: bool) {
        self.inline_count_enabled = enable;
    }

    pub fn set_skip_token(&mut self, token: impl Into<String>) {
        self.skip_token = Some(token.into());
    }

    /// Projection pushdown: the engine's activated column ids.
    pub fn consume_column_selection(&mut self, column_ids: &[usize]) {
        self.select_clause = self.build_select_clause(column_ids);
        tracing::debug!(
            target: "pushdown",
            "select clause: {:?}",
            self.select_clause
        );
    }

    /// Filter pushdown.
    pub fn consume_filters(&mut self, filters: &TableFilterSet) {
        if filters.is_empty() {
            self.filter_clause = None;
            return;
        }
        self.filter_clause = self.build_filter_clause(filters);
        tracing::debug!(
            target: "pushdown",
            "filter clause: {:?}",
            self.filter_clause
        );
    }

    pub fn consume_limit(&mut self, limit: u64) {
        self.top_clause = (limit > 0).then(|| format!("$top={limit}"));
    }

    pub fn consume_offset(&mut self, offset: u64) {
        self.skip_clause = (offset > 0).then(|| format!("$skip={offset}"));
    }

    pub fn consume_expand(&mut self, expand: &str) {
        self.expand_clause = (!expand.is_empty()).then(|| format!("$expand={expand}"));
    }

    /// Limits and offsets apply; ORDER BY is recognized but not translated.
    pub fn consume_result_modifiers(&mut self, modifiers: &[ResultModifier]) {
        for modifier in modifiers {
            match modifier {
                ResultModifier::Limit { limit, offset } => {
                    if let Some(limit) = limit {
                        self.consume_limit(*limit);
                    }
                    if let Some(offset) = offset {
                        self.consume_offset(*offset);
                    }
                }
                ResultModifier::OrderBy { expression } => {
                    tracing::debug!(
                        target: "pushdown",
                        "ORDER BY pushdown not supported, skipping '{expression}'"
                    );
                }
            }
        }
    }

    pub fn select_clause(&self) -> Option<&str> {
        self.select_clause.as_deref()
    }

    pub fn filter_clause(&self) -> Option<&str> {
        self.filter_clause.as_deref()
    }

    fn inline_count_clause(&self) -> Option<String> {
        if !self.inline_count_enabled {
            return None;
        }
        Some(match self.version {
            ODataVersion::V2 => "$inlinecount=allpages".to_string(),
            ODataVersion::V4 => "$count=true".to_string(),
        })
    }

    fn skip_token_clause(&self) -> Option<String> {
        let token = self.skip_token.as_ref()?;
        Some(match self.version {
            ODataVersion::V2 => format!("$skiptoken={token}"),
            ODataVersion::V4 => format!("$skip={token}"),
        })
    }

    fn resolve_column_name(&self, column_id: usize) -> Option<String> {
        if let Some(resolver) = &self.column_name_resolver {
            let name = resolver(column_id)?;
            if name.is_empty() {
                return None;
            }
            return Some(name);
        }
        self.all_column_names.get(column_id).cloned()
    }

    fn build_select_clause(&self, column_ids: &[usize]) -> Option<String> {
        if column_ids.is_empty() {
            return None;
        }

        // Selection ids are original schema indexes; the resolver only
        // bridges filter keys (activated indexes).
        let active: Vec<String> = column_ids
            .iter()
            .filter(|&&id| id != ROW_ID_COLUMN)
            .filter_map(|&id| self.all_column_names.get(id).cloned())
            .collect();

        // Full projection: let the service return everything.
        if active.len() == self.all_column_names.len() {
            tracing::debug!(target: "pushdown", "all columns selected, omitting $select");
            return None;
        }

        // Some services reject $select naming complex properties; leave the
        // projection to the engine in that case.
        for name in &active {
            let is_complex = COMPLEX_FIELD_NAMES
                .iter()
                .any(|complex| name == complex || name.starts_with(complex))
                || self.complex_column_names.iter().any(|complex| name == complex);
            if is_complex {
                tracing::debug!(
                    target: "pushdown",
                    "complex field '{name}' activated, omitting $select"
                );
                return None;
            }
        }

        let mut unique: Vec<String> = Vec::with_capacity(active.len());
        for name in active {
            // Path expressions select their base property.
            let base = name
                .find(['.', '[', '"'])
                .map_or(name.as_str(), |pos| &name[..pos]);
            if !unique.iter().any(|existing| existing == base) {
                unique.push(base.to_string());
            }
        }

        if unique.is_empty() {
            return None;
        }
        Some(format!("$select={}", unique.join(",")))
    }

    fn build_filter_clause(&self, filters: &TableFilterSet) -> Option<String> {
        let mut rendered = Vec::new();
        for (column_id, filter) in &filters.filters {
            let Some(column_name) = self.resolve_column_name(*column_id) else {
                tracing::error!(
                    target: "pushdown",
                    "no column name for filter on column {column_id}, dropping"
                );
                continue;
            };
            match self.translate_filter(filter, &column_name) {
                Ok(Some(text)) => rendered.push(text),
                Ok(None) => {
                    tracing::debug!(
                        target: "pushdown",
                        "filter on '{column_name}' not translatable, left to the engine"
                    );
                }
                Err(error) => {
                    tracing::error!(
                        target: "pushdown",
                        "filter on '{column_name}' failed to translate: {error}"
                    );
                }
            }
        }

        if rendered.is_empty() {
            return None;
        }
        Some(format!("$filter={}", rendered.join(" and ")))
    }

    /// Translate one filter. `Ok(None)` means the filter is dropped.
    fn translate_filter(
        &self,
        filter: &TableFilter,
        column_name: &str,
    ) -> Result<Option<String>> {
        match filter {
            TableFilter::Comparison { op, constant } => {
                Ok(self.translate_comparison(*op, constant, column_name))
            }
            TableFilter::IsNull => Ok(Some(format!("{column_name} eq null"))),
            TableFilter::IsNotNull => Ok(Some(format!("{column_name} ne null"))),
            TableFilter::And(children) => self.translate_conjunction(children, " and ", column_name),
            TableFilter::Or(children) => self.translate_conjunction(children, " or ", column_name),
            TableFilter::Optional(inner) => self.translate_filter(inner, column_name),
        }
    }

    fn translate_conjunction(
        &self,
        children: &[TableFilter],
        joiner: &str,
        column_name: &str,
    ) -> Result<Option<String>> {
        let mut parts = Vec::with_capacity(children.len());
        for child in children {
            match self.translate_filter(child, column_name)? {
                Some(text) => parts.push(text),
                None => return Ok(None),
            }
        }
        if parts.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("({})", parts.join(joiner))))
    }

    fn translate_comparison(
        &self,
        op: CompareOp,
        constant: &FilterConstant,
        column_name: &str,
    ) -> Option<String> {
        let literal = match constant {
            FilterConstant::Text(text) => {
                if text.is_empty() {
                    tracing::debug!(
                        target: "pushdown",
                        "dropping empty-string comparison on '{column_name}'"
                    );
                    return None;
                }
                if text.len() > MAX_FILTER_CONSTANT_LEN {
                    tracing::debug!(
                        target: "pushdown",
                        "dropping over-long constant ({} chars) on '{column_name}'",
                        text.len()
                    );
                    return None;
                }
                match self.version {
                    // v2 doubles internal single quotes.
                    ODataVersion::V2 => format!("'{}'", text.replace('\'', "''")),
                    ODataVersion::V4 => format!("'{text}'"),
                }
            }
            FilterConstant::Integer(value) => value.to_string(),
            FilterConstant::Float(value) => value.to_string(),
            FilterConstant::Decimal(value) => value.to_string(),
            FilterConstant::Boolean(value) => value.to_string(),
        };

        Some(format!("{column_name} {} {literal}", op.odata_operator()))
    }

    /// Rewrite an entity-set URL with the accumulated query options.
    ///
    /// Existing query parameters are parsed (first occurrence wins), then
    /// the planner's clauses are upserted: `$select`, `$filter`, `$top`,
    /// `$skip`, inline count, and skip token overwrite; `$expand` only sets
    /// when the base URL has none. Insertion order is preserved and values
    /// are not re-encoded.
    pub fn apply_to_url(&self, base_url: &HttpUrl) -> HttpUrl {
        let mut params: Vec<(String, String)> = Vec::new();
        for pair in base_url.query().split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if !params.iter().any(|(existing, _)| existing == key) {
                params.push((key.to_string(), value.to_string()));
            }
        }

        let select_clause = self.v2_select_with_expansions(&params);

        let mut upsert = |clause: &Option<String>, overwrite: bool| {
            let Some(clause) = clause else { return };
            let Some((key, value)) = clause.split_once('=') else {
                return;
            };
            match params.iter_mut().find(|(existing, _)| existing == key) {
                Some(entry) => {
                    if overwrite {
                        entry.1 = value.to_string();
                    }
                }
                None => params.push((key.to_string(), value.to_string())),
            }
        };

        upsert(&select_clause, true);
        upsert(&self.filter_clause, true);
        upsert(&self.top_clause, true);
        upsert(&self.skip_clause, true);
        upsert(&self.expand_clause, false);
        upsert(&self.inline_count_clause(), true);
        upsert(&self.skip_token_clause(), true);

        let mut result = base_url.clone();
        result.set_query(
            params
                .iter()
                .map(|(key, value)| {
                    if value.is_empty() {
                        key.clone()
                    } else {
                        format!("{key}={value}")
                    }
                })
                .collect::<Vec<_>>()
                .join("&"),
        );

        tracing::info!(target: "pushdown", "rewrote URL to {result}");
        result
    }

    /// OData v2 wants every expanded top-level navigation property listed
    /// in `$select` too, or many services drop it from the payload.
    fn v2_select_with_expansions(&self, existing: &[(String, String)]) -> Option<String> {
        let select = self.select_clause.clone()?;
        if self.version != ODataVersion::V2 {
            return Some(select);
        }

        let expand_list = self
            .expand_clause
            .as_ref()
            .and_then(|clause| clause.split_once('=').map(|(_, list)| list.to_string()))
            .or_else(|| {
                existing
                    .iter()
                    .find(|(key, _)| key == "$expand")
                    .map(|(_, value)| value.clone())
            });
        let Some(expand_list) = expand_list else {
            return Some(select);
        };

        let (_, fields) = select.split_once('=')?;
        let mut selected: Vec<String> = fields
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect();

        for expansion in expand_list.split(',') {
            let nav = expansion.trim();
            // Options and nested paths select the top-level property.
            let nav = nav.split_once('(').map_or(nav, |(head, _)| head);
            let nav = nav.split_once('/').map_or(nav, |(head, _)| head);
            if !nav.is_empty() && !selected.iter().any(|field| field == nav) {
                selected.push(nav.to_string());
            }
        }

        Some(format!("$select={}", selected.join(",")))
    }
}
