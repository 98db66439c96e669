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

use crate::edmx::annotation::Annotation;
use odata_bridge_core::Error;
use odata_bridge_core::Result;
use serde::Deserialize;

/// Sentinel for `MaxLength="max"` and `Scale="variable"`.
pub const FACET_UNBOUNDED: i64 = -1;

/// 6.1 Element edm:Property.
#[derive(Debug, Deserialize)]
pub struct DeProperty {
    /// 6.1.1 Attribute `Name`
    #[serde(rename = "@Name")]
    pub name: String,
    /// 6.1.2 Attribute `Type`
    #[serde(rename = "@Type")]
    pub type_name: String,
    /// 6.2.1 Attribute `Nullable`
    #[serde(rename = "@Nullable")]
    pub nullable: Option<bool>,
    /// 6.2.2 Attribute `MaxLength`: non-negative integer or `max`.
    #[serde(rename = "@MaxLength")]
    pub max_length: Option<String>,
    /// 6.2.3 Attribute `Precision`
    #[serde(rename = "@Precision")]
    pub precision: Option<i32>,
    /// 6.2.4 Attribute `Scale`: non-negative integer or `variable`.
    #[serde(rename = "@Scale")]
    pub scale: Option<String>,
    /// 6.2.5 Attribute `Unicode`
    #[serde(rename = "@Unicode")]
    pub unicode: Option<bool>,
    /// 6.2.6 Attribute `SRID`
    #[serde(rename = "@SRID")]
    pub srid: Option<String>,
    /// 6.2.7 Attribute `DefaultValue`
    #[serde(rename = "@DefaultValue")]
    pub default_value: Option<String>,
    /// OData v2 concurrency annotation.
    #[serde(rename = "@ConcurrencyMode")]
    pub concurrency_mode: Option<String>,
    /// SAP v2 sortability flag.
    #[serde(rename = "@sap:sortable")]
    pub sortable: Option<bool>,
    #[serde(rename = "Annotation", default)]
    pub annotations: Vec<Annotation>,
}

/// Validated edm:Property with typed facets.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    /// Qualified EDM type reference: a primitive tag (`Edm.Int32`), a user
    /// type (`ns.Type`), or a collection wrapper (`Collection(T)`).
    pub type_name: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    /// `-1` means `max`.
    pub max_length: Option<i64>,
    pub precision: Option<i32>,
    /// `-1` means `variable`.
    pub scale: Option<i32>,
    pub srid: Option<String>,
    pub unicode: bool,
    pub sortable: bool,
    pub concurrency_mode: Option<String>,
    pub annotations: Vec<Annotation>,
}

impl DeProperty {
    /// # Errors
    ///
    /// `Error::Parse` when a facet value is neither its keyword nor an
    /// integer.
    pub fn validate(self) -> Result<Property> {
        let max_length = match self.max_length.as_deref() {
            None => None,
            Some("max") => Some(FACET_UNBOUNDED),
            Some(value) => Some(value.parse::<i64>().map_err(|_| {
                Error::parse(format!(
                    "property '{}': invalid MaxLength '{value}'",
                    self.name
                ))
            })?),
        };
        let scale = match self.scale.as_deref() {
            None => None,
            Some("variable") => Some(FACET_UNBOUNDED as i32),
            Some(value) => Some(value.parse::<i32>().map_err(|_| {
                Error::parse(format!("property '{}': invalid Scale '{value}'", self.name))
            })?),
        };

        Ok(Property {
            name: self.name,
            type_name: self.type_name,
            nullable: self.nullable.unwrap_or(true),
            default_value: self.default_value,
            max_length,
            precision: self.precision,
            scale,
            srid: self.srid,
            unicode: self.unicode.unwrap_or(true),
            sortable: self.sortable.unwrap_or(true),
            concurrency_mode: self.concurrency_mode,
            annotations: self.annotations,
        })
    }
}

/// 7.1 Element edm:NavigationProperty.
///
/// v4 carries `Type`/`Partner`; v2 instead references an `Association` via
/// `Relationship`/`FromRole`/`ToRole`. Both shapes land here.
#[derive(Debug, Deserialize)]
pub struct DeNavigationProperty {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Type")]
    pub type_name: Option<String>,
    #[serde(rename = "@Nullable")]
    pub nullable: Option<bool>,
    #[serde(rename = "@Partner")]
    pub partner: Option<String>,
    #[serde(rename = "@ContainsTarget")]
    pub contains_target: Option<bool>,
    #[serde(rename = "@Relationship")]
    pub relationship: Option<String>,
    #[serde(rename = "ReferentialConstraint", default)]
    pub referential_constraints: Vec<DeReferentialConstraint>,
    #[serde(rename = "Annotation", default)]
    pub annotations: Vec<Annotation>,
}

/// 7.2 Element edm:ReferentialConstraint (v4 shape).
#[derive(Debug, Deserialize)]
pub struct DeReferentialConstraint {
    #[serde(rename = "@Property")]
    pub property: Option<String>,
    #[serde(rename = "@ReferencedProperty")]
    pub referenced_property: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferentialConstraint {
    pub property: String,
    pub referenced_property: String,
}

/// Validated edm:NavigationProperty.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationProperty {
    pub name: String,
    /// Target type; absent for v2 relationship-style properties.
    pub type_name: Option<String>,
    pub nullable: bool,
    pub partner: Option<String>,
    pub contains_target: bool,
    /// v2 association reference.
    pub relationship: Option<String>,
    pub referential_constraints: Vec<ReferentialConstraint>,
    pub annotations: Vec<Annotation>,
}

impl DeNavigationProperty {
    pub fn validate(self) -> Result<NavigationProperty> {
        Ok(NavigationProperty {
            name: self.name,
            type_name: self.type_name,
            nullable: self.nullable.unwrap_or(true),
            partner: self.partner,
            contains_target: self.contains_target.unwrap_or(false),
            relationship: self.relationship,
            referential_constraints: self
                .referential_constraints
                .into_iter()
                .filter_map(|rc| match (rc.property, rc.referenced_property) {
                    (Some(property), Some(referenced_property)) => Some(ReferentialConstraint {
                        property,
                        referenced_property,
                    }),
                    _ => None,
                })
                .collect(),
            annotations: self.annotations,
        })
    }
}
