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
use crate::edmx::property::DeNavigationProperty;
use crate::edmx::property::DeProperty;
use crate::edmx::property::NavigationProperty;
use crate::edmx::property::Property;
use odata_bridge_core::Error;
use odata_bridge_core::Result;
use serde::Deserialize;

/// 8.1 Element edm:EntityType.
#[derive(Debug, Deserialize)]
pub struct DeEntityType {
    /// 8.1.1 Attribute `Name`
    #[serde(rename = "@Name")]
    pub name: String,
    /// 8.1.2 Attribute `BaseType`
    #[serde(rename = "@BaseType")]
    pub base_type: Option<String>,
    /// 8.1.3 Attribute `Abstract`
    #[serde(rename = "@Abstract")]
    pub is_abstract: Option<bool>,
    /// 8.1.4 Attribute `OpenType`
    #[serde(rename = "@OpenType")]
    pub open_type: Option<bool>,
    /// 8.1.5 Attribute `HasStream`
    #[serde(rename = "@HasStream")]
    pub has_stream: Option<bool>,
    /// 8.2 Element edm:Key
    #[serde(rename = "Key", default)]
    pub keys: Vec<DeKey>,
    #[serde(rename = "Property", default)]
    pub properties: Vec<DeProperty>,
    #[serde(rename = "NavigationProperty", default)]
    pub navigation_properties: Vec<DeNavigationProperty>,
    #[serde(rename = "Annotation", default)]
    pub annotations: Vec<Annotation>,
}

/// 8.2 Element edm:Key.
#[derive(Debug, Deserialize)]
pub struct DeKey {
    #[serde(rename = "PropertyRef", default)]
    pub property_refs: Vec<DePropertyRef>,
}

/// 8.3 Element edm:PropertyRef.
#[derive(Debug, Deserialize)]
pub struct DePropertyRef {
    #[serde(rename = "@Name")]
    pub name: String,
}

/// Validated edm:EntityType.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    pub name: String,
    /// Names of the key properties, in declaration order.
    pub key: Vec<String>,
    pub base_type: Option<String>,
    pub is_abstract: bool,
    pub open_type: bool,
    pub has_stream: bool,
    pub properties: Vec<Property>,
    pub navigation_properties: Vec<NavigationProperty>,
    pub annotations: Vec<Annotation>,
}

impl DeEntityType {
    /// # Errors
    ///
    /// `Error::Parse` for more than one Key element or invalid property
    /// facets.
    pub fn validate(self) -> Result<EntityType> {
        if self.keys.len() > 1 {
            return Err(Error::parse(format!(
                "entity type '{}' declares more than one Key",
                self.name
            )));
        }
        let key = self
            .keys
            .into_iter()
            .next()
            .map(|k| k.property_refs.into_iter().map(|r| r.name).collect())
            .unwrap_or_default();

        let properties = self
            .properties
            .into_iter()
            .map(DeProperty::validate)
            .collect::<Result<Vec<_>>>()?;
        let navigation_properties = self
            .navigation_properties
            .into_iter()
            .map(DeNavigationProperty::validate)
            .collect::<Result<Vec<_>>>()?;

        Ok(EntityType {
            name: self.name,
            key,
            base_type: self.base_type,
            is_abstract: self.is_abstract.unwrap_or(false),
            open_type: self.open_type.unwrap_or(false),
            has_stream: self.has_stream.unwrap_or(false),
            properties,
            navigation_properties,
            annotations: self.annotations,
        })
    }
}
