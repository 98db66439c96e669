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
use odata_bridge_core::Result;
use serde::Deserialize;

/// 9.1 Element edm:ComplexType.
#[derive(Debug, Deserialize)]
pub struct DeComplexType {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@BaseType")]
    pub base_type: Option<String>,
    #[serde(rename = "@Abstract")]
    pub is_abstract: Option<bool>,
    #[serde(rename = "@OpenType")]
    pub open_type: Option<bool>,
    #[serde(rename = "@HasStream")]
    pub has_stream: Option<bool>,
    #[serde(rename = "Property", default)]
    pub properties: Vec<DeProperty>,
    #[serde(rename = "NavigationProperty", default)]
    pub navigation_properties: Vec<DeNavigationProperty>,
    #[serde(rename = "Annotation", default)]
    pub annotations: Vec<Annotation>,
}

/// Validated edm:ComplexType.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexType {
    pub name: String,
    pub base_type: Option<String>,
    pub is_abstract: bool,
    pub open_type: bool,
    pub has_stream: bool,
    pub properties: Vec<Property>,
    pub navigation_properties: Vec<NavigationProperty>,
    pub annotations: Vec<Annotation>,
}

impl DeComplexType {
    pub fn validate(self) -> Result<ComplexType> {
        Ok(ComplexType {
            name: self.name,
            base_type: self.base_type,
            is_abstract: self.is_abstract.unwrap_or(false),
            open_type: self.open_type.unwrap_or(false),
            has_stream: self.has_stream.unwrap_or(false),
            properties: self
                .properties
                .into_iter()
                .map(DeProperty::validate)
                .collect::<Result<Vec<_>>>()?,
            navigation_properties: self
                .navigation_properties
                .into_iter()
                .map(DeNavigationProperty::validate)
                .collect::<Result<Vec<_>>>()?,
            annotations: self.annotations,
        })
    }
}
