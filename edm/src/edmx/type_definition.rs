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
use crate::edmx::property::FACET_UNBOUNDED;
use odata_bridge_core::Error;
use odata_bridge_core::Result;
use serde::Deserialize;

/// 11.1 Element edm:TypeDefinition.
#[derive(Debug, Deserialize)]
pub struct DeTypeDefinition {
    #[serde(rename = "@Name")]
    pub name: String,
    /// Always a primitive tag per the CSDL rules.
    #[serde(rename = "@UnderlyingType")]
    pub underlying_type: String,
    #[serde(rename = "@MaxLength")]
    pub max_length: Option<String>,
    #[serde(rename = "@Precision")]
    pub precision: Option<i32>,
    #[serde(rename = "@Scale")]
    pub scale: Option<String>,
    #[serde(rename = "@Unicode")]
    pub unicode: Option<bool>,
    #[serde(rename = "Annotation", default)]
    pub annotations: Vec<Annotation>,
}

/// Validated edm:TypeDefinition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub underlying_type: String,
    pub max_length: Option<i64>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub unicode: bool,
    pub annotations: Vec<Annotation>,
}

impl DeTypeDefinition {
    pub fn validate(self) -> Result<TypeDefinition> {
        let max_length = match self.max_length.as_deref() {
            None => None,
            Some("max") => Some(FACET_UNBOUNDED),
            Some(value) => Some(value.parse::<i64>().map_err(|_| {
                Error::parse(format!(
                    "type definition '{}': invalid MaxLength '{value}'",
                    self.name
                ))
            })?),
        };
        let scale = match self.scale.as_deref() {
            None => None,
            Some("variable") => Some(FACET_UNBOUNDED as i32),
            Some(value) => Some(value.parse::<i32>().map_err(|_| {
                Error::parse(format!(
                    "type definition '{}': invalid Scale '{value}'",
                    self.name
                ))
            })?),
        };

        Ok(TypeDefinition {
            name: self.name,
            underlying_type: self.underlying_type,
            max_length,
            precision: self.precision,
            scale,
            unicode: self.unicode.unwrap_or(true),
            annotations: self.annotations,
        })
    }
}
