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
use odata_bridge_core::Result;
use serde::Deserialize;

/// 10.1 Element edm:EnumType.
#[derive(Debug, Deserialize)]
pub struct DeEnumType {
    #[serde(rename = "@Name")]
    pub name: String,
    /// 10.1.2 Attribute `UnderlyingType`; defaults to Edm.Int32.
    #[serde(rename = "@UnderlyingType")]
    pub underlying_type: Option<String>,
    /// 10.1.3 Attribute `IsFlags`
    #[serde(rename = "@IsFlags")]
    pub is_flags: Option<bool>,
    #[serde(rename = "Member", default)]
    pub members: Vec<DeEnumMember>,
    #[serde(rename = "Annotation", default)]
    pub annotations: Vec<Annotation>,
}

/// 10.2 Element edm:Member.
#[derive(Debug, Deserialize)]
pub struct DeEnumMember {
    #[serde(rename = "@Name")]
    pub name: String,
    /// 10.2.2 Attribute `Value`; members without one get their ordinal.
    #[serde(rename = "@Value")]
    pub value: Option<i64>,
}

/// Validated edm:EnumType.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub underlying_type: String,
    pub is_flags: bool,
    pub members: Vec<EnumMember>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

impl EnumType {
    /// Member names in declaration order; the projected enum's value set.
    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }
}

impl DeEnumType {
    pub fn validate(self) -> Result<EnumType> {
        let members = self
            .members
            .into_iter()
            .enumerate()
            .map(|(ordinal, m)| EnumMember {
                name: m.name,
                value: m.value.unwrap_or(ordinal as i64),
            })
            .collect();

        Ok(EnumType {
            name: self.name,
            underlying_type: self
                .underlying_type
                .unwrap_or_else(|| "Edm.Int32".to_string()),
            is_flags: self.is_flags.unwrap_or(false),
            members,
            annotations: self.annotations,
        })
    }
}
