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

use serde::Deserialize;

/// 14.3 Element edm:Annotation.
///
/// Annotations are collected verbatim. They do not affect projection; the
/// pushdown planner may consult them for `$select` decisions.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Annotation {
    #[serde(rename = "@Term")]
    pub term: String,
    #[serde(rename = "@Qualifier")]
    pub qualifier: Option<String>,
    #[serde(rename = "@String")]
    pub string: Option<String>,
    #[serde(rename = "@Bool")]
    pub bool_value: Option<bool>,
    #[serde(rename = "@Int")]
    pub int_value: Option<i64>,
    #[serde(rename = "@EnumMember")]
    pub enum_member: Option<String>,
    #[serde(rename = "Collection")]
    pub collection: Option<AnnotationCollection>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AnnotationCollection {
    #[serde(rename = "String", default)]
    pub strings: Vec<String>,
}

/// 14.2 Element edm:Annotations (annotations applied to a target).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Annotations {
    #[serde(rename = "@Target")]
    pub target: String,
    #[serde(rename = "@Qualifier")]
    pub qualifier: Option<String>,
    #[serde(rename = "Annotation", default)]
    pub annotations: Vec<Annotation>,
}
