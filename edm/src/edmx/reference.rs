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

use odata_bridge_core::Result;
use serde::Deserialize;

/// 3.3 Element edmx:Reference.
#[derive(Debug, Deserialize)]
pub struct DeReference {
    #[serde(rename = "@Uri")]
    pub uri: Option<String>,
    #[serde(rename = "Include", alias = "edmx:Include", default)]
    pub includes: Vec<DeReferenceInclude>,
}

/// 3.4 Element edmx:Include.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeReferenceInclude {
    #[serde(rename = "@Namespace")]
    pub namespace: Option<String>,
    #[serde(rename = "@Alias")]
    pub alias: Option<String>,
}

/// Validated edmx:Reference. Referenced documents are not fetched; the
/// reference list is carried for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub uri: String,
    pub includes: Vec<DeReferenceInclude>,
}

impl DeReference {
    pub fn validate(self) -> Result<Reference> {
        Ok(Reference {
            uri: self.uri.unwrap_or_default(),
            includes: self.includes,
        })
    }
}
