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

//! OData v2 edm:Association. Its presence in a schema is also one of the
//! version-detection signals.

use odata_bridge_core::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DeAssociation {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "End", default)]
    pub ends: Vec<DeAssociationEnd>,
    #[serde(rename = "ReferentialConstraint", default)]
    pub referential_constraints: Vec<DeV2ReferentialConstraint>,
}

#[derive(Debug, Deserialize)]
pub struct DeAssociationEnd {
    #[serde(rename = "@Type")]
    pub type_name: Option<String>,
    #[serde(rename = "@Role")]
    pub role: Option<String>,
    #[serde(rename = "@Multiplicity")]
    pub multiplicity: Option<String>,
}

/// v2 referential constraints name a principal and a dependent role, each
/// with property refs.
#[derive(Debug, Deserialize)]
pub struct DeV2ReferentialConstraint {
    #[serde(rename = "Principal")]
    pub principal: Option<DeConstraintRole>,
    #[serde(rename = "Dependent")]
    pub dependent: Option<DeConstraintRole>,
}

#[derive(Debug, Deserialize)]
pub struct DeConstraintRole {
    #[serde(rename = "@Role")]
    pub role: String,
    #[serde(rename = "PropertyRef", default)]
    pub property_refs: Vec<DeConstraintPropertyRef>,
}

#[derive(Debug, Deserialize)]
pub struct DeConstraintPropertyRef {
    #[serde(rename = "@Name")]
    pub name: String,
}

/// Validated edm:Association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub name: String,
    pub ends: Vec<AssociationEnd>,
    pub referential_constraints: Vec<V2ReferentialConstraint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationEnd {
    pub type_name: String,
    pub role: String,
    pub multiplicity: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2ReferentialConstraint {
    pub principal_role: String,
    pub principal_properties: Vec<String>,
    pub dependent_role: String,
    pub dependent_properties: Vec<String>,
}

impl DeAssociation {
    pub fn validate(self) -> Result<Association> {
        Ok(Association {
            name: self.name,
            ends: self
                .ends
                .into_iter()
                .map(|end| AssociationEnd {
                    type_name: end.type_name.unwrap_or_default(),
                    role: end.role.unwrap_or_default(),
                    multiplicity: end.multiplicity.unwrap_or_default(),
                })
                .collect(),
            referential_constraints: self
                .referential_constraints
                .into_iter()
                .filter_map(|rc| {
                    let principal = rc.principal?;
                    let dependent = rc.dependent?;
                    Some(V2ReferentialConstraint {
                        principal_role: principal.role,
                        principal_properties: principal
                            .property_refs
                            .into_iter()
                            .map(|r| r.name)
                            .collect(),
                        dependent_role: dependent.role,
                        dependent_properties: dependent
                            .property_refs
                            .into_iter()
                            .map(|r| r.name)
                            .collect(),
                    })
                })
                .collect(),
        })
    }
}
