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

/// 13.1 Element edm:EntityContainer.
#[derive(Debug, Deserialize)]
pub struct DeEntityContainer {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "EntitySet", default)]
    pub entity_sets: Vec<DeEntitySet>,
    #[serde(rename = "ActionImport", default)]
    pub action_imports: Vec<DeActionImport>,
    #[serde(rename = "FunctionImport", default)]
    pub function_imports: Vec<DeFunctionImport>,
    /// OData v2 only.
    #[serde(rename = "AssociationSet", default)]
    pub association_sets: Vec<DeAssociationSet>,
    #[serde(rename = "Annotation", default)]
    pub annotations: Vec<Annotation>,
}

/// 13.2 Element edm:EntitySet.
#[derive(Debug, Deserialize)]
pub struct DeEntitySet {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@EntityType")]
    pub entity_type: String,
    #[serde(rename = "Annotation", default)]
    pub annotations: Vec<Annotation>,
}

/// 13.4 Element edm:ActionImport.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeActionImport {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Action")]
    pub action: String,
}

/// 13.5 Element edm:FunctionImport. In v2 this is how service operations
/// are declared; only name and target are kept.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeFunctionImport {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Function")]
    pub function: Option<String>,
    /// v2 attribute.
    #[serde(rename = "@EntitySet")]
    pub entity_set: Option<String>,
}

/// OData v2 edm:AssociationSet.
#[derive(Debug, Deserialize)]
pub struct DeAssociationSet {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Association")]
    pub association: String,
    #[serde(rename = "End", default)]
    pub ends: Vec<DeAssociationSetEnd>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeAssociationSetEnd {
    #[serde(rename = "@Role")]
    pub role: Option<String>,
    #[serde(rename = "@EntitySet")]
    pub entity_set: Option<String>,
}

/// Validated edm:EntityContainer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityContainer {
    pub name: String,
    pub entity_sets: Vec<EntitySet>,
    pub action_imports: Vec<ActionImport>,
    pub function_imports: Vec<FunctionImport>,
    pub association_sets: Vec<AssociationSet>,
    pub annotations: Vec<Annotation>,
}

/// Validated edm:EntitySet. Queryable as a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySet {
    pub name: String,
    /// Qualified name of the entity type.
    pub entity_type_name: String,
    pub annotations: Vec<Annotation>,
}

pub type ActionImport = DeActionImport;
pub type FunctionImport = DeFunctionImport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationSet {
    pub name: String,
    pub association: String,
    pub ends: Vec<DeAssociationSetEnd>,
}

impl DeEntityContainer {
    pub fn validate(self) -> Result<EntityContainer> {
        Ok(EntityContainer {
            name: self.name,
            entity_sets: self
                .entity_sets
                .into_iter()
                .map(|set| EntitySet {
                    name: set.name,
                    entity_type_name: set.entity_type,
                    annotations: set.annotations,
                })
                .collect(),
            action_imports: self.action_imports,
            function_imports: self.function_imports,
            association_sets: self
                .association_sets
                .into_iter()
                .map(|set| AssociationSet {
                    name: set.name,
                    association: set.association,
                    ends: set.ends,
                })
                .collect(),
            annotations: self.annotations,
        })
    }
}
