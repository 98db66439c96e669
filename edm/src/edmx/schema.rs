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

use crate::edmx::annotation::Annotations;
use crate::edmx::association::Association;
use crate::edmx::association::DeAssociation;
use crate::edmx::complex_type::ComplexType;
use crate::edmx::complex_type::DeComplexType;
use crate::edmx::container::DeEntityContainer;
use crate::edmx::container::EntityContainer;
use crate::edmx::entity_type::DeEntityType;
use crate::edmx::entity_type::EntityType;
use crate::edmx::enum_type::DeEnumType;
use crate::edmx::enum_type::EnumType;
use crate::edmx::type_definition::DeTypeDefinition;
use crate::edmx::type_definition::TypeDefinition;
use odata_bridge_core::Error;
use odata_bridge_core::Result;
use serde::Deserialize;

/// 5.1 Element edm:Schema.
#[derive(Debug, Deserialize)]
pub struct DeSchema {
    /// 5.1.1 Attribute `Namespace`
    #[serde(rename = "@Namespace")]
    pub namespace: String,
    /// 5.1.2 Attribute `Alias`
    #[serde(rename = "@Alias")]
    pub alias: Option<String>,
    #[serde(rename = "EnumType", default)]
    pub enum_types: Vec<DeEnumType>,
    #[serde(rename = "TypeDefinition", default)]
    pub type_definitions: Vec<DeTypeDefinition>,
    #[serde(rename = "ComplexType", default)]
    pub complex_types: Vec<DeComplexType>,
    #[serde(rename = "EntityType", default)]
    pub entity_types: Vec<DeEntityType>,
    #[serde(rename = "Function", default)]
    pub functions: Vec<DeOperation>,
    #[serde(rename = "Action", default)]
    pub actions: Vec<DeOperation>,
    #[serde(rename = "EntityContainer", default)]
    pub entity_containers: Vec<DeEntityContainer>,
    /// OData v2 only.
    #[serde(rename = "Association", default)]
    pub associations: Vec<DeAssociation>,
    #[serde(rename = "Annotations", default)]
    pub annotations: Vec<Annotations>,
}

/// 12.1/12.2 Elements edm:Action and edm:Function, reduced to the shape the
/// bridge needs (names and signatures; bodies are never invoked).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeOperation {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@IsBound")]
    pub is_bound: Option<bool>,
    #[serde(rename = "Parameter", default)]
    pub parameters: Vec<DeOperationParameter>,
    #[serde(rename = "ReturnType", default)]
    pub return_types: Vec<DeReturnType>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeOperationParameter {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Type")]
    pub type_name: Option<String>,
    #[serde(rename = "@Nullable")]
    pub nullable: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeReturnType {
    #[serde(rename = "@Type")]
    pub type_name: Option<String>,
}

pub type Operation = DeOperation;

/// Validated edm:Schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub namespace: String,
    pub alias: Option<String>,
    pub enum_types: Vec<EnumType>,
    pub type_definitions: Vec<TypeDefinition>,
    pub complex_types: Vec<ComplexType>,
    pub entity_types: Vec<EntityType>,
    pub functions: Vec<Operation>,
    pub actions: Vec<Operation>,
    pub entity_containers: Vec<EntityContainer>,
    pub associations: Vec<Association>,
    pub annotations: Vec<Annotations>,
}

impl Schema {
    /// Whether this schema answers for the given qualifier (namespace or
    /// alias).
    pub fn matches_qualifier(&self, qualifier: &str) -> bool {
        self.namespace == qualifier || self.alias.as_deref() == Some(qualifier)
    }
}

impl DeSchema {
    /// # Errors
    ///
    /// `Error::Parse` wrapping the schema namespace when any child fails
    /// validation.
    pub fn validate(self) -> Result<Schema> {
        let namespace = self.namespace;
        let wrap = |e: Error| Error::parse(format!("schema '{namespace}': {e}"));

        Ok(Schema {
            enum_types: self
                .enum_types
                .into_iter()
                .map(DeEnumType::validate)
                .collect::<Result<Vec<_>>>()
                .map_err(wrap)?,
            type_definitions: self
                .type_definitions
                .into_iter()
                .map(DeTypeDefinition::validate)
                .collect::<Result<Vec<_>>>()
                .map_err(wrap)?,
            complex_types: self
                .complex_types
                .into_iter()
                .map(DeComplexType::validate)
                .collect::<Result<Vec<_>>>()
                .map_err(wrap)?,
            entity_types: self
                .entity_types
                .into_iter()
                .map(DeEntityType::validate)
                .collect::<Result<Vec<_>>>()
                .map_err(wrap)?,
            functions: self.functions,
            actions: self.actions,
            entity_containers: self
                .entity_containers
                .into_iter()
                .map(DeEntityContainer::validate)
                .collect::<Result<Vec<_>>>()
                .map_err(wrap)?,
            associations: self
                .associations
                .into_iter()
                .map(DeAssociation::validate)
                .collect::<Result<Vec<_>>>()
                .map_err(wrap)?,
            annotations: self.annotations,
            alias: self.alias,
            namespace,
        })
    }
}
