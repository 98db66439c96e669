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

use crate::edmx::reference::DeReference;
use crate::edmx::reference::Reference;
use crate::edmx::schema::DeSchema;
use crate::edmx::schema::Schema;
use odata_bridge_core::Error;
use odata_bridge_core::ODataVersion;
use odata_bridge_core::Result;
use serde::Deserialize;

/// 3.1 Element edmx:Edmx.
#[derive(Debug, Deserialize)]
struct DeEdmx {
    /// 3.1.1 Attribute Version: `4.0` for v4 documents, `1.0` for v2.
    #[serde(rename = "@Version")]
    version: Option<String>,
    /// v2 marker, sometimes carried on the root.
    #[serde(rename = "@DataServiceVersion", alias = "@m:DataServiceVersion")]
    data_service_version: Option<String>,
    /// The root MUST contain a single edmx:DataServices child.
    #[serde(rename = "edmx:DataServices", alias = "DataServices", default)]
    data_services: Vec<DeDataServices>,
    #[serde(rename = "edmx:Reference", alias = "Reference", default)]
    references: Vec<DeReference>,
}

/// 3.2 Element edmx:DataServices.
#[derive(Debug, Deserialize)]
struct DeDataServices {
    /// v2 marker, usually carried here.
    #[serde(rename = "@DataServiceVersion", alias = "@m:DataServiceVersion")]
    data_service_version: Option<String>,
    #[serde(rename = "Schema", default)]
    schemas: Vec<DeSchema>,
}

/// A validated $metadata document with its detected protocol version.
#[derive(Debug, Clone, PartialEq)]
pub struct Edmx {
    pub version: ODataVersion,
    pub schemas: Vec<Schema>,
    pub references: Vec<Reference>,
}

impl Edmx {
    /// Parse and validate an EDMX document.
    ///
    /// # Errors
    ///
    /// `Error::Parse` on malformed XML, a missing or duplicated
    /// DataServices element, or invalid facets anywhere in the document.
    pub fn parse(xml: &str) -> Result<Self> {
        let de: DeEdmx =
            quick_xml::de::from_str(xml).map_err(|e| Error::parse(format!("EDMX: {e}")))?;
        de.validate()
    }

    pub fn version(&self) -> ODataVersion {
        self.version
    }

    /// Schema answering for a namespace or alias.
    pub fn find_schema(&self, qualifier: &str) -> Option<&Schema> {
        self.schemas
            .iter()
            .find(|schema| schema.matches_qualifier(qualifier))
    }
}

impl DeEdmx {
    fn validate(self) -> Result<Edmx> {
        if self.data_services.len() != 1 {
            return Err(Error::parse(format!(
                "EDMX document must contain exactly one DataServices element, found {}",
                self.data_services.len()
            )));
        }
        let data_services = self.data_services.into_iter().next().expect("checked above");

        let schemas = data_services
            .schemas
            .into_iter()
            .map(DeSchema::validate)
            .collect::<Result<Vec<_>>>()?;

        // v2 when the document says 1.0, carries a DataServiceVersion
        // marker, or declares associations; v4 otherwise, including when the
        // signals are ambiguous.
        let has_associations = schemas.iter().any(|s| !s.associations.is_empty());
        let version = if self.version.as_deref() == Some("1.0")
            || self.data_service_version.is_some()
            || data_services.data_service_version.is_some()
            || has_associations
        {
            ODataVersion::V2
        } else {
            ODataVersion::V4
        };

        Ok(Edmx {
            version,
            schemas,
            references: self
                .references
                .into_iter()
                .map(DeReference::validate)
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_v4_document() {
        let edmx = Edmx::parse(
            r#"<edmx:Edmx Version="4.0">
                 <edmx:DataServices>
                   <Schema Namespace="Sample.v1"/>
                 </edmx:DataServices>
               </edmx:Edmx>"#,
        )
        .unwrap();
        assert_eq!(edmx.version(), ODataVersion::V4);
        assert!(edmx.find_schema("Sample.v1").is_some());
        assert!(edmx.find_schema("Other").is_none());
    }

    #[test]
    fn version_one_means_v2() {
        let edmx = Edmx::parse(
            r#"<edmx:Edmx Version="1.0">
                 <edmx:DataServices m:DataServiceVersion="2.0">
                   <Schema Namespace="NW"/>
                 </edmx:DataServices>
               </edmx:Edmx>"#,
        )
        .unwrap();
        assert_eq!(edmx.version(), ODataVersion::V2);
    }

    #[test]
    fn associations_force_v2() {
        let edmx = Edmx::parse(
            r#"<edmx:Edmx Version="4.0">
                 <edmx:DataServices>
                   <Schema Namespace="NW">
                     <Association Name="FK_Orders">
                       <End Type="NW.Order" Role="Order" Multiplicity="*"/>
                     </Association>
                   </Schema>
                 </edmx:DataServices>
               </edmx:Edmx>"#,
        )
        .unwrap();
        assert_eq!(edmx.version(), ODataVersion::V2);
    }

    #[test]
    fn missing_data_services_is_rejected() {
        assert!(Edmx::parse(r#"<edmx:Edmx Version="4.0"></edmx:Edmx>"#).is_err());
    }

    #[test]
    fn two_data_services_are_rejected() {
        let result = Edmx::parse(
            r#"<edmx:Edmx Version="4.0">
                 <edmx:DataServices/>
                 <edmx:DataServices/>
               </edmx:Edmx>"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn schema_alias_is_recognized() {
        let edmx = Edmx::parse(
            r#"<edmx:Edmx Version="4.0">
                 <edmx:DataServices>
                   <Schema Namespace="Very.Long.Namespace" Alias="Self"/>
                 </edmx:DataServices>
               </edmx:Edmx>"#,
        )
        .unwrap();
        assert!(edmx.find_schema("Self").is_some());
        assert!(edmx.find_schema("Very.Long.Namespace").is_some());
    }
}
