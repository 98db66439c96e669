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

//! Qualified type-name resolution.
//!
//! Type references in an EDMX document come in three shapes: primitive tags
//! (`Edm.Int32`), user types qualified by a schema namespace or alias
//! (`ns.Type`), and collection wrappers (`Collection(T)`). Entity set
//! lookups additionally accept `$metadata#EntitySet` context-URL forms.

use crate::edmx::ComplexType;
use crate::edmx::Edmx;
use crate::edmx::EntitySet;
use crate::edmx::EntityType;
use crate::edmx::EnumType;
use crate::edmx::TypeDefinition;
use odata_bridge_core::Error;
use odata_bridge_core::Result;

/// A type reference split into its collection flag and element name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub collection: bool,
    pub name: String,
}

impl TypeRef {
    /// `Collection(X)` marks a collection of `X`; anything else is scalar.
    pub fn parse(type_name: &str) -> Self {
        match type_name
            .strip_prefix("Collection(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            Some(inner) => Self {
                collection: true,
                name: inner.to_string(),
            },
            None => Self {
                collection: false,
                name: type_name.to_string(),
            },
        }
    }
}

/// EDM primitive types the bridge recognizes.
///
/// `DateTime` and `Time` are the v2 spellings of `DateTimeOffset` and
/// `TimeOfDay`. Geography/geometry types other than points resolve but fail
/// projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveType {
    Binary,
    Boolean,
    Byte,
    SByte,
    Date,
    DateTime,
    DateTimeOffset,
    Decimal,
    Double,
    Duration,
    Guid,
    Int16,
    Int32,
    Int64,
    Single,
    Stream,
    String,
    Time,
    TimeOfDay,
    GeographyPoint,
    /// Declared but unsupported geography/geometry subtype; the payload is
    /// the full tag.
    UnsupportedGeo(std::string::String),
}

impl PrimitiveType {
    /// Recognize an `Edm.*` tag. Returns `None` for tags outside the EDM
    /// primitive vocabulary.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let local = tag.strip_prefix("Edm.")?;
        let parsed = match local {
            "Binary" => Self::Binary,
            "Boolean" => Self::Boolean,
            "Byte" => Self::Byte,
            "SByte" => Self::SByte,
            "Date" => Self::Date,
            "DateTime" => Self::DateTime,
            "DateTimeOffset" => Self::DateTimeOffset,
            "Decimal" => Self::Decimal,
            "Double" => Self::Double,
            "Duration" => Self::Duration,
            "Guid" => Self::Guid,
            "Int16" => Self::Int16,
            "Int32" => Self::Int32,
            "Int64" => Self::Int64,
            "Single" => Self::Single,
            "Stream" => Self::Stream,
            "String" => Self::String,
            "Time" => Self::Time,
            "TimeOfDay" => Self::TimeOfDay,
            "GeographyPoint" => Self::GeographyPoint,
            other
                if other.starts_with("Geography") || other.starts_with("Geometry") =>
            {
                Self::UnsupportedGeo(tag.to_string())
            }
            _ => return None,
        };
        Some(parsed)
    }
}

/// What a qualified name resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedType<'a> {
    Primitive(PrimitiveType),
    Enum(&'a EnumType),
    Definition(&'a TypeDefinition),
    Complex(&'a ComplexType),
    Entity(&'a EntityType),
}

/// Strip `$metadata#Name` / full-URL context forms down to the bare name.
/// `People('id')`-style suffixes are dropped as well.
fn strip_context_form(name_or_url: &str) -> Result<&str> {
    let is_url = name_or_url.contains("://");
    let is_metadata_ref = name_or_url.starts_with("$metadata");
    if !is_url && !is_metadata_ref {
        return Ok(name_or_url);
    }

    let fragment = name_or_url
        .split_once('#')
        .map(|(_, fragment)| fragment)
        .ok_or_else(|| {
            Error::parse(format!("malformed type name or URL: '{name_or_url}'"))
        })?;
    Ok(fragment.split_once('(').map_or(fragment, |(name, _)| name))
}

/// Split a dotted name into (qualifier, local). Namespaces themselves
/// contain dots, so the split is at the last one.
fn split_qualifier(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((qualifier, local)) => (Some(qualifier), local),
        None => (None, name),
    }
}

impl Edmx {
    /// Resolve a type name per the reference rules: collections are handled
    /// by the caller via [`TypeRef`], so `name` must be scalar here.
    ///
    /// # Errors
    ///
    /// `Error::UnresolvedType` when the name neither binds to a schema type
    /// nor names a primitive.
    pub fn resolve_type(&self, name: &str) -> Result<ResolvedType<'_>> {
        let name = strip_context_form(name)?;

        let (qualifier, local) = split_qualifier(name);
        if let Some(qualifier) = qualifier {
            if qualifier != "Edm" {
                let schema = self
                    .find_schema(qualifier)
                    .ok_or_else(|| Error::UnresolvedType(name.to_string()))?;

                if let Some(e) = schema.enum_types.iter().find(|t| t.name == local) {
                    return Ok(ResolvedType::Enum(e));
                }
                if let Some(d) = schema.type_definitions.iter().find(|t| t.name == local) {
                    return Ok(ResolvedType::Definition(d));
                }
                if let Some(c) = schema.complex_types.iter().find(|t| t.name == local) {
                    return Ok(ResolvedType::Complex(c));
                }
                if let Some(e) = schema.entity_types.iter().find(|t| t.name == local) {
                    return Ok(ResolvedType::Entity(e));
                }
                return Err(Error::UnresolvedType(name.to_string()));
            }
        }

        PrimitiveType::from_tag(name)
            .map(ResolvedType::Primitive)
            .ok_or_else(|| Error::UnresolvedType(name.to_string()))
    }

    /// Entity set by name, accepting context-URL forms.
    ///
    /// # Errors
    ///
    /// `Error::UnresolvedType` when no container declares the set.
    pub fn find_entity_set(&self, name_or_url: &str) -> Result<&EntitySet> {
        let name = strip_context_form(name_or_url)?;
        self.entity_sets()
            .into_iter()
            .find(|set| set.name == name)
            .ok_or_else(|| Error::UnresolvedType(format!("entity set '{name}'")))
    }

    /// All entity sets across all containers, in document order.
    pub fn entity_sets(&self) -> Vec<&EntitySet> {
        self.schemas
            .iter()
            .flat_map(|schema| schema.entity_containers.iter())
            .flat_map(|container| container.entity_sets.iter())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIPPIN: &str = r#"
      <edmx:Edmx Version="4.0">
        <edmx:DataServices>
          <Schema Namespace="Trippin" Alias="TP">
            <EnumType Name="PersonGender">
              <Member Name="Male" Value="0"/>
              <Member Name="Female" Value="1"/>
              <Member Name="Unknown" Value="2"/>
            </EnumType>
            <ComplexType Name="City">
              <Property Name="Name" Type="Edm.String"/>
            </ComplexType>
            <EntityType Name="Person">
              <Key><PropertyRef Name="UserName"/></Key>
              <Property Name="UserName" Type="Edm.String" Nullable="false"/>
              <Property Name="Age" Type="Edm.Int32"/>
            </EntityType>
            <EntityContainer Name="Container">
              <EntitySet Name="People" EntityType="Trippin.Person"/>
            </EntityContainer>
          </Schema>
        </edmx:DataServices>
      </edmx:Edmx>"#;

    #[test]
    fn collection_refs_are_unwrapped() {
        let tref = TypeRef::parse("Collection(Edm.String)");
        assert!(tref.collection);
        assert_eq!(tref.name, "Edm.String");

        let scalar = TypeRef::parse("Edm.Int32");
        assert!(!scalar.collection);
    }

    #[test]
    fn resolves_primitives_and_schema_types() {
        let edmx = Edmx::parse(TRIPPIN).unwrap();
        assert!(matches!(
            edmx.resolve_type("Edm.Int32").unwrap(),
            ResolvedType::Primitive(PrimitiveType::Int32)
        ));
        assert!(matches!(
            edmx.resolve_type("Trippin.Person").unwrap(),
            ResolvedType::Entity(_)
        ));
        assert!(matches!(
            edmx.resolve_type("Trippin.City").unwrap(),
            ResolvedType::Complex(_)
        ));
        assert!(matches!(
            edmx.resolve_type("Trippin.PersonGender").unwrap(),
            ResolvedType::Enum(_)
        ));
    }

    #[test]
    fn alias_qualifies_too() {
        let edmx = Edmx::parse(TRIPPIN).unwrap();
        assert!(matches!(
            edmx.resolve_type("TP.Person").unwrap(),
            ResolvedType::Entity(_)
        ));
    }

    #[test]
    fn unknown_names_fail_with_unresolved_type() {
        let edmx = Edmx::parse(TRIPPIN).unwrap();
        assert!(matches!(
            edmx.resolve_type("Trippin.Nope"),
            Err(Error::UnresolvedType(_))
        ));
        assert!(matches!(
            edmx.resolve_type("Edm.Nope"),
            Err(Error::UnresolvedType(_))
        ));
        assert!(matches!(
            edmx.resolve_type("Unqualified"),
            Err(Error::UnresolvedType(_))
        ));
    }

    #[test]
    fn geography_subtypes_resolve_as_primitives() {
        assert_eq!(
            PrimitiveType::from_tag("Edm.GeographyPoint"),
            Some(PrimitiveType::GeographyPoint)
        );
        assert_eq!(
            PrimitiveType::from_tag("Edm.GeometryPolygon"),
            Some(PrimitiveType::UnsupportedGeo("Edm.GeometryPolygon".into()))
        );
    }

    #[test]
    fn entity_set_lookup_accepts_context_urls() {
        let edmx = Edmx::parse(TRIPPIN).unwrap();
        assert_eq!(edmx.find_entity_set("People").unwrap().name, "People");
        assert_eq!(
            edmx.find_entity_set("https://host/svc/$metadata#People")
                .unwrap()
                .name,
            "People"
        );
        assert_eq!(
            edmx.find_entity_set("$metadata#People('russellwhyte')")
                .unwrap()
                .name,
            "People"
        );
        assert!(edmx.find_entity_set("Flights").is_err());
    }
}
