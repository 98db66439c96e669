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

//! Projection of EDM types onto table types.
//!
//! An entity type becomes an ordered struct: inherited base-type fields
//! first (recursively), then the type's own properties, each mapped through
//! the primitive table below. Enum types become text-valued enums over the
//! member names, complex types become nested structs, collections become
//! lists. Navigation properties are not part of the scalar projection.

use crate::edmx::ComplexType;
use crate::edmx::Edmx;
use crate::edmx::EntityType;
use crate::edmx::Property;
use crate::resolve::PrimitiveType;
use crate::resolve::ResolvedType;
use crate::resolve::TypeRef;
use odata_bridge_core::Error;
use odata_bridge_core::Result;
use odata_bridge_core::TableType;

/// Project an entity type to its ordered column list.
pub fn project_entity_type(edmx: &Edmx, entity: &EntityType) -> Result<Vec<(String, TableType)>> {
    let mut fields = Vec::new();
    let mut visiting = Vec::new();
    collect_entity_fields(edmx, entity, &mut fields, &mut visiting)?;
    Ok(fields)
}

/// Project a single type reference (possibly a collection).
pub fn project_type(edmx: &Edmx, type_name: &str) -> Result<TableType> {
    project_type_inner(edmx, type_name, &mut Vec::new())
}

/// The primitive mapping. Geography/geometry other than points has no table
/// counterpart.
pub fn map_primitive(primitive: &PrimitiveType) -> Result<TableType> {
    let mapped = match primitive {
        PrimitiveType::Binary | PrimitiveType::Stream => TableType::Bytes,
        PrimitiveType::Boolean => TableType::Bool,
        PrimitiveType::Byte | PrimitiveType::SByte => TableType::Int8,
        PrimitiveType::Int16 => TableType::Int16,
        PrimitiveType::Int32 => TableType::Int32,
        PrimitiveType::Int64 => TableType::Int64,
        PrimitiveType::Single => TableType::Float32,
        PrimitiveType::Double => TableType::Float64,
        PrimitiveType::Decimal => TableType::Decimal,
        PrimitiveType::String => TableType::Text,
        PrimitiveType::Guid => TableType::Uuid,
        PrimitiveType::Date => TableType::Date,
        PrimitiveType::DateTime | PrimitiveType::DateTimeOffset => TableType::Timestamp,
        PrimitiveType::Time | PrimitiveType::TimeOfDay => TableType::Time,
        PrimitiveType::Duration => TableType::Interval,
        PrimitiveType::GeographyPoint => TableType::List(Box::new(TableType::Float64)),
        PrimitiveType::UnsupportedGeo(tag) => {
            return Err(Error::UnsupportedPrimitive(tag.clone()))
        }
    };
    Ok(mapped)
}

fn collect_entity_fields(
    edmx: &Edmx,
    entity: &EntityType,
    fields: &mut Vec<(String, TableType)>,
    visiting: &mut Vec<String>,
) -> Result<()> {
    guard_cycle(visiting, &entity.name)?;

    if let Some(base_name) = &entity.base_type {
        match edmx.resolve_type(base_name)? {
            ResolvedType::Entity(base) => collect_entity_fields(edmx, base, fields, visiting)?,
            _ => {
                return Err(Error::parse(format!(
                    "base type '{base_name}' of entity type '{}' is not an entity type",
                    entity.name
                )))
            }
        }
    }
    collect_properties(edmx, &entity.properties, fields, visiting)?;

    visiting.pop();
    Ok(())
}

fn collect_complex_fields(
    edmx: &Edmx,
    complex: &ComplexType,
    fields: &mut Vec<(String, TableType)>,
    visiting: &mut Vec<String>,
) -> Result<()> {
    guard_cycle(visiting, &complex.name)?;

    if let Some(base_name) = &complex.base_type {
        match edmx.resolve_type(base_name)? {
            ResolvedType::Complex(base) => collect_complex_fields(edmx, base, fields, visiting)?,
            _ => {
                return Err(Error::parse(format!(
                    "base type '{base_name}' of complex type '{}' is not a complex type",
                    complex.name
                )))
            }
        }
    }
    collect_properties(edmx, &complex.properties, fields, visiting)?;

    visiting.pop();
    Ok(())
}

fn collect_properties(
    edmx: &Edmx,
    properties: &[Property],
    fields: &mut Vec<(String, TableType)>,
    visiting: &mut Vec<String>,
) -> Result<()> {
    for property in properties {
        let projected = project_type_inner(edmx, &property.type_name, visiting)?;
        fields.push((property.name.clone(), projected));
    }
    Ok(())
}

fn project_type_inner(
    edmx: &Edmx,
    type_name: &str,
    visiting: &mut Vec<String>,
) -> Result<TableType> {
    let tref = TypeRef::parse(type_name);

    let element = match edmx.resolve_type(&tref.name)? {
        ResolvedType::Primitive(primitive) => map_primitive(&primitive)?,
        ResolvedType::Enum(enum_type) => TableType::Enum(enum_type.member_names()),
        ResolvedType::Definition(definition) => {
            let primitive = PrimitiveType::from_tag(&definition.underlying_type)
                .ok_or_else(|| Error::UnresolvedType(definition.underlying_type.clone()))?;
            map_primitive(&primitive)?
        }
        ResolvedType::Complex(complex) => {
            let mut nested = Vec::new();
            collect_complex_fields(edmx, complex, &mut nested, visiting)?;
            TableType::Struct(nested)
        }
        ResolvedType::Entity(entity) => {
            // Entity-typed properties surface for expanded navigation
            // targets; they project like complex structs.
            let mut nested = Vec::new();
            collect_entity_fields(edmx, entity, &mut nested, visiting)?;
            TableType::Struct(nested)
        }
    };

    Ok(if tref.collection {
        TableType::List(Box::new(element))
    } else {
        element
    })
}

fn guard_cycle(visiting: &mut Vec<String>, name: &str) -> Result<()> {
    if visiting.iter().any(|seen| seen == name) {
        return Err(Error::parse(format!(
            "cyclic type reference through '{name}'"
        )));
    }
    visiting.push(name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"
      <edmx:Edmx Version="4.0">
        <edmx:DataServices>
          <Schema Namespace="Trippin">
            <EnumType Name="PersonGender">
              <Member Name="Male" Value="0"/>
              <Member Name="Female" Value="1"/>
            </EnumType>
            <TypeDefinition Name="ShortText" UnderlyingType="Edm.String" MaxLength="64"/>
            <ComplexType Name="City">
              <Property Name="Name" Type="Edm.String"/>
              <Property Name="CountryRegion" Type="Edm.String"/>
            </ComplexType>
            <ComplexType Name="Location">
              <Property Name="Address" Type="Edm.String"/>
              <Property Name="City" Type="Trippin.City"/>
            </ComplexType>
            <EntityType Name="Person" Abstract="true">
              <Key><PropertyRef Name="UserName"/></Key>
              <Property Name="UserName" Type="Edm.String" Nullable="false"/>
              <Property Name="Gender" Type="Trippin.PersonGender"/>
              <Property Name="Emails" Type="Collection(Edm.String)"/>
              <Property Name="AddressInfo" Type="Collection(Trippin.Location)"/>
              <NavigationProperty Name="Friends" Type="Collection(Trippin.Person)"/>
            </EntityType>
            <EntityType Name="Manager" BaseType="Trippin.Person">
              <Property Name="Budget" Type="Edm.Int64"/>
              <Property Name="Office" Type="Trippin.ShortText"/>
            </EntityType>
            <EntityContainer Name="Container">
              <EntitySet Name="People" EntityType="Trippin.Person"/>
            </EntityContainer>
          </Schema>
        </edmx:DataServices>
      </edmx:Edmx>"#;

    fn parse() -> Edmx {
        Edmx::parse(METADATA).unwrap()
    }

    fn entity<'a>(edmx: &'a Edmx, name: &str) -> &'a EntityType {
        match edmx.resolve_type(&format!("Trippin.{name}")).unwrap() {
            ResolvedType::Entity(entity) => entity,
            other => panic!("expected entity type, got {other:?}"),
        }
    }

    #[test]
    fn projects_fields_in_declaration_order() {
        let edmx = parse();
        let fields = project_entity_type(&edmx, entity(&edmx, "Person")).unwrap();
        let names: Vec<_> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["UserName", "Gender", "Emails", "AddressInfo"]);
    }

    #[test]
    fn inherited_fields_come_first() {
        let edmx = parse();
        let fields = project_entity_type(&edmx, entity(&edmx, "Manager")).unwrap();
        let names: Vec<_> = fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["UserName", "Gender", "Emails", "AddressInfo", "Budget", "Office"]
        );
    }

    #[test]
    fn enums_project_to_member_name_enums() {
        let edmx = parse();
        let fields = project_entity_type(&edmx, entity(&edmx, "Person")).unwrap();
        assert_eq!(
            fields[1].1,
            TableType::Enum(vec!["Male".to_string(), "Female".to_string()])
        );
    }

    #[test]
    fn collections_project_to_lists() {
        let edmx = parse();
        let fields = project_entity_type(&edmx, entity(&edmx, "Person")).unwrap();
        assert_eq!(fields[2].1, TableType::List(Box::new(TableType::Text)));
    }

    #[test]
    fn complex_types_project_to_nested_structs() {
        let edmx = parse();
        let fields = project_entity_type(&edmx, entity(&edmx, "Person")).unwrap();
        let TableType::List(element) = &fields[3].1 else {
            panic!("AddressInfo should be a list");
        };
        let TableType::Struct(location) = element.as_ref() else {
            panic!("AddressInfo elements should be structs");
        };
        assert_eq!(location[0].0, "Address");
        assert_eq!(location[1].0, "City");
        assert!(matches!(location[1].1, TableType::Struct(_)));
    }

    #[test]
    fn type_definitions_map_through_their_underlying_primitive() {
        let edmx = parse();
        let fields = project_entity_type(&edmx, entity(&edmx, "Manager")).unwrap();
        assert_eq!(fields[5].1, TableType::Text);
    }

    #[test]
    fn navigation_properties_are_omitted() {
        let edmx = parse();
        let fields = project_entity_type(&edmx, entity(&edmx, "Person")).unwrap();
        assert!(fields.iter().all(|(name, _)| name != "Friends"));
    }

    #[test]
    fn geography_point_projects_to_float_list() {
        assert_eq!(
            map_primitive(&PrimitiveType::GeographyPoint).unwrap(),
            TableType::List(Box::new(TableType::Float64))
        );
    }

    #[test]
    fn other_geometry_is_unsupported() {
        let result = map_primitive(&PrimitiveType::UnsupportedGeo("Edm.GeographyPolygon".into()));
        assert!(matches!(result, Err(Error::UnsupportedPrimitive(_))));
    }
}
