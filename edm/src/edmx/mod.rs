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

//! EDMX parser and validator.
//!
//! Parsing is two-phase: serde deserializes the XML into `De*` structs that
//! mirror the document, then `validate()` turns those into the clean model
//! types, parsing facets and rejecting malformed documents.

/// Element edmx:Edmx (document root).
pub mod edmx_root;

/// Element edm:Schema.
pub mod schema;

/// Elements edm:Property and edm:NavigationProperty.
pub mod property;

/// Element edm:EntityType.
pub mod entity_type;

/// Element edm:ComplexType.
pub mod complex_type;

/// Element edm:EnumType.
pub mod enum_type;

/// Element edm:TypeDefinition.
pub mod type_definition;

/// Element edm:EntityContainer and its children.
pub mod container;

/// Element edm:Association (OData v2).
pub mod association;

/// Elements edm:Annotation and edm:Annotations.
pub mod annotation;

/// Element edmx:Reference.
pub mod reference;

#[doc(inline)]
pub use annotation::Annotation;
#[doc(inline)]
pub use annotation::Annotations;
#[doc(inline)]
pub use association::Association;
#[doc(inline)]
pub use association::AssociationEnd;
#[doc(inline)]
pub use complex_type::ComplexType;
#[doc(inline)]
pub use container::ActionImport;
#[doc(inline)]
pub use container::AssociationSet;
#[doc(inline)]
pub use container::EntityContainer;
#[doc(inline)]
pub use container::EntitySet;
#[doc(inline)]
pub use container::FunctionImport;
#[doc(inline)]
pub use edmx_root::Edmx;
#[doc(inline)]
pub use entity_type::EntityType;
#[doc(inline)]
pub use enum_type::EnumMember;
#[doc(inline)]
pub use enum_type::EnumType;
#[doc(inline)]
pub use property::NavigationProperty;
#[doc(inline)]
pub use property::Property;
#[doc(inline)]
pub use property::ReferentialConstraint;
#[doc(inline)]
pub use reference::Reference;
#[doc(inline)]
pub use schema::Schema;
#[doc(inline)]
pub use type_definition::TypeDefinition;
