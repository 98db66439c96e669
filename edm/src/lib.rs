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

//! EDMX ($metadata) parsing, type resolution, and table-type projection.
//!
//! An OData service describes itself with an EDMX XML document. This crate
//! turns that document into a strongly-typed [`Edmx`] value (quick-xml +
//! serde deserialization into `De*` structs, then a validation pass into the
//! clean model), resolves qualified type references across schemas, and
//! projects entity types onto the [`TableType`](odata_bridge_core::TableType)
//! schema a host engine consumes.
//!
//! Both OData v2 (`Version="1.0"`, associations, `DataServiceVersion`) and
//! v4 (`Version="4.0"`) documents are handled; the detected version is
//! recorded on the parsed [`Edmx`].

/// EDMX document model and parser.
pub mod edmx;

/// Process-wide cache of parsed metadata documents.
pub mod cache;

/// Projection of EDM types onto table types.
pub mod project;

/// Qualified-name resolution across schemas.
pub mod resolve;

#[doc(inline)]
pub use cache::EdmCache;
#[doc(inline)]
pub use edmx::Edmx;
#[doc(inline)]
pub use edmx::Schema;
#[doc(inline)]
pub use project::project_entity_type;
#[doc(inline)]
pub use resolve::PrimitiveType;
#[doc(inline)]
pub use resolve::ResolvedType;
#[doc(inline)]
pub use resolve::TypeRef;
