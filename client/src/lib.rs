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

//! OData v2/v4 entity sets as typed tables.
//!
//! The pieces line up with a table-function lifecycle:
//!
//! 1. **Bind**: [`ODataReadBindData::from_entity_set_root`] probes the
//!    service and settles the output schema (EDM projection, or first-row
//!    inference for services without reachable metadata).
//! 2. **Init**: the host activates columns and filters;
//!    [`PredicatePushdownHelper`] renders them into `$select`/`$filter`/
//!    `$top`/`$skip`/`$expand` and the URL is rewritten.
//! 3. **Scan**: [`ODataReadBindData::fetch_next`] streams pages into
//!    fixed-size [`DataChunk`](odata_bridge_core::DataChunk)s, following
//!    next links and reporting progress.
//!
//! [`attach_entity_sets`] turns a whole service into view definitions, and
//! the [`web`] module exposes the generic HTTP row functions.

/// Service attach.
pub mod attach;

/// Service and entity-set clients.
pub mod client;

/// JSON payload handling.
pub mod content;

/// Datasphere URL builders.
pub mod datasphere;

/// Pushdown planning.
pub mod pushdown;

/// The paginated read bind state.
pub mod read;

/// Generic HTTP row functions.
pub mod web;

#[doc(inline)]
pub use attach::attach_entity_sets;
#[doc(inline)]
pub use attach::AttachOptions;
#[doc(inline)]
pub use client::ClientContext;
#[doc(inline)]
pub use client::ODataEntitySetClient;
#[doc(inline)]
pub use client::ODataServiceClient;
#[doc(inline)]
pub use content::EntitySetContent;
#[doc(inline)]
pub use content::ServiceContent;
#[doc(inline)]
pub use pushdown::PredicatePushdownHelper;
#[doc(inline)]
pub use pushdown::TableFilter;
#[doc(inline)]
pub use pushdown::TableFilterSet;
#[doc(inline)]
pub use read::ODataReadBindData;
