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

//! ODP (Operational Data Provisioning) change-data-capture subscriptions.
//!
//! An ODP-enabled entity set (names starting `EntityOf…`/`FactsOf…`) hands
//! out a delta token with the last page of an initial load; presenting that
//! token on later requests yields only changes. This crate persists the
//! token lifecycle:
//!
//! - [`OdpSubscription`] / [`OdpAuditEntry`]: the persisted rows
//! - [`SubscriptionStore`]: the persistence seam, with an in-memory
//!   implementation and a SQL implementation over the host's
//!   [`SqlExecutor`](store::sql::SqlExecutor)
//! - [`OdpSubscriptionStateManager`]: the initial-load → delta-fetch →
//!   terminate phase machine, auditing every operation
//! - [`scan`]: the wire-level helpers (track-changes preference, delta
//!   token application and harvest)

/// Subscription and audit data model.
pub mod model;

/// Wire-level delta-token helpers.
pub mod scan;

/// The phase machine.
pub mod state;

/// Persistence.
pub mod store;

#[doc(inline)]
pub use model::OdpAuditEntry;
#[doc(inline)]
pub use model::OdpOperation;
#[doc(inline)]
pub use model::OdpSubscription;
#[doc(inline)]
pub use state::OdpSubscriptionStateManager;
#[doc(inline)]
pub use state::SubscriptionPhase;
#[doc(inline)]
pub use store::MemorySubscriptionStore;
#[doc(inline)]
pub use store::SubscriptionStore;
