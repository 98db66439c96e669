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

//! The subscription phase machine.
//!
//! One state manager is owned by one scan. Construction attaches to an
//! existing active subscription or creates a fresh one; transitions persist
//! through the store and every operation is bracketed by an audit entry.
//! Audit failures log and never abort the scan.

use crate::model::is_valid_odp_url;
use crate::model::OdpAuditEntry;
use crate::model::OdpOperation;
use crate::model::OdpSubscription;
use crate::model::STATUS_ACTIVE;
use crate::model::STATUS_ERROR;
use crate::model::STATUS_TERMINATED;
use crate::store::SubscriptionStore;
use odata_bridge_core::Error;
use odata_bridge_core::Result;
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPhase {
    InitialLoad,
    DeltaFetch,
    Terminated,
    ErrorState,
}

impl std::fmt::Display for SubscriptionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitialLoad => "INITIAL_LOAD".fmt(f),
            Self::DeltaFetch => "DELTA_FETCH".fmt(f),
            Self::Terminated => "TERMINATED".fmt(f),
            Self::ErrorState => "ERROR_STATE".fmt(f),
        }
    }
}

/// Drives one subscription's lifecycle against the store.
pub struct OdpSubscriptionStateManager {
    store: Arc<dyn SubscriptionStore>,
    phase: SubscriptionPhase,
    subscription: OdpSubscription,
    current_audit_id: Option<i64>,
    operation_start: OffsetDateTime,
}

impl OdpSubscriptionStateManager {
    /// Attach to or create a subscription for (service_url,
    /// entity_set_name).
    ///
    /// - With `import_delta_token`: phase DELTA_FETCH with that token,
    ///   `preference_applied` set.
    /// - Else, with an existing active subscription and no
    ///   `force_full_load`: attach; phase depends on whether a token is
    ///   stored.
    /// - Else: fresh INITIAL_LOAD with an empty token (an existing active
    ///   row is reused and its token cleared rather than duplicated).
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` for non-ODP URLs; store errors propagate.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        service_url: &str,
        entity_set_name: &str,
        secret_name: &str,
        force_full_load: bool,
        import_delta_token: Option<&str>,
    ) -> Result<Self> {
        if !is_valid_odp_url(service_url) {
            return Err(Error::invalid_input(format!(
                "'{service_url}' is not an ODP URL (no EntityOf*/FactsOf* segment)"
            )));
        }

        tracing::info!(
            target: "odp.state",
            "initializing subscription state for {service_url} / {entity_set_name} \
             (force_full_load: {force_full_load})"
        );

        let existing = store.find_active_subscription(service_url, entity_set_name)?;

        let (subscription, phase) = match (import_delta_token, existing, force_full_load) {
            (Some(token), existing, _) => {
                let mut subscription = existing.unwrap_or_else(|| {
                    OdpSubscription::new(service_url, entity_set_name, secret_name)
                });
                let is_new = store
                    .get_subscription(&subscription.subscription_id)?
                    .is_none();
                subscription.delta_token = token.to_string();
                subscription.preference_applied = true;
                subscription.subscription_status = STATUS_ACTIVE.to_string();
                if is_new {
                    store.create_subscription(&subscription)?;
                } else {
                    store.update_subscription(&subscription)?;
                }
                (subscription, SubscriptionPhase::DeltaFetch)
            }
            (None, Some(existing), false) => {
                let phase = if existing.delta_token.is_empty() {
                    SubscriptionPhase::InitialLoad
                } else {
                    SubscriptionPhase::DeltaFetch
                };
                (existing, phase)
            }
            (None, existing, _) => {
                // force_full_load, or nothing to attach to: start over. An
                // existing active row is reused so the uniqueness invariant
                // holds.
                let subscription = match existing {
                    Some(mut existing) => {
                        existing.delta_token = String::new();
                        existing.preference_applied = false;
                        store.update_subscription(&existing)?;
                        existing
                    }
                    None => {
                        let subscription =
                            OdpSubscription::new(service_url, entity_set_name, secret_name);
                        store.create_subscription(&subscription)?;
                        subscription
                    }
                };
                (subscription, SubscriptionPhase::InitialLoad)
            }
        };

        let manager = Self {
            store,
            phase,
            subscription,
            current_audit_id: None,
            operation_start: OffsetDateTime::now_utc(),
        };
        manager.log_state();
        Ok(manager)
    }

    pub fn phase(&self) -> SubscriptionPhase {
        self.phase
    }

    pub fn subscription(&self) -> &OdpSubscription {
        &self.subscription
    }

    pub fn current_delta_token(&self) -> &str {
        &self.subscription.delta_token
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
            && self.phase != SubscriptionPhase::Terminated
            && self.phase != SubscriptionPhase::ErrorState
    }

    /// Clear the token and mark active; the next fetch is a full load.
    pub fn transition_to_initial_load(&mut self) -> Result<()> {
        tracing::info!(target: "odp.state", "transition to INITIAL_LOAD");
        self.phase = SubscriptionPhase::InitialLoad;
        self.subscription.delta_token = String::new();
        self.subscription.preference_applied = false;
        self.subscription.subscription_status = STATUS_ACTIVE.to_string();
        self.persist()?;
        self.log_state();
        Ok(())
    }

    /// Store a fresh delta token and mark active.
    pub fn transition_to_delta_fetch(
        &mut self,
        delta_token: &str,
        preference_applied: bool,
    ) -> Result<()> {
        tracing::info!(
            target: "odp.state",
            "transition to DELTA_FETCH (preference_applied: {preference_applied})"
        );
        self.phase = SubscriptionPhase::DeltaFetch;
        self.subscription.delta_token = delta_token.to_string();
        self.subscription.preference_applied = preference_applied;
        self.subscription.subscription_status = STATUS_ACTIVE.to_string();
        self.persist()?;
        self.log_state();
        Ok(())
    }

    pub fn transition_to_terminated(&mut self) -> Result<()> {
        tracing::info!(target: "odp.state", "transition to TERMINATED");
        self.phase = SubscriptionPhase::Terminated;
        self.subscription.subscription_status = STATUS_TERMINATED.to_string();
        self.store
            .update_status(&self.subscription.subscription_id, STATUS_TERMINATED)?;
        self.log_state();
        Ok(())
    }

    /// Mark the subscription failed and close the open audit entry with the
    /// error message.
    pub fn transition_to_error(&mut self, error_message: &str) -> Result<()> {
        tracing::error!(target: "odp.state", "transition to ERROR_STATE: {error_message}");
        self.phase = SubscriptionPhase::ErrorState;
        self.subscription.subscription_status = STATUS_ERROR.to_string();
        self.store
            .update_status(&self.subscription.subscription_id, STATUS_ERROR)?;

        if self.current_audit_id.is_some() {
            self.update_audit_entry(None, 0, 0, "", error_message, None);
        }
        self.log_state();
        Ok(())
    }

    /// Open an audit entry for an operation. Failures are logged, not
    /// raised; `None` means no entry could be recorded.
    pub fn create_audit_entry(
        &mut self,
        operation: OdpOperation,
        request_url: &str,
    ) -> Option<i64> {
        self.operation_start = OffsetDateTime::now_utc();

        let mut entry = OdpAuditEntry::new(&self.subscription.subscription_id, operation);
        entry.request_url = request_url.to_string();
        entry.delta_token_before = self.subscription.delta_token.clone();

        match self.store.create_audit_entry(&entry) {
            Ok(audit_id) => {
                self.current_audit_id = Some(audit_id);
                Some(audit_id)
            }
            Err(error) => {
                tracing::warn!(target: "odp.state", "failed to create audit entry: {error}");
                self.current_audit_id = None;
                None
            }
        }
    }

    /// Complete the open audit entry. Duration is computed from the
    /// operation start when not supplied. Failures are logged, not raised.
    pub fn update_audit_entry(
        &mut self,
        http_status_code: Option<u16>,
        rows_fetched: i64,
        package_size_bytes: i64,
        delta_token_after: &str,
        error_message: &str,
        duration_ms: Option<i64>,
    ) {
        let Some(audit_id) = self.current_audit_id else {
            return;
        };

        let response_timestamp = OffsetDateTime::now_utc();
        let duration_ms = duration_ms.unwrap_or_else(|| {
            (response_timestamp - self.operation_start).whole_milliseconds() as i64
        });

        let mut entry = OdpAuditEntry::new(
            &self.subscription.subscription_id,
            OdpOperation::InitialLoad,
        );
        entry.audit_id = audit_id;
        entry.response_timestamp = Some(response_timestamp);
        entry.http_status_code = http_status_code;
        entry.rows_fetched = rows_fetched;
        entry.package_size_bytes = package_size_bytes;
        entry.delta_token_after = delta_token_after.to_string();
        entry.error_message = error_message.to_string();
        entry.duration_ms = Some(duration_ms);

        if let Err(error) = self.store.update_audit_entry(&entry) {
            tracing::warn!(target: "odp.state", "failed to update audit entry: {error}");
        }
    }

    fn persist(&self) -> Result<()> {
        let mut subscription = self.subscription.clone();
        subscription.last_updated = OffsetDateTime::now_utc();
        if !self.store.update_subscription(&subscription)? {
            return Err(Error::StateConflict(format!(
                "subscription '{}' vanished while updating",
                subscription.subscription_id
            )));
        }
        Ok(())
    }

    fn log_state(&self) {
        let token_preview = if self.subscription.delta_token.is_empty() {
            "NONE".to_string()
        } else {
            let token = &self.subscription.delta_token;
            let mut end = token.len().min(20);
            while !token.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &token[..end])
        };
        tracing::info!(
            target: "odp.state",
            "state: id={}, phase={}, status={}, token={token_preview}, preference_applied={}",
            self.subscription.subscription_id,
            self.phase,
            self.subscription.subscription_status,
            self.subscription.preference_applied
        );
    }
}
