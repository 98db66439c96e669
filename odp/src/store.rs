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

//! Subscription persistence.
//!
//! [`SubscriptionStore`] is the seam the state machine drives. Two
//! implementations ship: [`MemorySubscriptionStore`] for tests and hosts
//! without SQL, and [`sql::SqlSubscriptionStore`], which renders the
//! `erpl_web.subscriptions` / `erpl_web.audit` DDL and queries through a
//! host-provided [`sql::SqlExecutor`]. The store takes no locks of its own
//! beyond its in-memory maps; concurrent SQL access is serialized by the
//! host database.

use crate::model::OdpAuditEntry;
use crate::model::OdpSubscription;
use crate::model::STATUS_ACTIVE;
use odata_bridge_core::Error;
use odata_bridge_core::Result;
use std::collections::HashMap;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use time::OffsetDateTime;

/// Persistence operations for subscriptions and their audit log.
///
/// Invariant upheld by every implementation: at most one `active` row per
/// (service_url, entity_set_name).
pub trait SubscriptionStore: Send + Sync {
    /// Insert a subscription.
    ///
    /// # Errors
    ///
    /// `Error::StateConflict` when an active subscription for the same
    /// (service_url, entity_set_name) already exists and the new row is
    /// active too.
    fn create_subscription(&self, subscription: &OdpSubscription) -> Result<()>;

    fn get_subscription(&self, subscription_id: &str) -> Result<Option<OdpSubscription>>;

    fn find_active_subscription(
        &self,
        service_url: &str,
        entity_set_name: &str,
    ) -> Result<Option<OdpSubscription>>;

    fn list_subscriptions(&self) -> Result<Vec<OdpSubscription>>;

    fn list_active_subscriptions(&self) -> Result<Vec<OdpSubscription>> {
        Ok(self
            .list_subscriptions()?
            .into_iter()
            .filter(OdpSubscription::is_active)
            .collect())
    }

    /// Overwrite a full row. `false` when the id is unknown.
    fn update_subscription(&self, subscription: &OdpSubscription) -> Result<bool>;

    fn update_delta_token(&self, subscription_id: &str, delta_token: &str) -> Result<bool>;

    fn update_status(&self, subscription_id: &str, status: &str) -> Result<bool>;

    fn remove_subscription(&self, subscription_id: &str) -> Result<bool>;

    /// Insert an audit row and return its assigned id.
    fn create_audit_entry(&self, entry: &OdpAuditEntry) -> Result<i64>;

    /// Complete an audit row by id. `false` when the id is unknown.
    fn update_audit_entry(&self, entry: &OdpAuditEntry) -> Result<bool>;

    fn audit_history(&self, subscription_id: &str, days_back: i64) -> Result<Vec<OdpAuditEntry>>;
}

/// Mutex-protected in-memory store.
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    subscriptions: Mutex<HashMap<String, OdpSubscription>>,
    audit: Mutex<Vec<OdpAuditEntry>>,
    next_audit_id: AtomicI64,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            audit: Mutex::new(Vec::new()),
            next_audit_id: AtomicI64::new(1),
        }
    }
}

impl SubscriptionStore for MemorySubscriptionStore {
    fn create_subscription(&self, subscription: &OdpSubscription) -> Result<()> {
        let mut subscriptions = self.subscriptions.lock().expect("store poisoned");
        if subscription.is_active() {
            let conflict = subscriptions.values().any(|existing| {
                existing.is_active()
                    && existing.service_url == subscription.service_url
                    && existing.entity_set_name == subscription.entity_set_name
            });
            if conflict {
                return Err(Error::StateConflict(format!(
                    "an active subscription for ({}, {}) already exists",
                    subscription.service_url, subscription.entity_set_name
                )));
            }
        }
        subscriptions.insert(subscription.subscription_id.clone(), subscription.clone());
        Ok(())
    }

    fn get_subscription(&self, subscription_id: &str) -> Result<Option<OdpSubscription>> {
        let subscriptions = self.subscriptions.lock().expect("store poisoned");
        Ok(subscriptions.get(subscription_id).cloned())
    }

    fn find_active_subscription(
        &self,
        service_url: &str,
        entity_set_name: &str,
    ) -> Result<Option<OdpSubscription>> {
        let subscriptions = self.subscriptions.lock().expect("store poisoned");
        Ok(subscriptions
            .values()
            .find(|subscription| {
                subscription.is_active()
                    && subscription.service_url == service_url
                    && subscription.entity_set_name == entity_set_name
            })
            .cloned())
    }

    fn list_subscriptions(&self) -> Result<Vec<OdpSubscription>> {
        let subscriptions = self.subscriptions.lock().expect("store poisoned");
        let mut all: Vec<OdpSubscription> = subscriptions.values().cloned().collect();
        all.sort_by(|a, b| a.subscription_id.cmp(&b.subscription_id));
        Ok(all)
    }

    fn update_subscription(&self, subscription: &OdpSubscription) -> Result<bool> {
        let mut subscriptions = self.subscriptions.lock().expect("store poisoned");
        match subscriptions.get_mut(&subscription.subscription_id) {
            Some(existing) => {
                *existing = subscription.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn update_delta_token(&self, subscription_id: &str, delta_token: &str) -> Result<bool> {
        let mut subscriptions = self.subscriptions.lock().expect("store poisoned");
        match subscriptions.get_mut(subscription_id) {
            Some(subscription) => {
                subscription.delta_token = delta_token.to_string();
                subscription.last_updated = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn update_status(&self, subscription_id: &str, status: &str) -> Result<bool> {
        let mut subscriptions = self.subscriptions.lock().expect("store poisoned");
        match subscriptions.get_mut(subscription_id) {
            Some(subscription) => {
                subscription.subscription_status = status.to_string();
                subscription.last_updated = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_subscription(&self, subscription_id: &str) -> Result<bool> {
        let mut subscriptions = self.subscriptions.lock().expect("store poisoned");
        Ok(subscriptions.remove(subscription_id).is_some())
    }

    fn create_audit_entry(&self, entry: &OdpAuditEntry) -> Result<i64> {
        let audit_id = self.next_audit_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = entry.clone();
        stored.audit_id = audit_id;
        self.audit.lock().expect("store poisoned").push(stored);
        Ok(audit_id)
    }

    fn update_audit_entry(&self, entry: &OdpAuditEntry) -> Result<bool> {
        let mut audit = self.audit.lock().expect("store poisoned");
        match audit.iter_mut().find(|row| row.audit_id == entry.audit_id) {
            Some(row) => {
                row.response_timestamp = entry.response_timestamp;
                row.http_status_code = entry.http_status_code;
                row.rows_fetched = entry.rows_fetched;
                row.package_size_bytes = entry.package_size_bytes;
                row.delta_token_after = entry.delta_token_after.clone();
                row.error_message = entry.error_message.clone();
                row.duration_ms = entry.duration_ms;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn audit_history(&self, subscription_id: &str, days_back: i64) -> Result<Vec<OdpAuditEntry>> {
        let cutoff = OffsetDateTime::now_utc() - time::Duration::days(days_back);
        let audit = self.audit.lock().expect("store poisoned");
        Ok(audit
            .iter()
            .filter(|row| {
                row.subscription_id == subscription_id && row.request_timestamp >= cutoff
            })
            .cloned()
            .collect())
    }
}

pub mod sql {
    //! SQL rendering of the store against a host database.
    //!
    //! Tables live in the `erpl_web` schema; all statements go through the
    //! host's [`SqlExecutor`], whose isolation serializes concurrent
    //! access.

    use super::*;
    use crate::model::timestamp_from_string;
    use crate::model::timestamp_to_string;

    /// Minimal SQL surface the host provides.
    pub trait SqlExecutor: Send + Sync {
        /// Run a statement; returns affected row count.
        fn execute(&self, sql: &str) -> Result<u64>;

        /// Run a query; rows of nullable text cells, in column order.
        fn query(&self, sql: &str) -> Result<Vec<Vec<Option<String>>>>;
    }

    pub const SCHEMA_DDL: &str = "CREATE SCHEMA IF NOT EXISTS erpl_web;";

    pub const SUBSCRIPTIONS_DDL: &str = "\
CREATE TABLE IF NOT EXISTS erpl_web.subscriptions (
    subscription_id VARCHAR PRIMARY KEY,
    service_url VARCHAR NOT NULL,
    entity_set_name VARCHAR NOT NULL,
    secret_name VARCHAR,
    delta_token VARCHAR,
    created_at TIMESTAMP NOT NULL,
    last_updated TIMESTAMP NOT NULL,
    subscription_status VARCHAR NOT NULL,
    preference_applied BOOLEAN NOT NULL
);";

    pub const AUDIT_DDL: &str = "\
CREATE TABLE IF NOT EXISTS erpl_web.audit (
    audit_id BIGINT PRIMARY KEY,
    subscription_id VARCHAR NOT NULL,
    operation_type VARCHAR NOT NULL,
    request_ts TIMESTAMP NOT NULL,
    response_ts TIMESTAMP,
    request_url VARCHAR,
    http_status_code INTEGER,
    rows_fetched BIGINT,
    package_size_bytes BIGINT,
    delta_token_before VARCHAR,
    delta_token_after VARCHAR,
    error_message VARCHAR,
    duration_ms BIGINT
);";

    const SUBSCRIPTION_COLUMNS: &str = "subscription_id, service_url, entity_set_name, \
         secret_name, delta_token, created_at, last_updated, subscription_status, \
         preference_applied";

    fn quote(text: &str) -> String {
        format!("'{}'", text.replace('\'', "''"))
    }

    fn quote_opt(value: Option<&str>) -> String {
        value.map_or_else(|| "NULL".to_string(), quote)
    }

    /// Store rendering SQL against the host executor. Schema and tables are
    /// created lazily before the first statement.
    pub struct SqlSubscriptionStore<E: SqlExecutor> {
        executor: E,
        initialized: Mutex<bool>,
    }

    impl<E: SqlExecutor> SqlSubscriptionStore<E> {
        pub fn new(executor: E) -> Self {
            Self {
                executor,
                initialized: Mutex::new(false),
            }
        }

        fn ensure_initialized(&self) -> Result<()> {
            let mut initialized = self.initialized.lock().expect("store poisoned");
            if !*initialized {
                self.executor.execute(SCHEMA_DDL)?;
                self.executor.execute(SUBSCRIPTIONS_DDL)?;
                self.executor.execute(AUDIT_DDL)?;
                *initialized = true;
            }
            Ok(())
        }

        fn subscription_from_row(row: &[Option<String>]) -> Result<OdpSubscription> {
            let text = |index: usize| -> String {
                row.get(index)
                    .and_then(Clone::clone)
                    .unwrap_or_default()
            };
            Ok(OdpSubscription {
                subscription_id: text(0),
                service_url: text(1),
                entity_set_name: text(2),
                secret_name: text(3),
                delta_token: text(4),
                created_at: timestamp_from_string(&text(5))?,
                last_updated: timestamp_from_string(&text(6))?,
                subscription_status: text(7),
                preference_applied: matches!(text(8).as_str(), "true" | "1" | "TRUE"),
            })
        }

        fn select_subscriptions(&self, predicate: &str) -> Result<Vec<OdpSubscription>> {
            self.ensure_initialized()?;
            let sql = format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM erpl_web.subscriptions {predicate};"
            );
            self.executor
                .query(&sql)?
                .iter()
                .map(|row| Self::subscription_from_row(row))
                .collect()
        }
    }

    /// Insert statement for a subscription row.
    pub fn build_insert_subscription(subscription: &OdpSubscription) -> String {
        format!(
            "INSERT INTO erpl_web.subscriptions ({SUBSCRIPTION_COLUMNS}) VALUES \
             ({}, {}, {}, {}, {}, {}, {}, {}, {});",
            quote(&subscription.subscription_id),
            quote(&subscription.service_url),
            quote(&subscription.entity_set_name),
            quote(&subscription.secret_name),
            quote(&subscription.delta_token),
            quote(&timestamp_to_string(subscription.created_at)),
            quote(&timestamp_to_string(subscription.last_updated)),
            quote(&subscription.subscription_status),
            subscription.preference_applied,
        )
    }

    /// Full-row update statement for a subscription.
    pub fn build_update_subscription(subscription: &OdpSubscription) -> String {
        format!(
            "UPDATE erpl_web.subscriptions SET service_url = {}, entity_set_name = {}, \
             secret_name = {}, delta_token = {}, last_updated = {}, \
             subscription_status = {}, preference_applied = {} WHERE subscription_id = {};",
            quote(&subscription.service_url),
            quote(&subscription.entity_set_name),
            quote(&subscription.secret_name),
            quote(&subscription.delta_token),
            quote(&timestamp_to_string(subscription.last_updated)),
            quote(&subscription.subscription_status),
            subscription.preference_applied,
            quote(&subscription.subscription_id),
        )
    }

    /// Insert statement for an audit row with an assigned id.
    pub fn build_insert_audit(entry: &OdpAuditEntry) -> String {
        format!(
            "INSERT INTO erpl_web.audit (audit_id, subscription_id, operation_type, \
             request_ts, response_ts, request_url, http_status_code, rows_fetched, \
             package_size_bytes, delta_token_before, delta_token_after, error_message, \
             duration_ms) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});",
            entry.audit_id,
            quote(&entry.subscription_id),
            quote(&entry.operation_type),
            quote(&timestamp_to_string(entry.request_timestamp)),
            quote_opt(
                entry
                    .response_timestamp
                    .map(timestamp_to_string)
                    .as_deref()
            ),
            quote(&entry.request_url),
            entry
                .http_status_code
                .map_or_else(|| "NULL".to_string(), |code| code.to_string()),
            entry.rows_fetched,
            entry.package_size_bytes,
            quote(&entry.delta_token_before),
            quote(&entry.delta_token_after),
            quote(&entry.error_message),
            entry
                .duration_ms
                .map_or_else(|| "NULL".to_string(), |ms| ms.to_string()),
        )
    }

    /// Completion update for an audit row.
    pub fn build_update_audit(entry: &OdpAuditEntry) -> String {
        format!(
            "UPDATE erpl_web.audit SET response_ts = {}, http_status_code = {}, \
             rows_fetched = {}, package_size_bytes = {}, delta_token_after = {}, \
             error_message = {}, duration_ms = {} WHERE audit_id = {};",
            quote_opt(
                entry
                    .response_timestamp
                    .map(timestamp_to_string)
                    .as_deref()
            ),
            entry
                .http_status_code
                .map_or_else(|| "NULL".to_string(), |code| code.to_string()),
            entry.rows_fetched,
            entry.package_size_bytes,
            quote(&entry.delta_token_after),
            quote(&entry.error_message),
            entry
                .duration_ms
                .map_or_else(|| "NULL".to_string(), |ms| ms.to_string()),
            entry.audit_id,
        )
    }

    impl<E: SqlExecutor> SubscriptionStore for SqlSubscriptionStore<E> {
        fn create_subscription(&self, subscription: &OdpSubscription) -> Result<()> {
            self.ensure_initialized()?;
            if subscription.is_active()
                && self
                    .find_active_subscription(
                        &subscription.service_url,
                        &subscription.entity_set_name,
                    )?
                    .is_some()
            {
                return Err(Error::StateConflict(format!(
                    "an active subscription for ({}, {}) already exists",
                    subscription.service_url, subscription.entity_set_name
                )));
            }
            self.executor
                .execute(&build_insert_subscription(subscription))?;
            Ok(())
        }

        fn get_subscription(&self, subscription_id: &str) -> Result<Option<OdpSubscription>> {
            Ok(self
                .select_subscriptions(&format!(
                    "WHERE subscription_id = {}",
                    quote(subscription_id)
                ))?
                .into_iter()
                .next())
        }

        fn find_active_subscription(
            &self,
            service_url: &str,
            entity_set_name: &str,
        ) -> Result<Option<OdpSubscription>> {
            Ok(self
                .select_subscriptions(&format!(
                    "WHERE subscription_status = {} AND service_url = {} AND entity_set_name = {}",
                    quote(STATUS_ACTIVE),
                    quote(service_url),
                    quote(entity_set_name)
                ))?
                .into_iter()
                .next())
        }

        fn list_subscriptions(&self) -> Result<Vec<OdpSubscription>> {
            self.select_subscriptions("ORDER BY subscription_id")
        }

        fn update_subscription(&self, subscription: &OdpSubscription) -> Result<bool> {
            self.ensure_initialized()?;
            let affected = self
                .executor
                .execute(&build_update_subscription(subscription))?;
            Ok(affected > 0)
        }

        fn update_delta_token(&self, subscription_id: &str, delta_token: &str) -> Result<bool> {
            self.ensure_initialized()?;
            let sql = format!(
                "UPDATE erpl_web.subscriptions SET delta_token = {}, last_updated = {} \
                 WHERE subscription_id = {};",
                quote(delta_token),
                quote(&timestamp_to_string(OffsetDateTime::now_utc())),
                quote(subscription_id),
            );
            Ok(self.executor.execute(&sql)? > 0)
        }

        fn update_status(&self, subscription_id: &str, status: &str) -> Result<bool> {
            self.ensure_initialized()?;
            let sql = format!(
                "UPDATE erpl_web.subscriptions SET subscription_status = {}, last_updated = {} \
                 WHERE subscription_id = {};",
                quote(status),
                quote(&timestamp_to_string(OffsetDateTime::now_utc())),
                quote(subscription_id),
            );
            Ok(self.executor.execute(&sql)? > 0)
        }

        fn remove_subscription(&self, subscription_id: &str) -> Result<bool> {
            self.ensure_initialized()?;
            let sql = format!(
                "DELETE FROM erpl_web.subscriptions WHERE subscription_id = {};",
                quote(subscription_id)
            );
            Ok(self.executor.execute(&sql)? > 0)
        }

        fn create_audit_entry(&self, entry: &OdpAuditEntry) -> Result<i64> {
            self.ensure_initialized()?;
            let next_id = self
                .executor
                .query("SELECT COALESCE(MAX(audit_id), 0) + 1 FROM erpl_web.audit;")?
                .first()
                .and_then(|row| row.first().cloned())
                .flatten()
                .and_then(|value| value.parse::<i64>().ok())
                .unwrap_or(1);

            let mut stored = entry.clone();
            stored.audit_id = next_id;
            self.executor.execute(&build_insert_audit(&stored))?;
            Ok(next_id)
        }

        fn update_audit_entry(&self, entry: &OdpAuditEntry) -> Result<bool> {
            self.ensure_initialized()?;
            Ok(self.executor.execute(&build_update_audit(entry))? > 0)
        }

        fn audit_history(
            &self,
            subscription_id: &str,
            days_back: i64,
        ) -> Result<Vec<OdpAuditEntry>> {
            self.ensure_initialized()?;
            let cutoff = OffsetDateTime::now_utc() - time::Duration::days(days_back);
            let sql = format!(
                "SELECT audit_id, subscription_id, operation_type, request_ts, response_ts, \
                 request_url, http_status_code, rows_fetched, package_size_bytes, \
                 delta_token_before, delta_token_after, error_message, duration_ms \
                 FROM erpl_web.audit WHERE subscription_id = {} AND request_ts >= {} \
                 ORDER BY audit_id;",
                quote(subscription_id),
                quote(&timestamp_to_string(cutoff)),
            );

            self.executor
                .query(&sql)?
                .iter()
                .map(|row| {
                    let text = |index: usize| -> String {
                        row.get(index).and_then(Clone::clone).unwrap_or_default()
                    };
                    let opt = |index: usize| -> Option<String> {
                        row.get(index).and_then(Clone::clone)
                    };
                    Ok(OdpAuditEntry {
                        audit_id: text(0).parse().unwrap_or_default(),
                        subscription_id: text(1),
                        operation_type: text(2),
                        request_timestamp: timestamp_from_string(&text(3))?,
                        response_timestamp: opt(4)
                            .map(|value| timestamp_from_string(&value))
                            .transpose()?,
                        request_url: text(5),
                        http_status_code: opt(6).and_then(|value| value.parse().ok()),
                        rows_fetched: text(7).parse().unwrap_or_default(),
                        package_size_bytes: text(8).parse().unwrap_or_default(),
                        delta_token_before: text(9),
                        delta_token_after: text(10),
                        error_message: text(11),
                        duration_ms: opt(12).and_then(|value| value.parse().ok()),
                    })
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::STATUS_TERMINATED;

    fn subscription(url: &str, entity: &str) -> OdpSubscription {
        OdpSubscription::new(url, entity, "secret")
    }

    #[test]
    fn active_uniqueness_is_enforced() {
        let store = MemorySubscriptionStore::new();
        let first = subscription("https://h/EntityOfX", "EntityOfX");
        store.create_subscription(&first).unwrap();

        let mut duplicate = subscription("https://h/EntityOfX", "EntityOfX");
        duplicate.subscription_id = format!("{}_2", duplicate.subscription_id);
        let result = store.create_subscription(&duplicate);
        assert!(matches!(result, Err(Error::StateConflict(_))));

        // A terminated twin is fine.
        duplicate.subscription_status = STATUS_TERMINATED.to_string();
        store.create_subscription(&duplicate).unwrap();
    }

    #[test]
    fn find_active_only_matches_active_rows() {
        let store = MemorySubscriptionStore::new();
        let mut row = subscription("https://h/EntityOfX", "EntityOfX");
        row.subscription_status = STATUS_TERMINATED.to_string();
        store.create_subscription(&row).unwrap();
        assert!(store
            .find_active_subscription("https://h/EntityOfX", "EntityOfX")
            .unwrap()
            .is_none());
    }

    #[test]
    fn delta_token_updates_touch_last_updated() {
        let store = MemorySubscriptionStore::new();
        let row = subscription("https://h/EntityOfX", "EntityOfX");
        store.create_subscription(&row).unwrap();

        assert!(store
            .update_delta_token(&row.subscription_id, "T1")
            .unwrap());
        let stored = store.get_subscription(&row.subscription_id).unwrap().unwrap();
        assert_eq!(stored.delta_token, "T1");
        assert!(stored.last_updated >= row.last_updated);

        assert!(!store.update_delta_token("missing", "T1").unwrap());
    }

    #[test]
    fn audit_ids_are_assigned_and_updates_complete_rows() {
        let store = MemorySubscriptionStore::new();
        let entry = OdpAuditEntry::new("sub", crate::model::OdpOperation::InitialLoad);
        let first = store.create_audit_entry(&entry).unwrap();
        let second = store.create_audit_entry(&entry).unwrap();
        assert!(second > first);

        let mut completion = entry.clone();
        completion.audit_id = first;
        completion.http_status_code = Some(200);
        completion.rows_fetched = 42;
        completion.delta_token_after = "T1".to_string();
        assert!(store.update_audit_entry(&completion).unwrap());

        let history = store.audit_history("sub", 30).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].http_status_code, Some(200));
        assert_eq!(history[0].rows_fetched, 42);
    }

    #[test]
    fn sql_builders_escape_quotes() {
        let mut row = subscription("https://h/EntityOfX", "EntityOfX");
        row.delta_token = "it's".to_string();
        let insert = sql::build_insert_subscription(&row);
        assert!(insert.contains("'it''s'"));
        assert!(insert.starts_with("INSERT INTO erpl_web.subscriptions"));

        let update = sql::build_update_subscription(&row);
        assert!(update.contains("WHERE subscription_id ="));
    }
}
