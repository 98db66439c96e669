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

//! Service attach: every entity set of a service becomes a host-level view
//! over the read path.
//!
//! One-shot: the service document is enumerated once and a view definition
//! produced per entity set not matching an ignore pattern. Executing the
//! definitions is the host's job; without `overwrite`, name collisions
//! surface as errors there rather than being silently renamed.

use crate::client::ClientContext;
use crate::client::ODataServiceClient;
use odata_bridge_core::AuthParams;
use odata_bridge_core::Error;
use odata_bridge_core::HttpUrl;
use odata_bridge_core::Result;

#[derive(Debug, Clone, Default)]
pub struct AttachOptions {
    /// Emit `CREATE OR REPLACE VIEW` instead of `CREATE VIEW`.
    pub overwrite: bool,
    /// Glob patterns; entity sets whose name matches any are skipped.
    pub ignore: Vec<String>,
}

/// One view to be created by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedView {
    pub view_name: String,
    pub entity_set_url: String,
    pub create_view_sql: String,
}

/// Enumerate a service's entity sets into view definitions.
pub fn attach_entity_sets(
    context: &ClientContext,
    service_url: &str,
    auth: AuthParams,
    options: &AttachOptions,
) -> Result<Vec<AttachedView>> {
    let patterns = options
        .ignore
        .iter()
        .map(|pattern| {
            glob::Pattern::new(pattern).map_err(|e| {
                Error::invalid_input(format!("invalid ignore pattern '{pattern}': {e}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let url = HttpUrl::parse(service_url)?;
    let mut client = ODataServiceClient::new(context, url, auth);

    let mut views = Vec::new();
    for reference in client.entity_sets()? {
        if patterns.iter().any(|pattern| pattern.matches(&reference.name)) {
            tracing::debug!(
                target: "odata.attach",
                "skipping entity set '{}' (ignore pattern)",
                reference.name
            );
            continue;
        }

        let create = if options.overwrite {
            "CREATE OR REPLACE VIEW"
        } else {
            "CREATE VIEW"
        };
        let quoted_name = reference.name.replace('"', "\"\"");
        let quoted_url = reference.url.replace('\'', "''");
        let create_view_sql =
            format!("{create} \"{quoted_name}\" AS SELECT * FROM odata_read('{quoted_url}');");

        views.push(AttachedView {
            view_name: reference.name,
            entity_set_url: reference.url,
            create_view_sql,
        });
    }

    tracing::info!(
        target: "odata.attach",
        "prepared {} views from {service_url}",
        views.len()
    );
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use odata_bridge_mock::MockTransport;
    use std::sync::Arc;

    fn context_with_service() -> ClientContext {
        let mock = MockTransport::new();
        mock.on_json(
            "https://host/svc",
            r#"{"@odata.context":"$metadata",
                "value":[
                  {"name":"People","kind":"EntitySet","url":"People"},
                  {"name":"Airlines","kind":"EntitySet","url":"Airlines"},
                  {"name":"Airports","kind":"EntitySet","url":"Airports"}]}"#,
        );
        ClientContext::new(Arc::new(mock))
    }

    #[test]
    fn emits_one_view_per_entity_set() {
        let context = context_with_service();
        let views = attach_entity_sets(
            &context,
            "https://host/svc",
            AuthParams::None,
            &AttachOptions::default(),
        )
        .unwrap();

        assert_eq!(views.len(), 3);
        assert_eq!(views[0].view_name, "People");
        assert_eq!(views[0].entity_set_url, "https://host/svc/People");
        assert_eq!(
            views[0].create_view_sql,
            "CREATE VIEW \"People\" AS SELECT * FROM odata_read('https://host/svc/People');"
        );
    }

    #[test]
    fn ignore_patterns_filter_by_glob() {
        let context = context_with_service();
        let options = AttachOptions {
            overwrite: false,
            ignore: vec!["Air*".to_string()],
        };
        let views = attach_entity_sets(
            &context,
            "https://host/svc",
            AuthParams::None,
            &options,
        )
        .unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].view_name, "People");
    }

    #[test]
    fn overwrite_switches_to_create_or_replace() {
        let context = context_with_service();
        let options = AttachOptions {
            overwrite: true,
            ignore: Vec::new(),
        };
        let views = attach_entity_sets(
            &context,
            "https://host/svc",
            AuthParams::None,
            &options,
        )
        .unwrap();
        assert!(views[0].create_view_sql.starts_with("CREATE OR REPLACE VIEW"));
    }
}
