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

//! Tracing subscriber setup.
//!
//! Every component logs through `tracing` with a `target:` naming it
//! (`"odata.client"`, `"http.transport"`, `"pushdown"`, `"odp.state"`, ...).
//! Hosts that already install a subscriber can skip this module entirely;
//! [`init_tracing`] is for embedders that want the bridge's env-driven
//! default: a level filter from `ODATA_BRIDGE_TRACE` and, when
//! `ODATA_BRIDGE_TRACE_DIR` is set, a daily-rotated log file there.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the level filter (EnvFilter syntax).
pub const TRACE_ENV: &str = "ODATA_BRIDGE_TRACE";

/// Environment variable holding the log file directory.
pub const TRACE_DIR_ENV: &str = "ODATA_BRIDGE_TRACE_DIR";

const LOG_FILE_PREFIX: &str = "odata-bridge.log";

#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// EnvFilter directive string, e.g. `info` or `odata.client=debug`.
    pub filter: String,
    /// When set, also write to a daily-rotated file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            directory: None,
        }
    }
}

impl TraceConfig {
    pub fn from_env() -> Self {
        Self {
            filter: std::env::var(TRACE_ENV).unwrap_or_else(|_| "info".to_string()),
            directory: std::env::var(TRACE_DIR_ENV).ok().map(PathBuf::from),
        }
    }
}

/// Install the global subscriber. Returns the appender guard when file
/// output is configured; dropping it flushes and stops the writer thread,
/// so hold it for the process lifetime.
///
/// Installing twice is harmless: the second call is a no-op.
pub fn init_tracing(config: &TraceConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_info_to_stdout() {
        let config = TraceConfig::default();
        assert_eq!(config.filter, "info");
        assert!(config.directory.is_none());
    }

    #[test]
    fn init_is_idempotent() {
        let config = TraceConfig::default();
        let _first = init_tracing(&config);
        let _second = init_tracing(&config);
    }
}
