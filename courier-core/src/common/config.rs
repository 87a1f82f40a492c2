/*
 * Copyright (c) 2024. Courier Contributors
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Courier messaging substrate.
///
/// Loaded from TOML files in XDG-compliant directories; every value has a
/// default so a missing or partial file is never an error.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CourierConfig {
    /// Dispatch-engine worker-pool configuration.
    pub dispatch: DispatchConfig,
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
}

/// Worker-pool sizing and idle behavior for the dispatch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Floor on concurrently live worker threads.
    pub low_water_mark: usize,
    /// Ceiling on concurrently live worker threads.
    pub high_water_mark: usize,
    /// Idle timeout in milliseconds after which a worker above the
    /// low-water mark retires itself.
    pub patience_ms: u64,
}

/// Timeout-related configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound in milliseconds on waiting for queued work to drain during
    /// engine shutdown.
    pub shutdown_drain_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            low_water_mark: 3,
            high_water_mark: 20,
            patience_ms: 20_000,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            shutdown_drain_ms: 30_000,
        }
    }
}

impl CourierConfig {
    /// Load configuration from XDG-compliant locations.
    ///
    /// Looks for `config.toml` under the `courier` prefix (typically
    /// `$XDG_CONFIG_HOME/courier/config.toml`). If no file is found, or a
    /// found file is malformed, the defaults apply and the problem is
    /// logged rather than surfaced.
    pub fn load() -> Self {
        use tracing::{error, info};

        let xdg_dirs = match xdg::BaseDirectories::with_prefix("courier") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        let Some(path) = xdg_dirs.find_config_file("config.toml") else {
            info!("No configuration file found, using defaults");
            return Self::default();
        };

        info!("Loading configuration from: {}", path.display());
        match std::fs::read_to_string(&path) {
            Ok(config_str) => match toml::from_str::<Self>(&config_str) {
                Ok(config) => config,
                Err(e) => {
                    error!("Failed to parse configuration file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read configuration file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

lazy_static! {
    /// Global configuration instance loaded from XDG-compliant locations.
    pub static ref CONFIG: CourierConfig = CourierConfig::load();
}

/// Per-engine configuration resolved at construction time.
///
/// `Default` pulls the global [`CONFIG`]; tests and embedders override
/// individual values through the `with_*` methods.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub(crate) low_water_mark: usize,
    pub(crate) high_water_mark: usize,
    pub(crate) patience: Duration,
    pub(crate) shutdown_drain: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_water_mark: CONFIG.dispatch.low_water_mark,
            high_water_mark: CONFIG.dispatch.high_water_mark,
            patience: Duration::from_millis(CONFIG.dispatch.patience_ms),
            shutdown_drain: Duration::from_millis(CONFIG.timeouts.shutdown_drain_ms),
        }
    }
}

impl EngineConfig {
    /// Overrides the worker floor.
    pub fn with_low_water_mark(mut self, low: usize) -> Self {
        self.low_water_mark = low.max(1);
        self
    }

    /// Overrides the worker ceiling. Raised to the floor when lower.
    pub fn with_high_water_mark(mut self, high: usize) -> Self {
        self.high_water_mark = high.max(self.low_water_mark);
        self
    }

    /// Overrides the idle timeout after which a worker above the floor
    /// retires itself.
    pub fn with_patience(mut self, patience: Duration) -> Self {
        self.patience = patience;
        self
    }

    /// Overrides the shutdown drain bound.
    pub fn with_shutdown_drain(mut self, bound: Duration) -> Self {
        self.shutdown_drain = bound;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CourierConfig::default();
        assert_eq!(config.dispatch.low_water_mark, 3);
        assert_eq!(config.dispatch.high_water_mark, 20);
        assert_eq!(config.dispatch.patience_ms, 20_000);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config: CourierConfig =
            toml::from_str("[dispatch]\nlow_water_mark = 5\n").expect("partial config parses");
        assert_eq!(config.dispatch.low_water_mark, 5);
        assert_eq!(config.dispatch.high_water_mark, 20);
    }

    #[test]
    fn high_water_mark_never_drops_below_floor() {
        let config = EngineConfig::default()
            .with_low_water_mark(8)
            .with_high_water_mark(2);
        assert_eq!(config.high_water_mark, 8);
    }
}
