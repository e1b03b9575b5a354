//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (AUTOSCHED_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [search]
//! beam_size = 32
//! num_passes = 5
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! AUTOSCHED_SEARCH__BEAM_SIZE=64
//! AUTOSCHED_LOGGING__LEVEL=debug
//! ```

use figment::{Figment, providers::{Env, Format, Toml}};
use serde::{Deserialize, Serialize};

/// Top-level configuration: search parameters plus the ambient logging
/// surface (spec §6a).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchParams,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Search-engine tunables (spec §4.4, §7): beam width, pass count, dropout,
/// RNG seed, and the coarse-to-fine/interactive mode switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Number of states kept alive per round within a pass.
    #[serde(default = "default_beam_size")]
    pub beam_size: u32,

    /// Number of coarse-to-fine passes. 0 means "use the engine default"
    /// (spec §4.4: `DEFAULT_NUM_PASSES`).
    #[serde(default)]
    pub num_passes: u32,

    /// Percent chance (0-100) a surviving state is kept after amortized
    /// per-decision dropout; 100 disables dropout.
    #[serde(default = "default_dropout")]
    pub random_dropout_percent: u32,

    /// Seed for the search's RNG, so identical seeds reproduce identical
    /// winners (spec §5).
    #[serde(default)]
    pub random_seed: u64,

    /// Choose-your-own-schedule mode: pins `num_passes` to 1 and routes
    /// child selection through a [`SelectionPolicy`](crate::search::interactive::SelectionPolicy).
    #[serde(default)]
    pub interactive: bool,

    /// Run a freeze-inline-compute-root pre-pass before the main passes
    /// (spec §4.4, "Coarse-to-fine driver").
    #[serde(default)]
    pub freeze_inline_compute_root: bool,

    /// Disable the smaller subtiling candidates, considering only the
    /// coarsest tile sizes per loop.
    #[serde(default)]
    pub no_subtiling: bool,

    /// Permit states whose tiling would produce a failed/empty unrolled
    /// loop rather than rejecting them outright.
    #[serde(default)]
    pub permit_failed_unroll: bool,
}

fn default_beam_size() -> u32 { 32 }
fn default_dropout() -> u32 { 100 }

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            beam_size: default_beam_size(),
            num_passes: 0,
            random_dropout_percent: default_dropout(),
            random_seed: 0,
            interactive: false,
            freeze_inline_compute_root: false,
            no_subtiling: false,
            permit_failed_unroll: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (AUTOSCHED_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("AUTOSCHED_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("AUTOSCHED_").split("__"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            search: SearchParams::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_search_params_disable_dropout_and_pick_beam_32() {
        let params = SearchParams::default();
        assert_eq!(params.beam_size, 32);
        assert_eq!(params.random_dropout_percent, 100);
        assert!(!params.interactive);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("[logging]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.search.beam_size, config.search.beam_size);
    }

    #[test]
    fn env_override_splits_on_double_underscore() {
        std::env::set_var("AUTOSCHED_SEARCH__BEAM_SIZE", "64");
        let loaded = Figment::new()
            .merge(figment::providers::Serialized::defaults(Config::default()))
            .merge(Env::prefixed("AUTOSCHED_").split("__"))
            .extract::<Config>()
            .unwrap();
        std::env::remove_var("AUTOSCHED_SEARCH__BEAM_SIZE");
        assert_eq!(loaded.search.beam_size, 64);
    }
}
