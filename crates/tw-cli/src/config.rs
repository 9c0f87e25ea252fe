//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Whether the acquisition passes run at all.
    pub enable_performance: bool,
    /// Whether the fire-and-forget transport strategy may be used.
    pub enable_fire_and_forget: bool,
    /// Whether the streaming transport strategy may be used.
    pub enable_streaming: bool,
    /// Debounce window between flushes, in milliseconds.
    pub polling_interval_ms: u64,
    /// Default collector URL when `--url` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_performance: true,
            enable_fire_and_forget: true,
            enable_streaming: true,
            polling_interval_ms: 200,
            endpoint: None,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TW_*)
        figment = figment.merge(Env::prefixed("TW_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for tw.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tw"))
}
