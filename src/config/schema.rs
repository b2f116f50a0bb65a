//! Configuration schema for Boxer
//!
//! Configuration is stored at `~/.config/boxer/config.toml`

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Container runtime settings
    pub runtime: RuntimeConfig,

    /// Build behaviour
    pub build: BuildConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Container runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime CLI to drive (podman, or a Docker-compatible CLI)
    pub program: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            program: "podman".to_string(),
        }
    }
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Disable cache lookups and cache keys for every build
    pub no_cache: bool,

    /// Step names removed from the step registry
    pub omit: Vec<String>,

    /// Shell prefix used by `run` steps
    pub shell: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            no_cache: false,
            omit: vec![],
            shell: vec!["/bin/sh".to_string(), "-c".to_string()],
        }
    }
}
