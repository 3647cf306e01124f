//! Configuration file support for fedshare.
//!
//! fedshare supports two configuration file locations:
//! - Global: `~/.fedshare/config.toml` - User-wide defaults
//! - Project: `.fedshare/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::context::BuildMode;

/// Directory holding fedshare state, both globally and per project.
pub const CONFIG_DIR: &str = ".fedshare";

/// fedshare configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Runtime resolution settings
    pub runtime: RuntimeConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default build mode (development, production)
    pub mode: Option<String>,

    /// Default number of parallel jobs (None = auto-detect)
    pub jobs: Option<usize>,

    /// How long to wait for a child build before giving up
    pub child_timeout_secs: Option<u64>,

    /// Default output format (human, json)
    pub message_format: Option<String>,
}

/// Runtime-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Share scope used when a command does not name one
    pub default_share_scope: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory: {}", parent.display())
            })?;
        }

        let contents =
            toml::to_string_pretty(self).with_context(|| "failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.mode.is_some() {
            self.build.mode = other.build.mode;
        }
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.child_timeout_secs.is_some() {
            self.build.child_timeout_secs = other.build.child_timeout_secs;
        }
        if other.build.message_format.is_some() {
            self.build.message_format = other.build.message_format;
        }

        if other.runtime.default_share_scope.is_some() {
            self.runtime.default_share_scope = other.runtime.default_share_scope;
        }
    }

    /// Parse build mode from config string.
    pub fn mode(&self) -> Option<BuildMode> {
        self.build.mode.as_ref().and_then(|s| s.parse().ok())
    }

    pub fn child_timeout(&self) -> Option<Duration> {
        self.build.child_timeout_secs.map(Duration::from_secs)
    }

    /// Share scope for commands that take it optionally.
    pub fn share_scope(&self) -> &str {
        self.runtime
            .default_share_scope
            .as_deref()
            .unwrap_or("default")
    }
}

/// Load configuration with precedence.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.fedshare/config.toml)
/// 2. Global config (~/.fedshare/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    // Project config overrides global
    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global fedshare config directory (~/.fedshare).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(CONFIG_DIR))
}

/// Get the global config path (~/.fedshare/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.fedshare/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join("config.toml")
}
