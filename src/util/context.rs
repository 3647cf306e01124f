//! Global context for fedshare operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::federation::CONFIG_FILES;
use crate::util::config::{self, Config, CONFIG_DIR};

/// Error locating a federation config.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("could not find federation.json or federation.toml in {} or any parent directory", .dir.display())]
    NotFound { dir: PathBuf },

    #[error(
        "found both {} and {}; remove one of them",
        .primary.display(),
        .alias.display()
    )]
    Ambiguous { primary: PathBuf, alias: PathBuf },
}

/// Look for a federation config in `dir` only.
pub fn find_config_in(dir: &Path) -> Result<Option<PathBuf>, DiscoveryError> {
    let found: Vec<PathBuf> = CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect();

    match found.as_slice() {
        [] => Ok(None),
        [path] => Ok(Some(path.clone())),
        [primary, alias, ..] => Err(DiscoveryError::Ambiguous {
            primary: primary.clone(),
            alias: alias.clone(),
        }),
    }
}

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global fedshare data (~/.fedshare/)
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::at(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let cwd = if cwd.is_absolute() {
            cwd
        } else {
            std::env::current_dir()
                .context("failed to get current directory")?
                .join(cwd)
        };
        Ok(Self::at(cwd))
    }

    fn at(cwd: PathBuf) -> Self {
        let home = config::global_config_dir().unwrap_or_else(|| PathBuf::from(CONFIG_DIR));
        GlobalContext {
            cwd,
            home,
            verbose: false,
            color: true,
        }
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the fedshare home directory (~/.fedshare/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn color(&self) -> bool {
        self.color
    }

    /// Resolve a path given on the command line against the cwd.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Find the federation config starting from cwd and searching upward.
    pub fn find_federation_config(&self) -> Result<PathBuf, DiscoveryError> {
        let mut current = self.cwd.clone();
        loop {
            if let Some(path) = find_config_in(&current)? {
                return Ok(path);
            }
            if !current.pop() {
                return Err(DiscoveryError::NotFound {
                    dir: self.cwd.clone(),
                });
            }
        }
    }

    /// Tool settings for the project rooted at `project_root`.
    pub fn load_config(&self, project_root: &Path) -> Config {
        config::load_config(&self.config_path(), &config::project_config_path(project_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let ctx = GlobalContext::new().unwrap();
        assert!(ctx.cwd().is_absolute());
        assert!(ctx.home().ends_with(".fedshare"));
        assert!(ctx.config_path().ends_with(".fedshare/config.toml"));
    }

    #[test]
    fn test_find_federation_config_upward() {
        let tmp = TempDir::new().unwrap();
        let config = tmp.path().join("federation.toml");
        std::fs::write(&config, "name = \"app\"\n").unwrap();
        let nested = tmp.path().join("src/pages");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = GlobalContext::with_cwd(nested).unwrap();
        assert_eq!(ctx.find_federation_config().ok(), Some(config));
    }

    #[test]
    fn test_find_federation_config_ambiguous() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("federation.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("federation.toml"), "").unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        assert!(matches!(
            ctx.find_federation_config(),
            Err(DiscoveryError::Ambiguous { .. })
        ));
    }

    #[test]
    fn test_project_config_overrides() {
        let tmp = TempDir::new().unwrap();
        let project_config = config::project_config_path(tmp.path());
        std::fs::create_dir_all(project_config.parent().unwrap()).unwrap();
        std::fs::write(&project_config, "[runtime]\ndefault_share_scope = \"legacy\"\n").unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        assert_eq!(ctx.load_config(tmp.path()).share_scope(), "legacy");
        assert_eq!(ctx.resolve_path(Path::new("a.json")), tmp.path().join("a.json"));
    }
}
