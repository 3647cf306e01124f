//! Command implementations

pub mod build;
pub mod normalize;
pub mod resolve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use fedshare::core::FederationConfig;
use fedshare::util::GlobalContext;

/// Load the federation config named on the command line, or the nearest one.
///
/// Returns the project root (the config's directory) alongside the config.
pub fn load_federation(
    ctx: &GlobalContext,
    explicit: Option<&Path>,
) -> Result<(PathBuf, FederationConfig)> {
    let path = match explicit {
        Some(path) => ctx.resolve_path(path),
        None => ctx.find_federation_config()?,
    };
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .with_context(|| format!("config path has no parent: {}", path.display()))?;

    let config = FederationConfig::load(&path)?;
    Ok((root, config))
}
