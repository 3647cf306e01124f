//! Unit fingerprints and the persistent unit cache.
//!
//! The fingerprint cache records the hash each unit had on the last build;
//! a unit whose hash is unchanged is reported fresh. The unit cache stores
//! serialized built units so a later run can skip rebuilding them.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::module::{BuildUnit, SharedModule};
use crate::util::fs::write_string;

/// Unit hashes from the previous build, keyed by identifier.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FingerprintCache {
    pub units: BTreeMap<String, String>,
}

impl FingerprintCache {
    /// Load fingerprint cache from a file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(FingerprintCache::default());
        }

        let content = std::fs::read_to_string(path)?;
        let cache: FingerprintCache = serde_json::from_str(&content)
            .with_context(|| format!("corrupt fingerprint cache: {}", path.display()))?;
        Ok(cache)
    }

    /// Save fingerprint cache to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_string(path, &content)
    }

    /// Whether a unit's hash matches the cached one.
    pub fn is_fresh(&self, unit: &dyn BuildUnit) -> bool {
        self.units
            .get(&unit.identifier())
            .is_some_and(|hash| *hash == unit.hash())
    }

    pub fn update(&mut self, unit: &dyn BuildUnit) {
        self.units.insert(unit.identifier(), unit.hash());
    }
}

/// Serialized built units.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UnitCache {
    pub units: Vec<SharedModule>,
}

impl UnitCache {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(UnitCache::default());
        }

        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("corrupt unit cache: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self)?;
        write_string(path, &content)
    }

    /// Cached unit with the given identifier, if it was built.
    pub fn get(&self, identifier: &str) -> Option<&SharedModule> {
        self.units
            .iter()
            .find(|u| !u.need_build() && u.identifier() == identifier)
    }
}
