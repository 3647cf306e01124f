//! Federation config file.
//!
//! Holds the share declarations of one container plus the container-level
//! options a child build needs. Both `federation.json` and
//! `federation.toml` deserialize into the same JSON value model.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::descriptor::{ShareDescriptor, ShareScope};
use crate::core::share_config::{ConfigError, ShareConfigNormalizer};

/// File names searched for, in order.
pub const CONFIG_FILES: [&str; 2] = ["federation.json", "federation.toml"];

/// Default remote entry file name.
pub const DEFAULT_REMOTE_FILENAME: &str = "remoteEntry.js";

/// Library the container is exposed as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default = "default_library_type")]
    pub kind: String,
}

fn default_library_type() -> String {
    "var".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FederationConfig {
    pub name: Option<String>,
    pub filename: Option<String>,
    pub library: Option<LibraryOptions>,
    pub share_scope: Option<ShareScope>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub exposes: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub remotes: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provides: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumes: Option<Value>,
    /// Leave the framework's own modules out of `shared`.
    pub skip_sharing_next_internals: bool,
}

impl FederationConfig {
    /// Load a config file; `.toml` files are parsed as TOML, anything else
    /// as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let parsed = if is_toml {
            Self::parse_toml(&content)
        } else {
            Self::parse_json(&content)
        };
        parsed.with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn parse_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Container name, defaulting to `app`.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("app")
    }

    pub fn filename(&self) -> &str {
        self.filename.as_deref().unwrap_or(DEFAULT_REMOTE_FILENAME)
    }

    pub fn normalizer(&self, context: &Path) -> ShareConfigNormalizer {
        let normalizer = ShareConfigNormalizer::new(context);
        match &self.share_scope {
            Some(scope) => normalizer.with_share_scope(scope.clone()),
            None => normalizer,
        }
    }

    /// Normalize every declaration section: `consumes`, `provides`, then
    /// `shared`.
    pub fn normalize(&self, context: &Path) -> Result<Vec<ShareDescriptor>, ConfigError> {
        let normalizer = self.normalizer(context);
        let mut descriptors = Vec::new();
        if let Some(consumes) = &self.consumes {
            descriptors.extend(normalizer.normalize_consumes(consumes)?);
        }
        if let Some(provides) = &self.provides {
            descriptors.extend(normalizer.normalize_provides(provides)?);
        }
        if let Some(shared) = &self.shared {
            descriptors.extend(normalizer.normalize_shared(shared)?);
        }
        Ok(descriptors)
    }

    /// Number of top-level declarations across all sections.
    pub fn declaration_count(&self) -> usize {
        [&self.consumes, &self.provides, &self.shared]
            .into_iter()
            .flatten()
            .map(|value| match value {
                Value::Object(map) => map.len(),
                Value::Array(list) => list.len(),
                Value::String(_) => 1,
                _ => 0,
            })
            .sum()
    }
}
