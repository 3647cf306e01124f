//! `package.json` lookup.
//!
//! Share declarations infer two things from package manifests: the
//! `requiredVersion` of a consumed package (from the consuming project's
//! dependency lists) and the `version` of a provided module (from the
//! provided package's own manifest).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::Version;
use serde::Deserialize;
use tracing::debug;

use crate::core::descriptor::RequiredVersion;
use crate::resolver::version::{parse_range, parse_version};
use crate::util::fs::find_upwards;

pub const PACKAGE_JSON: &str = "package.json";

/// The fields of a `package.json` that sharing cares about.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub main: Option<String>,

    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, String>,

    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageJson {
    /// Load a manifest from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    /// Parse manifest content.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Find and load the manifest nearest to `dir`, walking upwards.
    pub fn find_nearest(dir: &Path) -> Option<(PathBuf, Self)> {
        let path = find_upwards(dir, PACKAGE_JSON)?;
        match Self::load(&path) {
            Ok(manifest) => Some((path, manifest)),
            Err(e) => {
                debug!("ignoring unreadable manifest: {:#}", e);
                None
            }
        }
    }

    /// The declared range for `package_name`.
    ///
    /// Checked in order: dependencies, peer, optional, dev.
    pub fn declared_range(&self, package_name: &str) -> Option<&str> {
        [
            &self.dependencies,
            &self.peer_dependencies,
            &self.optional_dependencies,
            &self.dev_dependencies,
        ]
        .into_iter()
        .find_map(|deps| deps.get(package_name))
        .map(String::as_str)
    }

    /// The package's own version, if present and valid.
    pub fn parsed_version(&self) -> Option<Version> {
        self.version.as_deref().and_then(|v| parse_version(v).ok())
    }
}

/// Whether a request is a bare package specifier rather than a path.
pub fn is_bare_specifier(request: &str) -> bool {
    !(request.is_empty()
        || request.starts_with('.')
        || request.starts_with('/')
        || request.contains(':')
        || request.contains('\\'))
}

/// The package segment of a bare request: `@scope/name` or `name`.
pub fn package_name_of(request: &str) -> Option<&str> {
    if !is_bare_specifier(request) {
        return None;
    }

    let mut slashes = request.match_indices('/').map(|(i, _)| i);
    let end = if request.starts_with('@') {
        slashes.nth(1)
    } else {
        slashes.next()
    };

    let name = match end {
        Some(i) => &request[..i],
        None => request,
    };

    if name.starts_with('@') && !name.contains('/') {
        return None;
    }
    Some(name)
}

/// Infer `requiredVersion` for `package_name` from the manifest nearest to `context`.
///
/// Missing manifests, missing entries and unparseable ranges all yield
/// `Disabled`.
pub fn infer_required_version(context: &Path, package_name: &str) -> RequiredVersion {
    let Some((path, manifest)) = PackageJson::find_nearest(context) else {
        debug!(
            "no package.json above {}, version check for `{}` disabled",
            context.display(),
            package_name
        );
        return RequiredVersion::Disabled;
    };

    let Some(declared) = manifest.declared_range(package_name) else {
        debug!(
            "`{}` is not declared in {}, version check disabled",
            package_name,
            path.display()
        );
        return RequiredVersion::Disabled;
    };

    match parse_range(declared) {
        Ok(range) => RequiredVersion::Value(range),
        Err(e) => {
            debug!("{}, version check for `{}` disabled", e, package_name);
            RequiredVersion::Disabled
        }
    }
}

/// Locate `node_modules/<package_name>` from `context` upwards.
pub fn find_package_dir(context: &Path, package_name: &str) -> Option<PathBuf> {
    context
        .ancestors()
        .map(|dir| dir.join("node_modules").join(package_name))
        .find(|dir| dir.join(PACKAGE_JSON).is_file())
}

/// Resolve a request to a file: relative and absolute paths against
/// `context`, bare specifiers through `node_modules`.
pub fn resolve_module(context: &Path, request: &str) -> Option<PathBuf> {
    if !is_bare_specifier(request) {
        return if request.contains(':') {
            None
        } else {
            resolve_file(&context.join(request))
        };
    }

    let package_name = package_name_of(request)?;
    let package_dir = find_package_dir(context, package_name)?;
    let subpath = request[package_name.len()..].trim_start_matches('/');
    if !subpath.is_empty() {
        return resolve_file(&package_dir.join(subpath));
    }

    let main = PackageJson::load(&package_dir.join(PACKAGE_JSON))
        .ok()
        .and_then(|manifest| manifest.main)
        .unwrap_or_else(|| "index.js".to_string());
    resolve_file(&package_dir.join(main))
}

/// `path` itself, `path.js`, or `path/index.js`, whichever is a file.
fn resolve_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let with_ext = PathBuf::from(format!("{}.js", path.display()));
    if with_ext.is_file() {
        return Some(with_ext);
    }
    let index = path.join("index.js");
    index.is_file().then_some(index)
}

/// The version of the package a resolved module file belongs to.
pub fn version_of_module(module_path: &Path) -> Option<Version> {
    let start = if module_path.is_dir() {
        module_path
    } else {
        module_path.parent()?
    };
    PackageJson::find_nearest(start).and_then(|(_, manifest)| manifest.parsed_version())
}
