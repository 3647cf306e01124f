//! Test fixtures for common test scenarios.
//!
//! This module provides on-disk project generators with a `package.json`,
//! installed `node_modules` packages, and a federation config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

/// An installed package under `node_modules`.
#[derive(Debug, Clone)]
pub struct PackageFixture {
    pub name: String,
    pub version: String,
    /// Entry file, relative to the package directory.
    pub main: String,
}

/// Fixture for a complete project structure.
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    /// Project name.
    pub name: String,
    /// Declared dependencies (name -> range).
    pub dependencies: BTreeMap<String, String>,
    /// Declared peer dependencies (name -> range).
    pub peer_dependencies: BTreeMap<String, String>,
    /// Installed packages.
    pub packages: Vec<PackageFixture>,
    /// federation.json content, if any.
    pub federation: Option<Value>,
    /// Other files (path relative to project root -> content).
    pub files: BTreeMap<PathBuf, String>,
}

impl ProjectFixture {
    /// Create a new empty project fixture.
    pub fn new(name: impl Into<String>) -> Self {
        ProjectFixture {
            name: name.into(),
            dependencies: BTreeMap::new(),
            peer_dependencies: BTreeMap::new(),
            packages: Vec::new(),
            federation: None,
            files: BTreeMap::new(),
        }
    }

    /// A host app depending on react and react-dom.
    pub fn react_app(name: impl Into<String>) -> Self {
        Self::new(name)
            .with_dependency("react", "^18.2.0")
            .with_dependency("react-dom", "^18.2.0")
            .with_package("react", "18.2.0")
            .with_package("react-dom", "18.2.0")
    }

    /// Declare a dependency in package.json.
    pub fn with_dependency(mut self, name: &str, range: &str) -> Self {
        self.dependencies.insert(name.to_string(), range.to_string());
        self
    }

    pub fn with_peer_dependency(mut self, name: &str, range: &str) -> Self {
        self.peer_dependencies
            .insert(name.to_string(), range.to_string());
        self
    }

    /// Install a package with an `index.js` entry.
    pub fn with_package(mut self, name: &str, version: &str) -> Self {
        self.packages.push(PackageFixture {
            name: name.to_string(),
            version: version.to_string(),
            main: "index.js".to_string(),
        });
        self
    }

    pub fn with_federation(mut self, config: Value) -> Self {
        self.federation = Some(config);
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    fn package_json(&self) -> Value {
        let mut manifest = json!({
            "name": self.name,
            "version": "1.0.0",
        });
        if !self.dependencies.is_empty() {
            manifest["dependencies"] = json!(self.dependencies);
        }
        if !self.peer_dependencies.is_empty() {
            manifest["peerDependencies"] = json!(self.peer_dependencies);
        }
        manifest
    }

    /// Write this fixture to a real directory.
    pub fn write_to(&self, base_path: &Path) -> std::io::Result<PathBuf> {
        let project_path = base_path.join(&self.name);
        std::fs::create_dir_all(&project_path)?;

        // Write package.json
        std::fs::write(
            project_path.join("package.json"),
            self.package_json().to_string(),
        )?;

        // Install packages
        for package in &self.packages {
            let dir = project_path.join("node_modules").join(&package.name);
            std::fs::create_dir_all(&dir)?;
            let manifest = json!({
                "name": package.name,
                "version": package.version,
                "main": package.main,
            });
            std::fs::write(dir.join("package.json"), manifest.to_string())?;
            std::fs::write(
                dir.join(&package.main),
                format!("module.exports = {:?};\n", package.name),
            )?;
        }

        if let Some(federation) = &self.federation {
            std::fs::write(project_path.join("federation.json"), federation.to_string())?;
        }

        for (rel_path, content) in &self.files {
            let full_path = project_path.join(rel_path);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full_path, content)?;
        }

        Ok(project_path)
    }
}

/// Common federation configs.
pub mod configs {
    use serde_json::{json, Value};

    /// Consume react as a strict singleton and provide lodash.
    pub fn host() -> Value {
        json!({
            "name": "host",
            "consumes": {
                "react": { "singleton": true, "requiredVersion": "^18.0.0" }
            },
            "provides": ["lodash"]
        })
    }

    /// Share a list of packages in both directions.
    pub fn shared(packages: &[&str]) -> Value {
        json!({ "name": "remote", "shared": packages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{find_package_dir, PackageJson};
    use tempfile::TempDir;

    #[test]
    fn test_fixture_layout() {
        let tmp = TempDir::new().unwrap();
        let root = ProjectFixture::react_app("app")
            .with_federation(configs::host())
            .with_file("src/index.js", "export default 1;")
            .write_to(tmp.path())
            .unwrap();

        let manifest = PackageJson::load(&root.join("package.json")).unwrap();
        assert_eq!(manifest.declared_range("react"), Some("^18.2.0"));

        let react = find_package_dir(&root, "react").unwrap();
        assert!(react.join("index.js").exists());
        assert!(root.join("federation.json").exists());
        assert!(root.join("src/index.js").exists());
    }
}
