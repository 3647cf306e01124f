//! Child build specifications.
//!
//! A child build compiles the federated container next to a parent build.
//! Its spec is derived from the parent's output settings and the container's
//! federation config.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::builder::context::{BuildContext, BuildMode};
use crate::core::descriptor::ShareDescriptor;
use crate::core::federation::{FederationConfig, LibraryOptions};
use crate::core::manifest::package_name_of;
use crate::core::share_config::{ConfigError, ShareConfigNormalizer};

/// Framework modules shared as singletons without a local fallback.
pub const FRAMEWORK_SHARES: &[&str] = &[
    "next/dynamic",
    "next/head",
    "next/image",
    "next/link",
    "next/router",
    "next/script",
    "react",
    "react-dom",
    "react/jsx-dev-runtime",
    "react/jsx-runtime",
    "styled-jsx",
];

/// Framework shares that must stay bundled on the server.
const SERVER_BUNDLED: &[&str] = &["next/dynamic"];

/// Extra externals for the server child.
const SERVER_EXTERNALS: &[&str] = &["react/jsx-runtime", "react/jsx-dev-runtime"];

/// Which parent build a child belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
    Client,
    Server,
}

impl BuildTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildTarget::Client => "client",
            BuildTarget::Server => "server",
        }
    }

    /// Target of a parent build, by its name.
    pub fn from_build_name(name: &str) -> Self {
        if name == "server" {
            BuildTarget::Server
        } else {
            BuildTarget::Client
        }
    }

    pub fn is_server(&self) -> bool {
        *self == BuildTarget::Server
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output settings of a child build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildOutput {
    pub path: PathBuf,
    pub public_path: String,
    pub chunk_loading_global: String,
    pub unique_name: String,
    pub library: LibraryOptions,
    pub filename: String,
    pub chunk_filename: String,
}

/// Plugins applied to a child build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "plugin", rename_all = "kebab-case")]
pub enum ChildPlugin {
    ModuleFederation,
    NodeFederation,
    JsonpTemplate,
    NodeTemplate,
    LoaderTarget { target: String },
    Library { kind: String },
    Define { definitions: BTreeMap<String, String> },
    Externals { modules: Vec<String> },
    StreamingTarget,
    PromiseExternalRuntime,
}

/// Everything needed to run one child build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildBuildSpec {
    pub target: BuildTarget,
    pub name: String,
    pub mode: BuildMode,
    /// Project root the child resolves modules from
    pub context_dir: PathBuf,
    pub output: ChildOutput,
    pub federation: FederationConfig,
    pub plugins: Vec<ChildPlugin>,
    pub lazy_compilation: bool,
    pub runtime_chunk: bool,
    pub inherit_split_chunks: bool,
}

/// Milliseconds since the epoch, used to cache-bust development servers.
pub fn build_stamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// `shared` entries for the framework's own modules.
pub fn externalized_shares() -> Map<String, Value> {
    FRAMEWORK_SHARES
        .iter()
        .map(|key| {
            (
                key.to_string(),
                json!({ "singleton": true, "requiredVersion": false, "import": false }),
            )
        })
        .collect()
}

/// Parent output path cut off before its `server` segment.
pub fn output_root(path: &Path) -> PathBuf {
    let mut root = PathBuf::new();
    for component in path.components() {
        if matches!(component, Component::Normal(name) if name == "server") {
            break;
        }
        root.push(component);
    }
    root
}

/// Remote entry name; server containers drop any directory part.
pub fn remote_filename(target: &BuildTarget, filename: &str) -> String {
    if target.is_server() {
        Path::new(filename)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string())
    } else {
        filename.to_string()
    }
}

fn federated_filename(filename: &str, mode: BuildMode) -> String {
    let suffix = match mode {
        BuildMode::Development => "-fed.js",
        BuildMode::Production => "[contenthash]-fed.js",
    };
    filename.replacen(".js", suffix, 1)
}

/// User `shared` entries as a map, so they can be merged by key.
fn shared_as_map(shared: Option<&Value>) -> Map<String, Value> {
    let request_entry = |request: &str| {
        let key = package_name_of(request).unwrap_or(request).to_string();
        (key, Value::String(request.to_string()))
    };

    match shared {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .map(request_entry)
            .collect(),
        Some(Value::String(request)) => [request_entry(request.as_str())].into_iter().collect(),
        _ => Map::new(),
    }
}

fn runtime_remotes(remotes: &Map<String, Value>) -> String {
    let map: Map<String, Value> = remotes
        .iter()
        .map(|(name, location)| {
            let location = match location {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), Value::String(location))
        })
        .collect();
    Value::Object(map).to_string()
}

impl ChildBuildSpec {
    /// Derive the child spec for a parent build.
    ///
    /// `stamp` becomes the `./buildHash` module of development servers.
    pub fn derive(parent: &BuildContext, federation: &FederationConfig, stamp: u64) -> Self {
        let target = BuildTarget::from_build_name(&parent.name);
        let name = federation.name().to_string();
        let mode = parent.mode;
        let is_dev = mode == BuildMode::Development;

        let path = if target.is_server() {
            output_root(&parent.output.path).join("static").join("ssr")
        } else {
            parent.output.path.clone()
        };

        let library_type = federation
            .library
            .as_ref()
            .map(|l| l.kind.clone())
            .or_else(|| parent.output.library_type.clone())
            .unwrap_or_else(|| "var".to_string());

        let output = ChildOutput {
            path,
            public_path: "auto".to_string(),
            chunk_loading_global: format!("{}chunkLoader", name),
            unique_name: name.clone(),
            library: LibraryOptions {
                name: Some(name.clone()),
                kind: library_type.clone(),
            },
            filename: federated_filename(&parent.output.filename, mode),
            chunk_filename: federated_filename(&parent.output.chunk_filename, mode),
        };

        let mut exposes = Map::new();
        if target.is_server() && is_dev {
            exposes.insert(
                "./buildHash".to_string(),
                Value::String(format!("data:text/javascript,export default {}", stamp)),
            );
        }
        exposes.extend(federation.exposes.clone());

        let mut shared = if federation.skip_sharing_next_internals {
            Map::new()
        } else {
            externalized_shares()
        };
        shared.extend(shared_as_map(federation.shared.as_ref()));

        let mut child_federation = federation.clone();
        child_federation.filename = Some(remote_filename(&target, federation.filename()));
        child_federation.exposes = exposes;
        child_federation.shared = Some(Value::Object(shared));

        let plugins = match target {
            BuildTarget::Client => {
                let definitions = BTreeMap::from([
                    (
                        "process.env.REMOTES".to_string(),
                        runtime_remotes(&federation.remotes),
                    ),
                    (
                        "process.env.CURRENT_HOST".to_string(),
                        Value::String(name.clone()).to_string(),
                    ),
                ]);
                vec![
                    ChildPlugin::ModuleFederation,
                    ChildPlugin::JsonpTemplate,
                    ChildPlugin::LoaderTarget {
                        target: "web".to_string(),
                    },
                    ChildPlugin::Library { kind: library_type },
                    ChildPlugin::Define { definitions },
                    ChildPlugin::PromiseExternalRuntime,
                ]
            }
            BuildTarget::Server => {
                let modules = FRAMEWORK_SHARES
                    .iter()
                    .filter(|key| !SERVER_BUNDLED.contains(*key))
                    .chain(SERVER_EXTERNALS)
                    .map(|key| key.to_string())
                    .fold(Vec::new(), |mut acc: Vec<String>, key| {
                        if !acc.contains(&key) {
                            acc.push(key);
                        }
                        acc
                    });
                vec![
                    ChildPlugin::NodeFederation,
                    ChildPlugin::NodeTemplate,
                    ChildPlugin::Externals { modules },
                    ChildPlugin::StreamingTarget,
                    ChildPlugin::Library { kind: library_type },
                    ChildPlugin::PromiseExternalRuntime,
                ]
            }
        };

        ChildBuildSpec {
            target,
            name,
            mode,
            context_dir: parent.context_dir.clone(),
            output,
            federation: child_federation,
            plugins,
            lazy_compilation: false,
            runtime_chunk: false,
            inherit_split_chunks: false,
        }
    }

    /// Normalize the child's share declarations.
    pub fn normalize(&self, normalizer: &ShareConfigNormalizer) -> Result<Vec<ShareDescriptor>, ConfigError> {
        let mut descriptors = Vec::new();
        if let Some(consumes) = &self.federation.consumes {
            descriptors.extend(normalizer.normalize_consumes(consumes)?);
        }
        if let Some(provides) = &self.federation.provides {
            descriptors.extend(normalizer.normalize_provides(provides)?);
        }
        if let Some(shared) = &self.federation.shared {
            descriptors.extend(normalizer.normalize_shared(shared)?);
        }
        Ok(descriptors)
    }

    pub fn externals(&self) -> &[String] {
        self.plugins
            .iter()
            .find_map(|plugin| match plugin {
                ChildPlugin::Externals { modules } => Some(modules.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::context::OutputOptions;
    use crate::core::descriptor::ShareKind;

    fn parent(name: &str, mode: BuildMode) -> BuildContext {
        let mut output = OutputOptions::new("/app/.next/server");
        if name == "client" {
            output.path = PathBuf::from("/app/.next");
            output.filename = "static/chunks/[name].js".to_string();
        }
        output.library_type = Some("var".to_string());
        BuildContext::new(name, mode, "/app").with_output(output)
    }

    fn federation() -> FederationConfig {
        FederationConfig::parse_json(
            r#"{
                "name": "shop",
                "filename": "static/chunks/remoteEntry.js",
                "remotes": { "cart": "cart@http://localhost:3001/remoteEntry.js" },
                "exposes": { "./Button": "./components/Button" },
                "shared": { "react": { "singleton": true, "requiredVersion": "^18.0.0" }, "lodash": "lodash" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_output_root_truncates_at_server() {
        assert_eq!(output_root(Path::new("/app/.next/server/chunks")), PathBuf::from("/app/.next"));
        assert_eq!(output_root(Path::new("/app/.next")), PathBuf::from("/app/.next"));
    }

    #[test]
    fn test_dev_server_spec() {
        let spec = ChildBuildSpec::derive(&parent("server", BuildMode::Development), &federation(), 1700);

        assert_eq!(spec.target, BuildTarget::Server);
        assert_eq!(spec.output.path, PathBuf::from("/app/.next/static/ssr"));
        assert_eq!(spec.output.public_path, "auto");
        assert_eq!(spec.output.chunk_loading_global, "shopchunkLoader");
        assert_eq!(spec.output.unique_name, "shop");
        assert_eq!(spec.output.filename, "[name]-fed.js");
        assert_eq!(spec.federation.filename.as_deref(), Some("remoteEntry.js"));
        assert_eq!(
            spec.federation.exposes["./buildHash"],
            "data:text/javascript,export default 1700"
        );
        assert!(spec.federation.exposes.contains_key("./Button"));
        assert!(!spec.lazy_compilation && !spec.runtime_chunk && !spec.inherit_split_chunks);

        let externals = spec.externals();
        assert!(!externals.iter().any(|e| e == "next/dynamic"));
        assert!(externals.iter().any(|e| e == "react/jsx-runtime"));
        assert_eq!(
            externals.iter().filter(|e| *e == "react/jsx-runtime").count(),
            1
        );
        assert!(spec.plugins.contains(&ChildPlugin::StreamingTarget));
    }

    #[test]
    fn test_prod_client_spec() {
        let spec = ChildBuildSpec::derive(&parent("client", BuildMode::Production), &federation(), 1700);

        assert_eq!(spec.output.path, PathBuf::from("/app/.next"));
        assert_eq!(spec.output.filename, "static/chunks/[name][contenthash]-fed.js");
        assert_eq!(
            spec.federation.filename.as_deref(),
            Some("static/chunks/remoteEntry.js")
        );
        assert!(!spec.federation.exposes.contains_key("./buildHash"));
        assert!(spec.externals().is_empty());

        let define = spec
            .plugins
            .iter()
            .find_map(|p| match p {
                ChildPlugin::Define { definitions } => Some(definitions),
                _ => None,
            })
            .unwrap();
        assert_eq!(define["process.env.CURRENT_HOST"], "\"shop\"");
        assert!(define["process.env.REMOTES"].contains("cart@http://localhost:3001"));
    }

    #[test]
    fn test_user_shares_win_over_framework_shares() {
        let spec = ChildBuildSpec::derive(&parent("client", BuildMode::Development), &federation(), 0);
        let shared = spec.federation.shared.as_ref().unwrap();
        assert_eq!(shared["react"]["requiredVersion"], "^18.0.0");
        assert_eq!(shared["react-dom"]["import"], false);

        let tmp = tempfile::TempDir::new().unwrap();
        let descriptors = spec.normalize(&ShareConfigNormalizer::new(tmp.path())).unwrap();
        let react_dom: Vec<_> = descriptors
            .iter()
            .filter(|d| d.share_key == "react-dom")
            .collect();
        assert_eq!(react_dom.len(), 1);
        assert_eq!(react_dom[0].kind, ShareKind::Consume);
        assert!(react_dom[0].fallback().is_none());
    }

    #[test]
    fn test_skip_framework_shares() {
        let mut config = federation();
        config.skip_sharing_next_internals = true;
        config.shared = Some(json!(["lodash/fp"]));
        let spec = ChildBuildSpec::derive(&parent("client", BuildMode::Development), &config, 0);

        let shared = spec.federation.shared.as_ref().unwrap().as_object().unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared["lodash"], "lodash/fp");
    }
}
