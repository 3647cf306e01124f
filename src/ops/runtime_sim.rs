//! Implementation of `fedshare resolve`.
//!
//! Loads a registry snapshot into a [`ShareScopeRuntime`] and runs one load
//! request against it, the way a generated consume stub would at startup.
//!
//! A snapshot maps scopes to keys to registered versions:
//!
//! ```json
//! {
//!   "default": {
//!     "react": ["17.0.2", { "version": "18.2.0", "from": "shop", "eager": true }],
//!     "react-dom": { "versions": ["18.2.0"], "activated": "18.2.0" }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::resolver::errors::ShareError;
use crate::resolver::loader::LoaderFunction;
use crate::resolver::share_scope::{factory, Factory, ResolvedFrom, ShareScopeRuntime};
use crate::resolver::version::{parse_range, parse_version};
use crate::util::fs::read_json;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EntrySnapshot {
    Version(String),
    Detailed {
        version: String,
        #[serde(default)]
        from: String,
        #[serde(default)]
        eager: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeySnapshot {
    List(Vec<EntrySnapshot>),
    Detailed {
        versions: Vec<EntrySnapshot>,
        #[serde(default)]
        activated: Option<String>,
    },
}

/// Registry contents as stored on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RegistrySnapshot {
    scopes: BTreeMap<String, BTreeMap<String, KeySnapshot>>,
}

fn entry_factory(key: &str, version: &str, from: &str) -> Factory {
    let module = json!({ "key": key, "version": version, "from": from });
    factory(move || Ok(module.clone()))
}

impl RegistrySnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path).with_context(|| format!("invalid registry snapshot: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Build a runtime holding every registered version.
    pub fn into_runtime(self) -> Result<ShareScopeRuntime, ShareError> {
        let mut runtime = ShareScopeRuntime::new();

        for (scope, keys) in self.scopes {
            for (key, snapshot) in keys {
                let (entries, activated) = match snapshot {
                    KeySnapshot::List(entries) => (entries, None),
                    KeySnapshot::Detailed {
                        versions,
                        activated,
                    } => (versions, activated),
                };

                for entry in entries {
                    let (version, from, eager) = match entry {
                        EntrySnapshot::Version(version) => (version, String::new(), false),
                        EntrySnapshot::Detailed {
                            version,
                            from,
                            eager,
                        } => (version, from, eager),
                    };
                    let factory = entry_factory(&key, &version, &from);
                    runtime.register(&scope, &key, parse_version(&version)?, &from, factory, eager);
                }

                if let Some(active) = activated {
                    runtime.activate(&scope, &key, &parse_version(&active)?)?;
                }
            }
        }

        Ok(runtime)
    }
}

/// One simulated load request.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub scope: String,
    pub key: String,
    pub range: Option<String>,
    pub singleton: bool,
    pub strict: bool,
    /// Name of a local fallback module, if the consumer bundles one
    pub fallback: Option<String>,
}

/// What a simulated load produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolveOutcome {
    /// Loader function the generated stub would call
    pub function: LoaderFunction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub fallback: bool,
    pub module: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Run one load request against `runtime`.
pub fn simulate(
    runtime: &mut ShareScopeRuntime,
    opts: &ResolveOptions,
) -> Result<ResolveOutcome, ShareError> {
    let range = opts.range.as_deref().map(parse_range).transpose()?;
    let function = LoaderFunction::select(
        range.is_some(),
        opts.strict,
        opts.singleton,
        opts.fallback.is_some(),
    );

    let fallback = opts.fallback.as_ref().map(|name| {
        let module = json!({ "fallback": name });
        factory(move || Ok(module.clone()))
    });

    let warnings_before = runtime.warnings().len();
    let resolved = runtime.invoke(function, &opts.scope, &opts.key, range.as_ref(), fallback)?;

    let (version, from) = match &resolved.source {
        ResolvedFrom::Shared { version, from } => {
            (Some(version.to_string()), Some(from.clone()))
        }
        ResolvedFrom::Fallback => (None, None),
    };

    Ok(ResolveOutcome {
        function,
        version,
        from,
        fallback: resolved.is_fallback(),
        module: resolved.module,
        warnings: runtime.warnings()[warnings_before..].to_vec(),
    })
}
