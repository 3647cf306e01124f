//! The build unit abstraction shared by consume and provide modules.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::builder::consume::ConsumeSharedModule;
use crate::builder::graph::ChunkGraph;
use crate::builder::provide::ProvideSharedModule;
use crate::builder::template::{LoaderCall, RuntimeGlobal};
use crate::core::descriptor::ShareDescriptor;
use crate::core::filter::FilterError;
use crate::core::share_config::ConfigError;
use crate::resolver::errors::ShareError;
use crate::util::hash::Fingerprint;

/// Estimated size of a shared unit; its real weight is in its fallback.
pub const SHARED_MODULE_SIZE: u64 = 42;

/// Errors recorded while building units.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Share(#[from] ShareError),

    #[error("cannot resolve `{request}` for shared module `{key}`")]
    Unresolved { key: String, request: String },

    #[error("child build `{target}` failed: {message}")]
    ChildBuild { target: String, message: String },
}

/// Kinds of generated source a unit emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    ConsumeShared,
    ShareInit,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::ConsumeShared => "consume-shared",
            SourceType::ShareInit => "share-init",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a dependency edge points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    /// Local fallback of a consume unit.
    ConsumeFallback,
    /// Module registered by a provide unit.
    ProvidedModule,
}

/// A dependency on a local request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub kind: DependencyKind,
    pub request: String,
}

impl ModuleDependency {
    pub fn new(kind: DependencyKind, request: impl Into<String>) -> Self {
        ModuleDependency {
            kind,
            request: request.into(),
        }
    }
}

/// A group of dependencies that may need a deferred fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncBlock {
    pub dependencies: Vec<ModuleDependency>,
}

/// Set once a unit has been built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub hash: String,
}

/// Shortens absolute requests to paths relative to the build context.
#[derive(Debug, Clone)]
pub struct RequestShortener {
    context: PathBuf,
}

impl RequestShortener {
    pub fn new(context: impl Into<PathBuf>) -> Self {
        RequestShortener {
            context: context.into(),
        }
    }

    pub fn shorten(&self, request: &str) -> String {
        let path = Path::new(request);
        if !path.is_absolute() {
            return request.to_string();
        }

        match pathdiff::diff_paths(path, &self.context) {
            Some(relative) => {
                let relative = relative.to_string_lossy().replace('\\', "/");
                if relative.starts_with("..") {
                    relative
                } else {
                    format!("./{}", relative)
                }
            }
            None => request.to_string(),
        }
    }
}

/// Inputs to code generation.
#[derive(Debug, Clone, Copy)]
pub struct CodeGenContext<'a> {
    pub chunk_graph: &'a ChunkGraph,
}

/// Output of code generation for one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeGenerationResult {
    pub sources: BTreeMap<SourceType, String>,
    pub runtime_requirements: BTreeSet<RuntimeGlobal>,
    pub data: BTreeMap<String, Value>,
    pub loader_call: Option<LoaderCall>,
}

/// Shared lifecycle of consume and provide units.
pub trait BuildUnit: Send + Sync {
    /// Deterministic identity, used for dedupe and cache keys.
    fn identifier(&self) -> String;

    fn readable_identifier(&self, shortener: &RequestShortener) -> String;

    /// Path-shaped identity for library-style imports.
    fn lib_ident(&self) -> String;

    fn descriptor(&self) -> &ShareDescriptor;

    fn build_info(&self) -> Option<&BuildInfo>;

    fn need_build(&self) -> bool {
        self.build_info().is_none()
    }

    fn build(&mut self) -> Result<(), BuildError>;

    fn dependencies(&self) -> &[ModuleDependency];

    fn blocks(&self) -> &[AsyncBlock];

    fn source_types(&self) -> &'static [SourceType];

    fn size(&self, _source_type: Option<SourceType>) -> u64 {
        SHARED_MODULE_SIZE
    }

    fn update_hash(&self, fp: &mut Fingerprint);

    fn code_generation(&self, ctx: &CodeGenContext<'_>) -> CodeGenerationResult;

    /// Unit hash from `update_hash`.
    fn hash(&self) -> String {
        let mut fp = Fingerprint::new();
        self.update_hash(&mut fp);
        fp.finish()
    }
}

/// Either kind of shared unit, as stored in the graph and the unit cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SharedModule {
    Consume(ConsumeSharedModule),
    Provide(ProvideSharedModule),
}

impl SharedModule {
    /// Create the unit a descriptor calls for.
    pub fn from_descriptor(descriptor: ShareDescriptor) -> Self {
        if descriptor.is_consume() {
            SharedModule::Consume(ConsumeSharedModule::new(descriptor))
        } else {
            SharedModule::Provide(ProvideSharedModule::new(descriptor))
        }
    }

    pub fn as_unit(&self) -> &dyn BuildUnit {
        match self {
            SharedModule::Consume(m) => m,
            SharedModule::Provide(m) => m,
        }
    }

    pub fn as_unit_mut(&mut self) -> &mut dyn BuildUnit {
        match self {
            SharedModule::Consume(m) => m,
            SharedModule::Provide(m) => m,
        }
    }

    /// Serialize the unit, including its descriptor, layer and build state.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

impl BuildUnit for SharedModule {
    fn identifier(&self) -> String {
        self.as_unit().identifier()
    }

    fn readable_identifier(&self, shortener: &RequestShortener) -> String {
        self.as_unit().readable_identifier(shortener)
    }

    fn lib_ident(&self) -> String {
        self.as_unit().lib_ident()
    }

    fn descriptor(&self) -> &ShareDescriptor {
        self.as_unit().descriptor()
    }

    fn build_info(&self) -> Option<&BuildInfo> {
        self.as_unit().build_info()
    }

    fn build(&mut self) -> Result<(), BuildError> {
        self.as_unit_mut().build()
    }

    fn dependencies(&self) -> &[ModuleDependency] {
        self.as_unit().dependencies()
    }

    fn blocks(&self) -> &[AsyncBlock] {
        self.as_unit().blocks()
    }

    fn source_types(&self) -> &'static [SourceType] {
        self.as_unit().source_types()
    }

    fn update_hash(&self, fp: &mut Fingerprint) {
        self.as_unit().update_hash(fp)
    }

    fn code_generation(&self, ctx: &CodeGenContext<'_>) -> CodeGenerationResult {
        self.as_unit().code_generation(ctx)
    }
}

/// Record the fallback or provided module as a dependency.
///
/// Eager units link it synchronously; lazy units put it behind an async block.
pub(crate) fn attach_dependency(
    dependencies: &mut Vec<ModuleDependency>,
    blocks: &mut Vec<AsyncBlock>,
    dependency: ModuleDependency,
    eager: bool,
) {
    if eager {
        dependencies.push(dependency);
    } else {
        blocks.push(AsyncBlock {
            dependencies: vec![dependency],
        });
    }
}
