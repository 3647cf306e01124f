//! Provide shared module.
//!
//! Registers a local module in a share scope during sharing initialization.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::builder::module::{
    attach_dependency, AsyncBlock, BuildError, BuildInfo, BuildUnit, CodeGenContext,
    CodeGenerationResult, DependencyKind, ModuleDependency, RequestShortener, SourceType,
};
use crate::builder::template::{
    async_module_factory, string_literal, sync_module_factory, RuntimeGlobal,
};
use crate::core::descriptor::{Setting, ShareDescriptor};
use crate::util::hash::Fingerprint;

const SOURCE_TYPES: &[SourceType] = &[SourceType::ShareInit];

/// Stage at which provided modules are registered.
pub const PROVIDE_INIT_STAGE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvideSharedModule {
    options: ShareDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build_info: Option<BuildInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<ModuleDependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<AsyncBlock>,
}

impl ProvideSharedModule {
    pub fn new(options: ShareDescriptor) -> Self {
        let layer = options.layer.clone();
        ProvideSharedModule {
            options,
            layer,
            build_info: None,
            dependencies: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// The module registered, preferring the resolved path.
    pub fn request(&self) -> &str {
        self.options
            .fallback_resolved
            .as_deref()
            .unwrap_or(&self.options.request)
    }

    fn version_label(&self) -> String {
        match &self.options.version {
            Setting::Value(v) => v.to_string(),
            Setting::Disabled => "false".to_string(),
            Setting::Unset => "0".to_string(),
        }
    }

    /// Version string passed to the runtime `register` call.
    fn registered_version(&self) -> String {
        self.options
            .version
            .value()
            .map(ToString::to_string)
            .unwrap_or_else(|| "0".to_string())
    }
}

impl BuildUnit for ProvideSharedModule {
    fn identifier(&self) -> String {
        let o = &self.options;
        let mut out = format!(
            "provide module ({}) {}@{} = {}",
            o.share_scope.joined(),
            o.share_key,
            self.version_label(),
            self.request()
        );
        for (set, flag) in [
            (o.eager, "eager"),
            (o.singleton, "singleton"),
            (o.strict_version, "strict"),
        ] {
            if set {
                out.push_str(&format!(" ({})", flag));
            }
        }
        if let Some(layer) = &self.layer {
            out.push_str(&format!(" ({})", layer));
        }
        out
    }

    fn readable_identifier(&self, shortener: &RequestShortener) -> String {
        format!(
            "provide shared module ({}) {}@{} = {}",
            self.options.share_scope.joined(),
            self.options.share_key,
            self.version_label(),
            shortener.shorten(self.request())
        )
    }

    fn lib_ident(&self) -> String {
        let layer = self
            .layer
            .as_deref()
            .map(|l| format!("({})/", l))
            .unwrap_or_default();
        format!(
            "{}webpack/sharing/provide/{}/{}",
            layer,
            self.options.share_scope.joined(),
            self.options.share_key
        )
    }

    fn descriptor(&self) -> &ShareDescriptor {
        &self.options
    }

    fn build_info(&self) -> Option<&BuildInfo> {
        self.build_info.as_ref()
    }

    fn build(&mut self) -> Result<(), BuildError> {
        self.dependencies.clear();
        self.blocks.clear();

        let dependency = ModuleDependency::new(DependencyKind::ProvidedModule, self.request());
        attach_dependency(
            &mut self.dependencies,
            &mut self.blocks,
            dependency,
            self.options.eager,
        );

        self.build_info = Some(BuildInfo { hash: self.hash() });
        Ok(())
    }

    fn dependencies(&self) -> &[ModuleDependency] {
        &self.dependencies
    }

    fn blocks(&self) -> &[AsyncBlock] {
        &self.blocks
    }

    fn source_types(&self) -> &'static [SourceType] {
        SOURCE_TYPES
    }

    fn update_hash(&self, fp: &mut Fingerprint) {
        fp.update_str(&self.identifier());
        fp.update_json(&self.options);
    }

    fn code_generation(&self, ctx: &CodeGenContext<'_>) -> CodeGenerationResult {
        let mut requirements = BTreeSet::from([RuntimeGlobal::InitializeSharing]);
        let factory = if self.options.eager {
            sync_module_factory(ctx.chunk_graph, self.request(), &mut requirements)
        } else {
            async_module_factory(ctx.chunk_graph, self.request(), &mut requirements)
        };

        let init = format!(
            "register({}, {}, {}{});",
            string_literal(&self.options.share_key),
            string_literal(&self.registered_version()),
            factory,
            if self.options.eager { ", 1" } else { "" }
        );

        let mut result = CodeGenerationResult {
            runtime_requirements: requirements,
            ..Default::default()
        };
        result.data.insert(
            SourceType::ShareInit.to_string(),
            json!([{
                "shareScope": self.options.share_scope.primary(),
                "initStage": PROVIDE_INIT_STAGE,
                "init": init,
            }]),
        );
        result
    }
}
